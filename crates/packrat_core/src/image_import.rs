//! L3 — image importer.
//!
//! Resolves manifest-declared image paths, decodes each PNG to 8-bit RGBA,
//! and optionally premultiplies alpha. Failures across all images are
//! collected before the stage fails, matching spec.md §4.3/§7: a read
//! failure escalates the stage's status to `IoError`, otherwise (decode
//! failure, zero-sized image) it is `ValidationError`.

use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use crate::manifest::model::{ColorSpace, ImageEntry, Manifest};
use std::fs;

/// A fully decoded, resolved image ready for frame resolution (L4).
#[derive(Debug, Clone)]
pub struct ImportedImage {
    pub id: String,
    pub resolved_path: String,
    pub width: u32,
    pub height: u32,
    pub tight_row_bytes: u32,
    pub pixels: Vec<u8>,
    pub source_file_bytes: u64,
    pub color_space: ColorSpace,
}

enum ImportFailure {
    Read,
    Other,
}

/// Resolves `path` against `manifest_dir` per spec.md §4.3: absolute paths
/// are used as-is; relative paths are joined with `/`, preserving whatever
/// separators are already present on either side (no normalization).
pub fn resolve_image_path(manifest_dir: &str, path: &str) -> String {
    if path.starts_with('/') {
        return path.to_string();
    }
    if manifest_dir.is_empty() {
        return path.to_string();
    }
    format!("{manifest_dir}/{path}")
}

/// Returns the `/`-style directory component of a manifest file path (empty
/// string if the manifest path has no directory component).
pub fn manifest_directory(manifest_path: &str) -> String {
    match manifest_path.rfind('/') {
        Some(idx) => manifest_path[..idx].to_string(),
        None => String::new(),
    }
}

fn premultiply(pixels: &mut [u8]) {
    for chunk in pixels.chunks_exact_mut(4) {
        let a = chunk[3] as u32;
        chunk[0] = ((chunk[0] as u32 * a + 127) / 255) as u8;
        chunk[1] = ((chunk[1] as u32 * a + 127) / 255) as u8;
        chunk[2] = ((chunk[2] as u32 * a + 127) / 255) as u8;
    }
}

/// Imports every image entry in `manifest`, in declaration order. On
/// success, the returned vector has exactly `manifest.images.len()`
/// entries in the same order.
pub fn import_images(
    manifest_path: &str,
    manifest: &Manifest,
    diag: &mut DiagCounter,
) -> Result<Vec<ImportedImage>, PackratError> {
    let manifest_dir = manifest_directory(manifest_path);
    let mut imported = Vec::with_capacity(manifest.images.len());
    let mut worst: Option<ImportFailure> = None;

    for image in &manifest.images {
        match import_one(&manifest_dir, image, diag) {
            Ok(record) => imported.push(record),
            Err(failure) => {
                worst = Some(match (worst, failure) {
                    (Some(ImportFailure::Read), _) | (_, ImportFailure::Read) => ImportFailure::Read,
                    _ => ImportFailure::Other,
                });
            }
        }
    }

    match worst {
        None => Ok(imported),
        Some(ImportFailure::Read) => Err(PackratError::new(Status::IoError, "one or more images failed to read")),
        Some(ImportFailure::Other) => Err(PackratError::new(
            Status::ValidationError,
            "one or more images failed to decode or were zero-sized",
        )),
    }
}

fn import_one(manifest_dir: &str, image: &ImageEntry, diag: &mut DiagCounter) -> Result<ImportedImage, ImportFailure> {
    let id = image.id.clone().unwrap_or_default();
    let path = image.path.clone().unwrap_or_default();
    let resolved_path = resolve_image_path(manifest_dir, &path);

    let bytes = fs::read(&resolved_path).map_err(|err| {
        diag.emit(
            Diagnostic::error(
                codes::IMPORT_READ_FAILED,
                format!("failed to read image '{resolved_path}': {err}"),
            )
            .with_line(image.line)
            .with_asset_id(id.clone()),
        );
        ImportFailure::Read
    })?;

    let decoded = image::load_from_memory(&bytes).map_err(|err| {
        diag.emit(
            Diagnostic::error(
                codes::IMPORT_DECODE_FAILED,
                format!("failed to decode image '{resolved_path}': {err}"),
            )
            .with_line(image.line)
            .with_asset_id(id.clone()),
        );
        ImportFailure::Other
    })?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::trace!("imported image '{id}' from '{resolved_path}' ({width}x{height})");
    if width == 0 || height == 0 {
        diag.emit(
            Diagnostic::error(
                codes::IMPORT_ZERO_SIZED,
                format!("image '{resolved_path}' has zero width or height."),
            )
            .with_line(image.line)
            .with_asset_id(id.clone()),
        );
        return Err(ImportFailure::Other);
    }

    let mut pixels = rgba.into_raw();
    if image.premultiply_alpha {
        premultiply(&mut pixels);
    }

    Ok(ImportedImage {
        id,
        resolved_path,
        width,
        height,
        tight_row_bytes: width * 4,
        pixels,
        source_file_bytes: bytes.len() as u64,
        color_space: image.color_space.unwrap_or(ColorSpace::Srgb),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_path_against_manifest_directory() {
        assert_eq!(resolve_image_path("assets/manifests", "hero.png"), "assets/manifests/hero.png");
    }

    #[test]
    fn absolute_path_is_used_as_is() {
        assert_eq!(resolve_image_path("assets/manifests", "/abs/hero.png"), "/abs/hero.png");
    }

    #[test]
    fn manifest_directory_strips_file_component() {
        assert_eq!(manifest_directory("assets/pack.toml"), "assets");
        assert_eq!(manifest_directory("pack.toml"), "");
    }

    #[test]
    fn premultiply_scales_rgb_by_alpha() {
        let mut pixels = vec![255u8, 255, 255, 128];
        premultiply(&mut pixels);
        assert_eq!(pixels[3], 128);
        assert!(pixels[0] < 255);
    }

    #[test]
    fn missing_image_file_is_io_failure() {
        let mut manifest = Manifest::default();
        manifest.images.push(ImageEntry {
            id: Some("missing".to_string()),
            path: Some("does_not_exist.png".to_string()),
            ..Default::default()
        });

        let mut sink = |_d: crate::diagnostics::Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = import_images("/nonexistent/manifest.toml", &manifest, &mut counter);
        let err = result.expect_err("missing image should fail");
        assert_eq!(err.status, Status::IoError);
    }
}
