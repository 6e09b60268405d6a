//! Debug JSON sidecar — spec.md §6.4.
//!
//! A thin `serde`/`serde_json` serializer over already-resolved build data,
//! written alongside the `.prpk` output when `debug_output` is set. Uses the
//! workspace's existing `serde_json` dependency (the same crate the teacher
//! workspace's atlas packer uses for its metadata sidecar) rather than a
//! hand-rolled writer — control-byte escaping beyond the five spec.md names
//! (`\\`, `"`, `\n`, `\r`, `\t`) is the one place this deviates from a
//! byte-for-byte reference writer: `serde_json` also escapes the remaining
//! C0 control bytes (e.g. ``) as `\u00XX` sequences rather than
//! passing them through raw, which is strictly more conservative and still
//! produces valid JSON. See DESIGN.md.

use crate::image_import::ImportedImage;
use crate::manifest::model::Manifest;
use serde::Serialize;

#[derive(Serialize)]
struct DebugImage {
    id: String,
    resolved_path: String,
    width: u32,
    height: u32,
    bytes: u64,
    format: &'static str,
}

#[derive(Serialize)]
struct DebugCounts {
    images: usize,
    sprites: usize,
    animations: usize,
}

#[derive(Serialize)]
struct DebugDocument {
    schema_version: i64,
    package_name: String,
    output: String,
    counts: DebugCounts,
    images: Vec<DebugImage>,
}

/// Renders the debug JSON document for a completed build, in compact or
/// pretty (2-space indent, trailing newline) form per spec.md §6.4.
pub fn render(manifest: &Manifest, images: &[ImportedImage], pretty: bool) -> Result<String, serde_json::Error> {
    let document = DebugDocument {
        schema_version: manifest.schema_version.unwrap_or(1),
        package_name: manifest.package_name.clone().unwrap_or_default(),
        output: manifest.output.clone().unwrap_or_default(),
        counts: DebugCounts {
            images: images.len(),
            sprites: manifest.sprites.len(),
            animations: manifest.animations.len(),
        },
        images: images
            .iter()
            .map(|img| DebugImage {
                id: img.id.clone(),
                resolved_path: img.resolved_path.clone(),
                width: img.width,
                height: img.height,
                bytes: img.source_file_bytes,
                format: "rgba8",
            })
            .collect(),
    };

    if pretty {
        let mut out = serde_json::to_string_pretty(&document)?;
        out.push('\n');
        Ok(out)
    } else {
        serde_json::to_string(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::model::ColorSpace;

    fn sample_image() -> ImportedImage {
        ImportedImage {
            id: "sheet".to_string(),
            resolved_path: "art/sheet.png".to_string(),
            width: 64,
            height: 32,
            tight_row_bytes: 256,
            pixels: vec![0u8; 64 * 32 * 4],
            source_file_bytes: 1024,
            color_space: ColorSpace::Srgb,
        }
    }

    #[test]
    fn compact_mode_is_single_line() {
        let mut manifest = Manifest::default();
        manifest.schema_version = Some(1);
        manifest.package_name = Some("demo".to_string());
        manifest.output = Some("out/demo.prpk".to_string());
        let images = vec![sample_image()];
        let json = render(&manifest, &images, false).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"package_name\":\"demo\""));
    }

    #[test]
    fn pretty_mode_has_trailing_newline_and_indentation() {
        let mut manifest = Manifest::default();
        manifest.schema_version = Some(1);
        manifest.package_name = Some("demo".to_string());
        manifest.output = Some("out/demo.prpk".to_string());
        let images = vec![sample_image()];
        let json = render(&manifest, &images, true).unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.contains("  \""));
    }

    #[test]
    fn counts_reflect_manifest_entity_totals() {
        let mut manifest = Manifest::default();
        manifest.schema_version = Some(1);
        manifest.package_name = Some("demo".to_string());
        manifest.output = Some("out/demo.prpk".to_string());
        manifest.sprites.push(crate::manifest::model::SpriteEntry::default());
        manifest.animations.push(crate::manifest::model::AnimationEntry::default());
        let images = vec![sample_image()];
        let json = render(&manifest, &images, false).unwrap();
        assert!(json.contains("\"images\":1"));
        assert!(json.contains("\"sprites\":1"));
        assert!(json.contains("\"animations\":1"));
    }
}
