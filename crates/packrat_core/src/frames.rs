//! L4 — sprite frame resolver.
//!
//! Expands each sprite's authoring mode (`single` / `grid` / `rects`) into a
//! flat, global list of source rectangles, in sprite-declaration order. This
//! is a "later stage" per spec.md §7: the first invalid rectangle aborts the
//! whole stage rather than collecting diagnostics across every sprite.

use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use crate::image_import::ImportedImage;
use crate::manifest::model::{Manifest, SpriteEntry, SpriteMode};

/// One sprite frame's source rectangle, prior to atlas placement.
#[derive(Debug, Clone, Copy)]
pub struct FrameSource {
    pub sprite_index: usize,
    pub local_frame_index: usize,
    pub source_x: i64,
    pub source_y: i64,
    pub source_w: i64,
    pub source_h: i64,
}

/// `(first_frame, frame_count)` for each sprite, indices into the returned
/// global frame array, aligned with `manifest.sprites`.
pub type SpriteFrameRange = (usize, usize);

pub fn resolve_frames(
    manifest: &Manifest,
    images: &[ImportedImage],
    diag: &mut DiagCounter,
) -> Result<(Vec<FrameSource>, Vec<SpriteFrameRange>), PackratError> {
    let mut frames = Vec::new();
    let mut ranges = Vec::with_capacity(manifest.sprites.len());

    for (sprite_index, sprite) in manifest.sprites.iter().enumerate() {
        let image = resolve_source_image(manifest, images, sprite)?;
        let first_frame = frames.len();

        let local_rects = match sprite.mode {
            SpriteMode::Single => resolve_single(sprite, image, diag)?,
            SpriteMode::Rects => resolve_rects(sprite, image, diag)?,
            SpriteMode::Grid => resolve_grid(sprite, image, diag)?,
        };

        if local_rects.is_empty() {
            diag.emit(
                Diagnostic::error(codes::FRAME_ZERO_FRAMES, "sprite resolved to zero frames.")
                    .with_asset_id(sprite.id.clone().unwrap_or_default()),
            );
            return Err(PackratError::new(Status::ValidationError, "sprite resolved to zero frames"));
        }

        for (local_frame_index, (x, y, w, h)) in local_rects.into_iter().enumerate() {
            frames.push(FrameSource {
                sprite_index,
                local_frame_index,
                source_x: x,
                source_y: y,
                source_w: w,
                source_h: h,
            });
        }

        ranges.push((first_frame, frames.len() - first_frame));
    }

    Ok((frames, ranges))
}

fn resolve_source_image<'a>(
    manifest: &Manifest,
    images: &'a [ImportedImage],
    sprite: &SpriteEntry,
) -> Result<&'a ImportedImage, PackratError> {
    let source = sprite.source.as_deref().unwrap_or("");
    let image_index = manifest.find_image_index(source).ok_or_else(|| {
        PackratError::new(
            Status::InternalError,
            format!("sprite '{}' references unresolved source image (should have failed validation)", source),
        )
    })?;
    images.get(image_index).ok_or_else(|| {
        PackratError::new(
            Status::InternalError,
            "image index out of range for imported images (should have failed import)".to_string(),
        )
    })
}

fn in_bounds(x: i64, y: i64, w: i64, h: i64, image: &ImportedImage) -> bool {
    x >= 0 && y >= 0 && w > 0 && h > 0 && x + w <= image.width as i64 && y + h <= image.height as i64
}

fn resolve_single(
    sprite: &SpriteEntry,
    image: &ImportedImage,
    diag: &mut DiagCounter,
) -> Result<Vec<(i64, i64, i64, i64)>, PackratError> {
    let x = sprite.x.unwrap_or(0);
    let y = sprite.y.unwrap_or(0);
    let w = sprite.w.unwrap_or(image.width as i64);
    let h = sprite.h.unwrap_or(image.height as i64);

    if !in_bounds(x, y, w, h, image) {
        diag.emit(
            Diagnostic::error(
                codes::FRAME_OUT_OF_BOUNDS,
                format!("single-mode sprite rectangle ({x},{y},{w},{h}) lies outside image bounds ({}x{}).", image.width, image.height),
            )
            .with_asset_id(sprite.id.clone().unwrap_or_default()),
        );
        return Err(PackratError::new(Status::ValidationError, "sprite rectangle out of image bounds"));
    }

    Ok(vec![(x, y, w, h)])
}

fn resolve_rects(
    sprite: &SpriteEntry,
    image: &ImportedImage,
    diag: &mut DiagCounter,
) -> Result<Vec<(i64, i64, i64, i64)>, PackratError> {
    let mut rects = Vec::with_capacity(sprite.rects.len());
    for rect in &sprite.rects {
        let x = rect.x.unwrap_or(0);
        let y = rect.y.unwrap_or(0);
        let w = rect.w.unwrap_or(0);
        let h = rect.h.unwrap_or(0);
        if !in_bounds(x, y, w, h, image) {
            diag.emit(
                Diagnostic::error(
                    codes::FRAME_OUT_OF_BOUNDS,
                    format!("rects-mode rectangle ({x},{y},{w},{h}) lies outside image bounds ({}x{}).", image.width, image.height),
                )
                .with_asset_id(sprite.id.clone().unwrap_or_default()),
            );
            return Err(PackratError::new(Status::ValidationError, "sprite rectangle out of image bounds"));
        }
        rects.push((x, y, w, h));
    }
    Ok(rects)
}

fn resolve_grid(
    sprite: &SpriteEntry,
    image: &ImportedImage,
    diag: &mut DiagCounter,
) -> Result<Vec<(i64, i64, i64, i64)>, PackratError> {
    let cell_w = sprite.cell_w.unwrap_or(0);
    let cell_h = sprite.cell_h.unwrap_or(0);
    let asset_id = sprite.id.clone().unwrap_or_default();

    let cols = 1 + (image.width as i64 - sprite.margin_x - cell_w) / (cell_w + sprite.spacing_x);
    let rows = 1 + (image.height as i64 - sprite.margin_y - cell_h) / (cell_h + sprite.spacing_y);

    if cols < 1 || rows < 1 {
        diag.emit(
            Diagnostic::error(
                codes::SPRITES_GRID_FRAME_RANGE_OOB,
                format!("grid-mode sprite geometry yields non-positive cols/rows ({cols}x{rows})."),
            )
            .with_asset_id(asset_id),
        );
        return Err(PackratError::new(Status::ValidationError, "grid sprite geometry invalid"));
    }

    let frame_count = sprite.frame_count.unwrap_or(cols * rows - sprite.frame_start);
    if sprite.frame_start < 0 || frame_count < 0 || sprite.frame_start + frame_count > cols * rows {
        diag.emit(
            Diagnostic::error(
                codes::SPRITES_GRID_FRAME_RANGE_OOB,
                format!(
                    "grid-mode frame range [{}, {}) exceeds {cols}x{rows}={} available cells.",
                    sprite.frame_start,
                    sprite.frame_start + frame_count,
                    cols * rows
                ),
            )
            .with_asset_id(asset_id),
        );
        return Err(PackratError::new(Status::ValidationError, "grid sprite frame range out of bounds"));
    }

    let mut rects = Vec::with_capacity(frame_count as usize);
    for cell_index in sprite.frame_start..sprite.frame_start + frame_count {
        let row = cell_index / cols;
        let col = cell_index % cols;
        let source_x = sprite.margin_x + col * (cell_w + sprite.spacing_x);
        let source_y = sprite.margin_y + row * (cell_h + sprite.spacing_y);
        if !in_bounds(source_x, source_y, cell_w, cell_h, image) {
            diag.emit(
                Diagnostic::error(
                    codes::FRAME_OUT_OF_BOUNDS,
                    format!("grid cell {cell_index} rectangle ({source_x},{source_y},{cell_w},{cell_h}) lies outside image bounds ({}x{}).", image.width, image.height),
                )
                .with_asset_id(sprite.id.clone().unwrap_or_default()),
            );
            return Err(PackratError::new(Status::ValidationError, "grid cell out of image bounds"));
        }
        rects.push((source_x, source_y, cell_w, cell_h));
    }
    Ok(rects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagCounter;
    use crate::manifest::model::{ImageEntry, SpriteRect};

    fn image(width: u32, height: u32) -> ImportedImage {
        ImportedImage {
            id: "sheet".to_string(),
            resolved_path: "sheet.png".to_string(),
            width,
            height,
            tight_row_bytes: width * 4,
            pixels: vec![0u8; (width * height * 4) as usize],
            source_file_bytes: 0,
            color_space: crate::manifest::model::ColorSpace::Srgb,
        }
    }

    fn manifest_with_sprite(sprite: SpriteEntry) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.images.push(ImageEntry {
            id: Some("sheet".to_string()),
            path: Some("sheet.png".to_string()),
            ..Default::default()
        });
        manifest.sprites.push(sprite);
        manifest
    }

    #[test]
    fn single_mode_defaults_to_full_image() {
        let manifest = manifest_with_sprite(SpriteEntry {
            id: Some("hero".to_string()),
            source: Some("sheet".to_string()),
            mode: SpriteMode::Single,
            ..Default::default()
        });
        let images = vec![image(64, 32)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (frames, ranges) = resolve_frames(&manifest, &images, &mut counter).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!((frames[0].source_w, frames[0].source_h), (64, 32));
        assert_eq!(ranges[0], (0, 1));
    }

    #[test]
    fn grid_mode_expands_requested_range() {
        let manifest = manifest_with_sprite(SpriteEntry {
            id: Some("hero".to_string()),
            source: Some("sheet".to_string()),
            mode: SpriteMode::Grid,
            cell_w: Some(32),
            cell_h: Some(32),
            frame_start: 1,
            frame_count: Some(4),
            ..Default::default()
        });
        let images = vec![image(128, 64)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (frames, _ranges) = resolve_frames(&manifest, &images, &mut counter).unwrap();
        let rects: Vec<_> = frames.iter().map(|f| (f.source_x, f.source_y, f.source_w, f.source_h)).collect();
        assert_eq!(
            rects,
            vec![(32, 0, 32, 32), (64, 0, 32, 32), (96, 0, 32, 32), (0, 32, 32, 32)]
        );
    }

    #[test]
    fn rects_mode_preserves_declaration_order() {
        let mut sprite = SpriteEntry {
            id: Some("icons".to_string()),
            source: Some("sheet".to_string()),
            mode: SpriteMode::Rects,
            ..Default::default()
        };
        sprite.rects.push(SpriteRect { x: Some(0), y: Some(0), w: Some(16), h: Some(16), ..Default::default() });
        sprite.rects.push(SpriteRect { x: Some(16), y: Some(0), w: Some(16), h: Some(16), ..Default::default() });
        let manifest = manifest_with_sprite(sprite);
        let images = vec![image(32, 16)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (frames, ranges) = resolve_frames(&manifest, &images, &mut counter).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(ranges[0], (0, 2));
    }

    #[test]
    fn out_of_bounds_single_rect_fails_the_stage() {
        let manifest = manifest_with_sprite(SpriteEntry {
            id: Some("hero".to_string()),
            source: Some("sheet".to_string()),
            mode: SpriteMode::Single,
            w: Some(999),
            h: Some(999),
            ..Default::default()
        });
        let images = vec![image(64, 32)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = resolve_frames(&manifest, &images, &mut counter);
        assert!(result.is_err());
    }
}
