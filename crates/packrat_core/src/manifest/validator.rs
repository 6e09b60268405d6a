//! L2 — manifest semantic validator.
//!
//! Runs after L1 parsing succeeds. Checks referential integrity (sprite
//! source images, animation target sprites), value ranges, duplicate ids,
//! and per-mode required fields, emitting one diagnostic per violation
//! rather than stopping at the first one — mirrors
//! `pr_manifest_validate_semantics` / `pr_manifest_validate_duplicates` in
//! the reference implementation.

use super::model::*;
use crate::diagnostics::{codes, DiagCounter, Diagnostic};
use std::collections::HashSet;

const SUPPORTED_SCHEMA_VERSION: i64 = 1;

/// Validates `manifest`, emitting diagnostics through `diag`. Returns `true`
/// iff zero errors were emitted (warnings do not fail validation on their
/// own — strict-mode promotion, if any, is the caller's concern).
pub fn validate(path: &str, manifest: &Manifest, diag: &mut DiagCounter) -> bool {
    let before = diag.error_count;

    validate_root(path, manifest, diag);
    validate_atlas(path, manifest, diag);
    validate_images(path, manifest, diag);
    validate_sprites(path, manifest, diag);
    validate_animations(path, manifest, diag);
    validate_duplicates(path, manifest, diag);

    diag.error_count == before
}

fn validate_root(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    match manifest.schema_version {
        None => diag.emit(
            Diagnostic::error(codes::MANIFEST_MISSING_SCHEMA_VERSION, "schema_version is required.").with_file(path),
        ),
        Some(v) if v != SUPPORTED_SCHEMA_VERSION => diag.emit(
            Diagnostic::error(
                codes::MANIFEST_UNSUPPORTED_SCHEMA_VERSION,
                format!("Unsupported schema_version: {v} (expected {SUPPORTED_SCHEMA_VERSION})."),
            )
            .with_file(path),
        ),
        Some(_) => {}
    }

    if manifest.package_name.as_deref().unwrap_or("").is_empty() {
        diag.emit(Diagnostic::error(codes::MANIFEST_MISSING_PACKAGE_NAME, "package_name is required.").with_file(path));
    }

    match &manifest.output {
        None => diag.emit(Diagnostic::error(codes::MANIFEST_MISSING_OUTPUT, "output is required.").with_file(path)),
        Some(output) => {
            if output.is_empty() {
                diag.emit(Diagnostic::error(codes::MANIFEST_MISSING_OUTPUT, "output must not be empty.").with_file(path));
            } else if !output.ends_with(".prpk") {
                diag.emit(
                    Diagnostic::warning(
                        codes::MANIFEST_OUTPUT_EXTENSION,
                        format!("output '{output}' does not end in .prpk."),
                    )
                    .with_file(path),
                );
            }
        }
    }
}

fn validate_atlas(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    let atlas = &manifest.atlas;
    if atlas.max_page_width < 1 {
        diag.emit(
            Diagnostic::error(
                codes::ATLAS_MAX_WIDTH_RANGE,
                format!("atlas.max_page_width {} must be positive.", atlas.max_page_width),
            )
            .with_file(path),
        );
    }
    if atlas.max_page_height < 1 {
        diag.emit(
            Diagnostic::error(
                codes::ATLAS_MAX_HEIGHT_RANGE,
                format!("atlas.max_page_height {} must be positive.", atlas.max_page_height),
            )
            .with_file(path),
        );
    }
    if atlas.padding < 0 {
        diag.emit(
            Diagnostic::error(
                codes::ATLAS_PADDING_RANGE,
                format!("atlas.padding {} must be non-negative.", atlas.padding),
            )
            .with_file(path),
        );
    }
}

fn validate_images(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    for image in &manifest.images {
        if image.id.as_deref().unwrap_or("").is_empty() {
            diag.emit(
                Diagnostic::error(codes::IMAGES_MISSING_ID, "images entry requires a non-empty id.")
                    .with_file(path)
                    .with_line(image.line),
            );
        }
        if image.path.as_deref().unwrap_or("").is_empty() {
            diag.emit(
                Diagnostic::error(codes::IMAGES_MISSING_PATH, "images entry requires a non-empty path.")
                    .with_file(path)
                    .with_line(image.line)
                    .with_asset_id(image.id.clone().unwrap_or_default()),
            );
        }
    }
}

fn validate_sprites(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    for sprite in &manifest.sprites {
        let asset_id = sprite.id.clone().unwrap_or_default();

        if sprite.id.as_deref().unwrap_or("").is_empty() {
            diag.emit(
                Diagnostic::error(codes::SPRITES_MISSING_ID, "sprites entry requires a non-empty id.")
                    .with_file(path)
                    .with_line(sprite.line),
            );
        }

        match &sprite.source {
            None => diag.emit(
                Diagnostic::error(codes::SPRITES_MISSING_SOURCE, "sprites entry requires a source image id.")
                    .with_file(path)
                    .with_line(sprite.line)
                    .with_asset_id(asset_id.clone()),
            ),
            Some(source) => {
                if manifest.find_image_index(source).is_none() {
                    diag.emit(
                        Diagnostic::error(
                            codes::SPRITES_SOURCE_UNKNOWN,
                            format!("sprites.source '{source}' does not match any [[images]] id."),
                        )
                        .with_file(path)
                        .with_line(sprite.line)
                        .with_asset_id(asset_id.clone()),
                    );
                }
            }
        }

        if !(0.0..=1.0).contains(&sprite.pivot_x) {
            diag.emit(
                Diagnostic::error(codes::SPRITES_PIVOT_X_RANGE, format!("sprites.pivot_x {} out of range [0, 1].", sprite.pivot_x))
                    .with_file(path)
                    .with_line(sprite.line)
                    .with_asset_id(asset_id.clone()),
            );
        }
        if !(0.0..=1.0).contains(&sprite.pivot_y) {
            diag.emit(
                Diagnostic::error(codes::SPRITES_PIVOT_Y_RANGE, format!("sprites.pivot_y {} out of range [0, 1].", sprite.pivot_y))
                    .with_file(path)
                    .with_line(sprite.line)
                    .with_asset_id(asset_id.clone()),
            );
        }

        match sprite.mode {
            SpriteMode::Single => validate_single_mode(path, sprite, &asset_id, diag),
            SpriteMode::Grid => validate_grid_mode(path, sprite, &asset_id, diag),
            SpriteMode::Rects => validate_rects_mode(path, sprite, &asset_id, diag),
        }
    }
}

fn validate_single_mode(path: &str, sprite: &SpriteEntry, asset_id: &str, diag: &mut DiagCounter) {
    if sprite.w.is_some_and(|w| w <= 0) || sprite.h.is_some_and(|h| h <= 0) {
        diag.emit(
            Diagnostic::error(codes::SPRITES_SINGLE_W_RANGE, "single-mode sprites' w and h, when given, must be positive integers.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        );
    }
    let x = sprite.x.unwrap_or(0);
    let y = sprite.y.unwrap_or(0);
    if x < 0 || y < 0 {
        diag.emit(
            Diagnostic::error(codes::SPRITES_SINGLE_XY_RANGE, "single-mode sprites require non-negative x and y.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        );
    }
}

fn validate_grid_mode(path: &str, sprite: &SpriteEntry, asset_id: &str, diag: &mut DiagCounter) {
    match sprite.cell_w {
        Some(v) if v > 0 => {}
        _ => diag.emit(
            Diagnostic::error(codes::SPRITES_GRID_CELL_W, "grid-mode sprites require a positive cell_w.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        ),
    }
    match sprite.cell_h {
        Some(v) if v > 0 => {}
        _ => diag.emit(
            Diagnostic::error(codes::SPRITES_GRID_CELL_H, "grid-mode sprites require a positive cell_h.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        ),
    }
    if sprite.frame_start < 0 {
        diag.emit(
            Diagnostic::error(codes::SPRITES_GRID_FRAME_START, "grid-mode frame_start must be non-negative.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        );
    }
    if let Some(count) = sprite.frame_count {
        if count < 1 {
            diag.emit(
                Diagnostic::error(codes::SPRITES_GRID_FRAME_COUNT, "grid-mode frame_count must be at least 1.")
                    .with_file(path)
                    .with_line(sprite.line)
                    .with_asset_id(asset_id),
            );
        }
    }
}

fn validate_rects_mode(path: &str, sprite: &SpriteEntry, asset_id: &str, diag: &mut DiagCounter) {
    if sprite.rects.is_empty() {
        diag.emit(
            Diagnostic::error(codes::SPRITES_RECTS_EMPTY, "rects-mode sprites require at least one [[sprites.rects]] entry.")
                .with_file(path)
                .with_line(sprite.line)
                .with_asset_id(asset_id),
        );
        return;
    }
    for rect in &sprite.rects {
        match (rect.x, rect.y, rect.w, rect.h) {
            (Some(x), Some(y), Some(w), Some(h)) => {
                if x < 0 || y < 0 || w < 1 || h < 1 {
                    diag.emit(
                        Diagnostic::error(
                            codes::SPRITES_RECTS_RANGE,
                            "sprites.rects entry requires non-negative x/y and positive w/h.",
                        )
                        .with_file(path)
                        .with_line(rect.line)
                        .with_asset_id(asset_id),
                    );
                }
            }
            _ => diag.emit(
                Diagnostic::error(codes::SPRITES_RECTS_MISSING_FIELDS, "sprites.rects entry requires x, y, w, and h.")
                    .with_file(path)
                    .with_line(rect.line)
                    .with_asset_id(asset_id),
            ),
        }
    }
}

/// Upper bound used when an animation frame index has no statically knowable
/// sprite frame count (e.g. the sprite itself already failed validation).
/// Mirrors `pr_manifest_sprite_frame_count_hint`'s fallback of treating an
/// unresolved sprite as having no frames, so every frame index is flagged.
fn sprite_frame_count_hint(manifest: &Manifest, sprite_id: &str) -> Option<i64> {
    let idx = manifest.find_sprite_index(sprite_id)?;
    let sprite = &manifest.sprites[idx];
    match sprite.mode {
        SpriteMode::Single => Some(1),
        SpriteMode::Grid => sprite.frame_count,
        SpriteMode::Rects => Some(sprite.rects.len() as i64),
    }
}

fn validate_animations(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    for animation in &manifest.animations {
        let asset_id = animation.id.clone().unwrap_or_default();

        if animation.id.as_deref().unwrap_or("").is_empty() {
            diag.emit(
                Diagnostic::error(codes::ANIM_MISSING_ID, "animations entry requires a non-empty id.")
                    .with_file(path)
                    .with_line(animation.line),
            );
        }

        let mut frame_count_hint = None;
        let mut sprite_resolved = false;
        match &animation.sprite {
            None => diag.emit(
                Diagnostic::error(codes::ANIM_MISSING_SPRITE, "animations entry requires a target sprite id.")
                    .with_file(path)
                    .with_line(animation.line)
                    .with_asset_id(asset_id.clone()),
            ),
            Some(sprite_id) => {
                if manifest.find_sprite_index(sprite_id).is_none() {
                    diag.emit(
                        Diagnostic::error(
                            codes::ANIM_SPRITE_UNKNOWN,
                            format!("animations.sprite '{sprite_id}' does not match any [[sprites]] id."),
                        )
                        .with_file(path)
                        .with_line(animation.line)
                        .with_asset_id(asset_id.clone()),
                    );
                } else {
                    sprite_resolved = true;
                    frame_count_hint = sprite_frame_count_hint(manifest, sprite_id);
                }
            }
        }

        if sprite_resolved && frame_count_hint.is_none() {
            diag.emit(
                Diagnostic::warning(
                    codes::ANIM_FRAME_INDEX_UNBOUNDED,
                    "referenced sprite is a grid without an explicit frame_count; frame indices cannot be fully range-checked.",
                )
                .with_file(path)
                .with_line(animation.line)
                .with_asset_id(asset_id.clone()),
            );
        }

        match &animation.frames {
            None => diag.emit(
                Diagnostic::error(codes::ANIM_FRAMES_MISSING, "animations entry requires a non-empty frames array.")
                    .with_file(path)
                    .with_line(animation.line)
                    .with_asset_id(asset_id.clone()),
            ),
            Some(frames) => {
                for frame in frames {
                    let index = frame.index.unwrap_or(-1);
                    if index < 0 {
                        diag.emit(
                            Diagnostic::error(codes::ANIM_FRAME_INDEX_RANGE, "animation frame index must be non-negative.")
                                .with_file(path)
                                .with_line(frame.line)
                                .with_asset_id(asset_id.clone()),
                        );
                    } else if let Some(hint) = frame_count_hint {
                        if index >= hint {
                            diag.emit(
                                Diagnostic::error(
                                    codes::ANIM_FRAME_INDEX_OOB,
                                    format!("animation frame index {index} is out of bounds for sprite with {hint} frame(s)."),
                                )
                                .with_file(path)
                                .with_line(frame.line)
                                .with_asset_id(asset_id.clone()),
                            );
                        }
                    }

                    let ms = frame.ms.unwrap_or(0);
                    if ms < 1 {
                        diag.emit(
                            Diagnostic::error(codes::ANIM_FRAME_MS_RANGE, "animation frame ms must be at least 1.")
                                .with_file(path)
                                .with_line(frame.line)
                                .with_asset_id(asset_id.clone()),
                        );
                    }
                }
            }
        }
    }
}

fn validate_duplicates(path: &str, manifest: &Manifest, diag: &mut DiagCounter) {
    let mut seen = HashSet::new();
    for image in &manifest.images {
        if let Some(id) = &image.id {
            if !seen.insert(id.as_str()) {
                diag.emit(
                    Diagnostic::error(codes::IMAGES_DUPLICATE_ID, format!("duplicate images id '{id}'."))
                        .with_file(path)
                        .with_line(image.line),
                );
            }
        }
    }

    let mut seen = HashSet::new();
    for sprite in &manifest.sprites {
        if let Some(id) = &sprite.id {
            if !seen.insert(id.as_str()) {
                diag.emit(
                    Diagnostic::error(codes::SPRITES_DUPLICATE_ID, format!("duplicate sprites id '{id}'."))
                        .with_file(path)
                        .with_line(sprite.line),
                );
            }
        }
    }

    let mut seen = HashSet::new();
    for animation in &manifest.animations {
        if let Some(id) = &animation.id {
            if !seen.insert(id.as_str()) {
                diag.emit(
                    Diagnostic::error(codes::ANIM_DUPLICATE_ID, format!("duplicate animations id '{id}'."))
                        .with_file(path)
                        .with_line(animation.line),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parser::parse_text;

    fn validate_text(text: &str) -> (Manifest, bool) {
        let mut manifest = Manifest::default();
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        assert!(parse_text("test.toml", text, &mut counter, &mut manifest), "parse failed");
        let ok = validate("test.toml", &manifest, &mut counter);
        (manifest, ok)
    }

    fn minimal_header() -> &'static str {
        r#"
        schema_version = 1
        package_name = "demo"
        output = "out/demo.prpk"
        "#
    }

    #[test]
    fn accepts_minimal_valid_manifest() {
        let text = format!(
            "{}\n[[images]]\nid = \"sheet\"\npath = \"sheet.png\"\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"single\"\nw = 32\nh = 32\n",
            minimal_header()
        );
        let (_manifest, ok) = validate_text(&text);
        assert!(ok);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let (_manifest, ok) = validate_text("schema_version = 99\npackage_name = \"demo\"\noutput = \"out.prpk\"\n");
        assert!(!ok);
    }

    #[test]
    fn rejects_sprite_with_unknown_source() {
        let text = format!("{}\n[[sprites]]\nid = \"hero\"\nsource = \"missing\"\nmode = \"single\"\nw = 1\nh = 1\n", minimal_header());
        let (_manifest, ok) = validate_text(&text);
        assert!(!ok);
    }

    #[test]
    fn rejects_duplicate_sprite_ids() {
        let text = format!(
            "{}\n[[images]]\nid = \"sheet\"\npath = \"s.png\"\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"single\"\nw = 1\nh = 1\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"single\"\nw = 1\nh = 1\n",
            minimal_header()
        );
        let (_manifest, ok) = validate_text(&text);
        assert!(!ok);
    }

    #[test]
    fn rejects_animation_frame_index_out_of_bounds() {
        let text = format!(
            "{}\n[[images]]\nid = \"sheet\"\npath = \"s.png\"\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"grid\"\ncell_w = 8\ncell_h = 8\nframe_count = 2\n\n[[animations]]\nid = \"walk\"\nsprite = \"hero\"\nframes = [{{ index = 5, ms = 100 }}]\n",
            minimal_header()
        );
        let (_manifest, ok) = validate_text(&text);
        assert!(!ok);
    }

    #[test]
    fn warns_on_non_prpk_output_extension() {
        let mut manifest = Manifest::default();
        let mut sink_calls = Vec::new();
        let text = "schema_version = 1\npackage_name = \"demo\"\noutput = \"out/demo.bin\"\n";
        {
            let mut sink = |d: Diagnostic| sink_calls.push(d);
            let mut counter = DiagCounter::new(&mut sink);
            assert!(parse_text("test.toml", text, &mut counter, &mut manifest));
            assert!(validate("test.toml", &manifest, &mut counter));
        }
        assert!(sink_calls.iter().any(|d| d.code == codes::MANIFEST_OUTPUT_EXTENSION));
    }
}
