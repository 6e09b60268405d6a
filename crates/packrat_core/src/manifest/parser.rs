//! L1 — manifest loader/parser.
//!
//! A hand-rolled line-oriented scanner for the TOML subset described in
//! spec.md §4.1, state-machine driven exactly like the reference C
//! implementation's `pr_manifest_parse_state_t`: a tagged "current section"
//! plus optional indices tracking the most recently opened `[[images]]`,
//! `[[sprites]]`, `[[sprites.rects]]`, and `[[animations]]` entries.

use super::model::*;
use crate::diagnostics::{codes, DiagCounter, Diagnostic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Atlas,
    Image,
    Sprite,
    SpriteRects,
    Animation,
}

struct ParseState {
    section: Section,
    current_image: Option<usize>,
    current_sprite: Option<usize>,
    current_rect: Option<usize>,
    current_animation: Option<usize>,
    error_count: u32,
}

impl ParseState {
    fn mark_error(&mut self) {
        self.error_count += 1;
    }
}

/// Parses manifest text into a [`Manifest`]. Returns `true` iff parsing
/// completed with zero errors (diagnostics have already been emitted
/// either way); on failure the caller should discard the partial model,
/// matching spec.md §4.1's "abort with parse-error status" contract.
pub fn parse_text(path: &str, text: &str, diag: &mut DiagCounter, manifest: &mut Manifest) -> bool {
    let raw_lines: Vec<&str> = text.split('\n').collect();
    let mut state = ParseState {
        section: Section::Root,
        current_image: None,
        current_sprite: None,
        current_rect: None,
        current_animation: None,
        error_count: 0,
    };

    let mut i = 0usize;
    while i < raw_lines.len() {
        let line_number = (i + 1) as u32;
        let stripped = strip_comment(raw_lines[i]);
        let line = stripped.trim();

        if line.is_empty() {
            i += 1;
            continue;
        }

        if line.starts_with('[') {
            match parse_section_header(line) {
                Some(section) => {
                    state.section = section;
                    state.current_rect = None;
                    match section {
                        Section::Image => {
                            manifest.images.push(ImageEntry {
                                line: line_number,
                                ..Default::default()
                            });
                            state.current_image = Some(manifest.images.len() - 1);
                        }
                        Section::Sprite => {
                            manifest.sprites.push(SpriteEntry {
                                line: line_number,
                                ..Default::default()
                            });
                            state.current_sprite = Some(manifest.sprites.len() - 1);
                        }
                        Section::SpriteRects => {
                            match state.current_sprite {
                                Some(sprite_idx) => {
                                    let sprite = &mut manifest.sprites[sprite_idx];
                                    sprite.rects.push(SpriteRect {
                                        line: line_number,
                                        ..Default::default()
                                    });
                                    state.current_rect = Some(sprite.rects.len() - 1);
                                }
                                None => {
                                    diag.emit(
                                        Diagnostic::error(
                                            codes::MANIFEST_RECTS_NO_SPRITE,
                                            "[[sprites.rects]] requires an active [[sprites]] entry.",
                                        )
                                        .with_file(path)
                                        .with_line(line_number),
                                    );
                                    state.mark_error();
                                }
                            }
                        }
                        Section::Animation => {
                            manifest.animations.push(AnimationEntry {
                                line: line_number,
                                ..Default::default()
                            });
                            state.current_animation = Some(manifest.animations.len() - 1);
                        }
                        Section::Root | Section::Atlas => {}
                    }
                }
                None => {
                    diag.emit(
                        Diagnostic::error(
                            codes::MANIFEST_UNKNOWN_SECTION,
                            "Unknown or unsupported section header.",
                        )
                        .with_file(path)
                        .with_line(line_number),
                    );
                    state.mark_error();
                }
            }
            i += 1;
            continue;
        }

        match split_key_value(line) {
            None => {
                diag.emit(
                    Diagnostic::error(
                        codes::MANIFEST_INVALID_ASSIGNMENT,
                        "Invalid key/value assignment.",
                    )
                    .with_file(path)
                    .with_line(line_number),
                );
                state.mark_error();
            }
            Some((key, value)) => match state.section {
                Section::Root => {
                    parse_root_assignment(&mut state, manifest, diag, path, key, value, line_number)
                }
                Section::Atlas => {
                    parse_atlas_assignment(&mut state, manifest, diag, path, key, value, line_number)
                }
                Section::Image => parse_image_assignment(
                    &mut state, manifest, diag, path, key, value, line_number,
                ),
                Section::Sprite => parse_sprite_assignment(
                    &mut state, manifest, diag, path, key, value, line_number,
                ),
                Section::SpriteRects => parse_sprite_rect_assignment(
                    &mut state, manifest, diag, path, key, value, line_number,
                ),
                Section::Animation => parse_animation_assignment(
                    &mut state, manifest, diag, path, &raw_lines, &mut i, key, value, line_number,
                ),
            },
        }

        i += 1;
    }

    state.error_count == 0
}

fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escape_next = false;
    for (idx, ch) in line.char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
                continue;
            }
            if ch == '\\' {
                escape_next = true;
                continue;
            }
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            continue;
        }
        if ch == '#' {
            return &line[..idx];
        }
    }
    line
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let mut in_string = false;
    let mut escape_next = false;
    for (idx, ch) in line.char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
                continue;
            }
            if ch == '\\' {
                escape_next = true;
                continue;
            }
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            continue;
        }
        if ch == '=' {
            let key = line[..idx].trim();
            let value = line[idx + 1..].trim();
            return if key.is_empty() { None } else { Some((key, value)) };
        }
    }
    None
}

fn parse_string_value(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = rest.chars();
        let mut escape_next = false;
        let mut closed = false;
        let mut remainder = "";
        loop {
            let before = chars.as_str();
            match chars.next() {
                None => break,
                Some(ch) => {
                    if escape_next {
                        out.push(match ch {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                        escape_next = false;
                        continue;
                    }
                    if ch == '\\' {
                        escape_next = true;
                        continue;
                    }
                    if ch == '"' {
                        closed = true;
                        remainder = chars.as_str();
                        let _ = before;
                        break;
                    }
                    out.push(ch);
                }
            }
        }
        if !closed || !remainder.trim().is_empty() {
            return None;
        }
        Some(out)
    } else {
        Some(value.to_string())
    }
}

fn parse_int_value(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

fn parse_double_value(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_section_header(line: &str) -> Option<Section> {
    match line {
        "[atlas]" => Some(Section::Atlas),
        "[[images]]" => Some(Section::Image),
        "[[sprites]]" => Some(Section::Sprite),
        "[[sprites.rects]]" => Some(Section::SpriteRects),
        "[[animations]]" => Some(Section::Animation),
        _ => None,
    }
}

fn bracket_depth_delta(text: &str) -> i32 {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;
    for ch in text.chars() {
        if in_string {
            if escape_next {
                escape_next = false;
                continue;
            }
            if ch == '\\' {
                escape_next = true;
                continue;
            }
            if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            continue;
        }
        if ch == '[' {
            depth += 1;
        } else if ch == ']' {
            depth -= 1;
        }
    }
    depth
}

/// Gathers a (possibly multi-line) `[ ... ]` array value, advancing
/// `*line_index` past any continuation lines it consumes, mirroring
/// `pr_manifest_collect_array_value`.
fn collect_array_value(
    lines: &[&str],
    line_index: &mut usize,
    initial_value: &str,
    diag: &mut DiagCounter,
    path: &str,
) -> Option<String> {
    if !initial_value.starts_with('[') {
        diag.emit(
            Diagnostic::error(
                codes::MANIFEST_ARRAY_MISSING_OPEN,
                "Array value must start with '['.",
            )
            .with_file(path)
            .with_line((*line_index + 1) as u32),
        );
        return None;
    }

    let mut combined = String::from(initial_value);
    let mut depth = bracket_depth_delta(initial_value);
    while depth > 0 {
        if *line_index + 1 >= lines.len() {
            diag.emit(
                Diagnostic::error(codes::MANIFEST_ARRAY_UNTERMINATED, "Unterminated array value.")
                    .with_file(path)
                    .with_line((*line_index + 1) as u32),
            );
            return None;
        }
        *line_index += 1;
        let line = strip_comment(lines[*line_index]).trim();
        combined.push('\n');
        combined.push_str(line);
        depth += bracket_depth_delta(line);
    }

    Some(combined)
}

fn parse_root_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    key: &str,
    value: &str,
    line: u32,
) {
    match key {
        "schema_version" => match parse_int_value(value) {
            Some(v) => manifest.schema_version = Some(v),
            None => emit_type_error(diag, path, line, "manifest.schema_version_invalid", "schema_version must be an integer.", state),
        },
        "package_name" => match parse_string_value(value) {
            Some(v) => manifest.package_name = Some(v),
            None => emit_type_error(diag, path, line, "manifest.package_name_invalid", "package_name must be a string.", state),
        },
        "output" => match parse_string_value(value) {
            Some(v) => manifest.output = Some(v),
            None => emit_type_error(diag, path, line, "manifest.output_invalid", "output must be a string.", state),
        },
        "debug_output" => match parse_string_value(value) {
            Some(v) => manifest.debug_output = Some(v),
            None => emit_type_error(diag, path, line, "manifest.debug_output_invalid", "debug_output must be a string.", state),
        },
        "pretty_debug_json" => match parse_bool_value(value) {
            Some(v) => manifest.pretty_debug_json = v,
            None => emit_type_error(diag, path, line, "manifest.pretty_debug_json_invalid", "pretty_debug_json must be true or false.", state),
        },
        _ => {
            diag.emit(
                Diagnostic::error("manifest.unknown_root_key", format!("Unknown top-level key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

fn parse_atlas_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    key: &str,
    value: &str,
    line: u32,
) {
    let atlas = &mut manifest.atlas;
    match key {
        "max_page_width" => match parse_int_value(value) {
            Some(v) => atlas.max_page_width = v,
            None => emit_type_error(diag, path, line, "manifest.atlas.max_page_width_invalid", "atlas.max_page_width must be an integer.", state),
        },
        "max_page_height" => match parse_int_value(value) {
            Some(v) => atlas.max_page_height = v,
            None => emit_type_error(diag, path, line, "manifest.atlas.max_page_height_invalid", "atlas.max_page_height must be an integer.", state),
        },
        "padding" => match parse_int_value(value) {
            Some(v) => atlas.padding = v,
            None => emit_type_error(diag, path, line, "manifest.atlas.padding_invalid", "atlas.padding must be an integer.", state),
        },
        "power_of_two" => match parse_bool_value(value) {
            Some(v) => atlas.power_of_two = v,
            None => emit_type_error(diag, path, line, "manifest.atlas.power_of_two_invalid", "atlas.power_of_two must be true or false.", state),
        },
        "sampling" => match parse_string_value(value) {
            Some(v) => match v.as_str() {
                "pixel" => atlas.sampling = Sampling::Pixel,
                "linear" => atlas.sampling = Sampling::Linear,
                _ => emit_type_error(diag, path, line, codes::ATLAS_SAMPLING_UNKNOWN, "atlas.sampling must be pixel or linear.", state),
            },
            None => emit_type_error(diag, path, line, "manifest.atlas.sampling_invalid", "atlas.sampling must be a string.", state),
        },
        _ => {
            diag.emit(
                Diagnostic::error("manifest.atlas.unknown_key", format!("Unknown atlas key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

fn parse_image_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    key: &str,
    value: &str,
    line: u32,
) {
    let Some(idx) = state.current_image else {
        diag.emit(
            Diagnostic::error("manifest.images.no_active_block", "Image assignment without active [[images]] block.")
                .with_file(path)
                .with_line(line),
        );
        state.mark_error();
        return;
    };
    let image = &mut manifest.images[idx];
    match key {
        "id" => match parse_string_value(value) {
            Some(v) => image.id = Some(v),
            None => emit_type_error(diag, path, line, "manifest.images.id_invalid", "images.id must be a string.", state),
        },
        "path" => match parse_string_value(value) {
            Some(v) => image.path = Some(v),
            None => emit_type_error(diag, path, line, "manifest.images.path_invalid", "images.path must be a string.", state),
        },
        "premultiply_alpha" => match parse_bool_value(value) {
            Some(v) => image.premultiply_alpha = v,
            None => emit_type_error(diag, path, line, "manifest.images.premultiply_alpha_invalid", "images.premultiply_alpha must be true or false.", state),
        },
        "color_space" => match parse_string_value(value) {
            Some(v) => match v.as_str() {
                "srgb" => image.color_space = Some(ColorSpace::Srgb),
                "linear" => image.color_space = Some(ColorSpace::Linear),
                _ => emit_type_error(diag, path, line, codes::IMAGES_COLOR_SPACE_UNKNOWN, "images.color_space must be srgb or linear.", state),
            },
            None => emit_type_error(diag, path, line, "manifest.images.color_space_invalid", "images.color_space must be a string.", state),
        },
        _ => {
            diag.emit(
                Diagnostic::error("manifest.images.unknown_key", format!("Unknown images key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

fn parse_sprite_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    key: &str,
    value: &str,
    line: u32,
) {
    let Some(idx) = state.current_sprite else {
        diag.emit(
            Diagnostic::error("manifest.sprites.no_active_block", "Sprite assignment without active [[sprites]] block.")
                .with_file(path)
                .with_line(line),
        );
        state.mark_error();
        return;
    };
    let sprite = &mut manifest.sprites[idx];
    match key {
        "id" => match parse_string_value(value) {
            Some(v) => sprite.id = Some(v),
            None => emit_type_error(diag, path, line, "manifest.sprites.id_invalid", "sprites.id must be a string.", state),
        },
        "source" => match parse_string_value(value) {
            Some(v) => sprite.source = Some(v),
            None => emit_type_error(diag, path, line, "manifest.sprites.source_invalid", "sprites.source must be a string.", state),
        },
        "mode" => match parse_string_value(value) {
            Some(v) => match v.as_str() {
                "single" => sprite.mode = SpriteMode::Single,
                "grid" => sprite.mode = SpriteMode::Grid,
                "rects" => sprite.mode = SpriteMode::Rects,
                _ => emit_type_error(diag, path, line, "manifest.sprites.mode_unknown", "sprites.mode must be one of single, grid, rects.", state),
            },
            None => emit_type_error(diag, path, line, "manifest.sprites.mode_invalid", "sprites.mode must be a string.", state),
        },
        "pivot_x" => match parse_double_value(value) {
            Some(v) => sprite.pivot_x = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.pivot_x_invalid", "sprites.pivot_x must be a number.", state),
        },
        "pivot_y" => match parse_double_value(value) {
            Some(v) => sprite.pivot_y = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.pivot_y_invalid", "sprites.pivot_y must be a number.", state),
        },
        "x" => set_int_field(&mut sprite.x, value, diag, path, line, "manifest.sprites.x_invalid", "sprites.x must be an integer.", state),
        "y" => set_int_field(&mut sprite.y, value, diag, path, line, "manifest.sprites.y_invalid", "sprites.y must be an integer.", state),
        "w" => set_int_field(&mut sprite.w, value, diag, path, line, "manifest.sprites.w_invalid", "sprites.w must be an integer.", state),
        "h" => set_int_field(&mut sprite.h, value, diag, path, line, "manifest.sprites.h_invalid", "sprites.h must be an integer.", state),
        "cell_w" => set_int_field(&mut sprite.cell_w, value, diag, path, line, "manifest.sprites.cell_w_invalid", "sprites.cell_w must be an integer.", state),
        "cell_h" => set_int_field(&mut sprite.cell_h, value, diag, path, line, "manifest.sprites.cell_h_invalid", "sprites.cell_h must be an integer.", state),
        "frame_start" => match parse_int_value(value) {
            Some(v) => sprite.frame_start = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.frame_start_invalid", "sprites.frame_start must be an integer.", state),
        },
        "frame_count" => set_int_field(&mut sprite.frame_count, value, diag, path, line, "manifest.sprites.frame_count_invalid", "sprites.frame_count must be an integer.", state),
        "margin_x" => match parse_int_value(value) {
            Some(v) => sprite.margin_x = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.margin_x_invalid", "sprites.margin_x must be an integer.", state),
        },
        "margin_y" => match parse_int_value(value) {
            Some(v) => sprite.margin_y = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.margin_y_invalid", "sprites.margin_y must be an integer.", state),
        },
        "spacing_x" => match parse_int_value(value) {
            Some(v) => sprite.spacing_x = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.spacing_x_invalid", "sprites.spacing_x must be an integer.", state),
        },
        "spacing_y" => match parse_int_value(value) {
            Some(v) => sprite.spacing_y = v,
            None => emit_type_error(diag, path, line, "manifest.sprites.spacing_y_invalid", "sprites.spacing_y must be an integer.", state),
        },
        _ => {
            diag.emit(
                Diagnostic::error("manifest.sprites.unknown_key", format!("Unknown sprites key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

fn set_int_field(
    field: &mut Option<i64>,
    value: &str,
    diag: &mut DiagCounter,
    path: &str,
    line: u32,
    code: &'static str,
    message: &'static str,
    state: &mut ParseState,
) {
    match parse_int_value(value) {
        Some(v) => *field = Some(v),
        None => emit_type_error(diag, path, line, code, message, state),
    }
}

fn emit_type_error(
    diag: &mut DiagCounter,
    path: &str,
    line: u32,
    code: &'static str,
    message: &'static str,
    state: &mut ParseState,
) {
    diag.emit(Diagnostic::error(code, message).with_file(path).with_line(line));
    state.mark_error();
}

fn parse_sprite_rect_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    key: &str,
    value: &str,
    line: u32,
) {
    let (Some(sprite_idx), Some(rect_idx)) = (state.current_sprite, state.current_rect) else {
        diag.emit(
            Diagnostic::error(
                "manifest.sprites.rects.no_active_block",
                "sprites.rects assignment without active [[sprites.rects]] block.",
            )
            .with_file(path)
            .with_line(line),
        );
        state.mark_error();
        return;
    };
    let rect = &mut manifest.sprites[sprite_idx].rects[rect_idx];
    match key {
        "x" => set_int_field(&mut rect.x, value, diag, path, line, "manifest.sprites.rects.x_invalid", "sprites.rects.x must be an integer.", state),
        "y" => set_int_field(&mut rect.y, value, diag, path, line, "manifest.sprites.rects.y_invalid", "sprites.rects.y must be an integer.", state),
        "w" => set_int_field(&mut rect.w, value, diag, path, line, "manifest.sprites.rects.w_invalid", "sprites.rects.w must be an integer.", state),
        "h" => set_int_field(&mut rect.h, value, diag, path, line, "manifest.sprites.rects.h_invalid", "sprites.rects.h must be an integer.", state),
        "label" => match parse_string_value(value) {
            Some(v) => rect.label = Some(v),
            None => emit_type_error(diag, path, line, "manifest.sprites.rects.label_invalid", "sprites.rects.label must be a string.", state),
        },
        _ => {
            diag.emit(
                Diagnostic::error("manifest.sprites.rects.unknown_key", format!("Unknown sprites.rects key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_animation_assignment(
    state: &mut ParseState,
    manifest: &mut Manifest,
    diag: &mut DiagCounter,
    path: &str,
    lines: &[&str],
    line_index: &mut usize,
    key: &str,
    value: &str,
    line: u32,
) {
    let Some(idx) = state.current_animation else {
        diag.emit(
            Diagnostic::error("manifest.animations.no_active_block", "Animation assignment without active [[animations]] block.")
                .with_file(path)
                .with_line(line),
        );
        state.mark_error();
        return;
    };
    match key {
        "id" => match parse_string_value(value) {
            Some(v) => manifest.animations[idx].id = Some(v),
            None => emit_type_error(diag, path, line, "manifest.animations.id_invalid", "animations.id must be a string.", state),
        },
        "sprite" => match parse_string_value(value) {
            Some(v) => manifest.animations[idx].sprite = Some(v),
            None => emit_type_error(diag, path, line, "manifest.animations.sprite_invalid", "animations.sprite must be a string.", state),
        },
        "loop" => match parse_string_value(value) {
            Some(v) => match v.as_str() {
                "once" => manifest.animations[idx].loop_mode = LoopMode::Once,
                "loop" => manifest.animations[idx].loop_mode = LoopMode::Loop,
                "ping_pong" => manifest.animations[idx].loop_mode = LoopMode::PingPong,
                _ => emit_type_error(diag, path, line, "manifest.animations.loop_unknown", "animations.loop must be one of once, loop, ping_pong.", state),
            },
            None => emit_type_error(diag, path, line, "manifest.animations.loop_invalid", "animations.loop must be a string.", state),
        },
        "frames" => {
            let Some(array_text) = collect_array_value(lines, line_index, value, diag, path) else {
                state.mark_error();
                return;
            };
            if !parse_animation_frames_value(&array_text, &mut manifest.animations[idx], diag, path, line) {
                state.mark_error();
            }
        }
        _ => {
            diag.emit(
                Diagnostic::error("manifest.animations.unknown_key", format!("Unknown animations key: {key}"))
                    .with_file(path)
                    .with_line(line),
            );
            state.mark_error();
        }
    }
}

/// Parses `[{ index = 0, ms = 100 }, ...]` into `animation.frames`.
fn parse_animation_frames_value(
    value: &str,
    animation: &mut AnimationEntry,
    diag: &mut DiagCounter,
    path: &str,
    line: u32,
) -> bool {
    let trimmed = value.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        diag.emit(
            Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Animation frames must be an array of inline tables.")
                .with_file(path)
                .with_line(line)
                .with_asset_id(animation.id.clone().unwrap_or_default()),
        );
        return false;
    }
    let inner = &trimmed[1..trimmed.len() - 1];

    let mut frames = Vec::new();
    let chars: Vec<char> = inner.chars().collect();
    let mut cursor = 0usize;
    while cursor < chars.len() {
        while cursor < chars.len() && (chars[cursor].is_whitespace() || chars[cursor] == ',') {
            cursor += 1;
        }
        if cursor >= chars.len() {
            break;
        }
        if chars[cursor] != '{' {
            diag.emit(
                Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Each animation frame entry must be an inline table.")
                    .with_file(path)
                    .with_line(line)
                    .with_asset_id(animation.id.clone().unwrap_or_default()),
            );
            return false;
        }

        let object_start = cursor;
        let mut brace_depth = 0i32;
        let mut in_string = false;
        let mut escape_next = false;
        while cursor < chars.len() {
            let ch = chars[cursor];
            if in_string {
                if escape_next {
                    escape_next = false;
                } else if ch == '\\' {
                    escape_next = true;
                } else if ch == '"' {
                    in_string = false;
                }
                cursor += 1;
                continue;
            }
            if ch == '"' {
                in_string = true;
                cursor += 1;
                continue;
            }
            if ch == '{' {
                brace_depth += 1;
            } else if ch == '}' {
                brace_depth -= 1;
                if brace_depth == 0 {
                    cursor += 1;
                    break;
                }
            }
            cursor += 1;
        }
        if brace_depth != 0 {
            diag.emit(
                Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Unterminated inline frame table.")
                    .with_file(path)
                    .with_line(line)
                    .with_asset_id(animation.id.clone().unwrap_or_default()),
            );
            return false;
        }

        let object_text: String = chars[object_start + 1..cursor - 1].iter().collect();
        let mut frame = AnimationFrameDef {
            line,
            ..Default::default()
        };

        for pair in split_top_level_commas(&object_text) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((field_key, field_value)) = split_key_value(pair) else {
                diag.emit(
                    Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Invalid key/value pair in animation frame.")
                        .with_file(path)
                        .with_line(line)
                        .with_asset_id(animation.id.clone().unwrap_or_default()),
                );
                return false;
            };
            match field_key {
                "index" => match parse_int_value(field_value) {
                    Some(v) => frame.index = Some(v),
                    None => {
                        diag.emit(
                            Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Animation frame index must be an integer.")
                                .with_file(path)
                                .with_line(line)
                                .with_asset_id(animation.id.clone().unwrap_or_default()),
                        );
                        return false;
                    }
                },
                "ms" => match parse_int_value(field_value) {
                    Some(v) => frame.ms = Some(v),
                    None => {
                        diag.emit(
                            Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Animation frame ms must be an integer.")
                                .with_file(path)
                                .with_line(line)
                                .with_asset_id(animation.id.clone().unwrap_or_default()),
                        );
                        return false;
                    }
                },
                other => {
                    diag.emit(
                        Diagnostic::error(
                            codes::MANIFEST_ANIM_FRAME_UNKNOWN_KEY,
                            format!("Unknown animation frame field: {other}"),
                        )
                        .with_file(path)
                        .with_line(line)
                        .with_asset_id(animation.id.clone().unwrap_or_default()),
                    );
                }
            }
        }

        if frame.index.is_none() || frame.ms.is_none() {
            diag.emit(
                Diagnostic::error(codes::MANIFEST_ANIM_FRAME_BAD_ENTRY, "Animation frame entries require index and ms.")
                    .with_file(path)
                    .with_line(line)
                    .with_asset_id(animation.id.clone().unwrap_or_default()),
            );
            return false;
        }
        frames.push(frame);
    }

    if frames.is_empty() {
        diag.emit(
            Diagnostic::error(codes::ANIM_FRAMES_MISSING, "Animation frames array cannot be empty.")
                .with_file(path)
                .with_line(line)
                .with_asset_id(animation.id.clone().unwrap_or_default()),
        );
        return false;
    }

    animation.frames = Some(frames);
    true
}

/// Splits `k = v, k2 = v2` on top-level commas, respecting quoted strings.
fn split_top_level_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
            continue;
        }
        if ch == ',' {
            parts.push(&text[start..idx]);
            start = idx + 1;
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagCounter;

    fn parse(text: &str) -> (Manifest, bool, u32) {
        let mut manifest = Manifest::default();
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let ok = parse_text("test.toml", text, &mut counter, &mut manifest);
        (manifest, ok, counter.error_count)
    }

    #[test]
    fn parses_root_and_atlas_fields() {
        let (manifest, ok, errors) = parse(
            r#"
            schema_version = 1
            package_name = "demo"
            output = "out/demo.prpk"

            [atlas]
            max_page_width = 512
            padding = 2
            power_of_two = true
            sampling = "linear"
            "#,
        );
        assert!(ok);
        assert_eq!(errors, 0);
        assert_eq!(manifest.schema_version, Some(1));
        assert_eq!(manifest.package_name.as_deref(), Some("demo"));
        assert_eq!(manifest.atlas.max_page_width, 512);
        assert_eq!(manifest.atlas.padding, 2);
        assert!(manifest.atlas.power_of_two);
        assert_eq!(manifest.atlas.sampling, Sampling::Linear);
    }

    #[test]
    fn parses_image_and_sprite_blocks() {
        let (manifest, ok, _) = parse(
            r#"
            [[images]]
            id = "hero_sheet"
            path = "art/hero.png"

            [[sprites]]
            id = "hero"
            source = "hero_sheet"
            mode = "grid"
            cell_w = 32
            cell_h = 32
            "#,
        );
        assert!(ok);
        assert_eq!(manifest.images.len(), 1);
        assert_eq!(manifest.images[0].id.as_deref(), Some("hero_sheet"));
        assert_eq!(manifest.sprites.len(), 1);
        assert_eq!(manifest.sprites[0].mode, SpriteMode::Grid);
        assert_eq!(manifest.sprites[0].cell_w, Some(32));
    }

    #[test]
    fn parses_sprite_rects() {
        let (manifest, ok, _) = parse(
            r#"
            [[sprites]]
            id = "icons"
            source = "icons_sheet"
            mode = "rects"

            [[sprites.rects]]
            x = 0
            y = 0
            w = 16
            h = 16

            [[sprites.rects]]
            x = 16
            y = 0
            w = 16
            h = 16
            label = "coin"
            "#,
        );
        assert!(ok);
        assert_eq!(manifest.sprites[0].rects.len(), 2);
        assert_eq!(manifest.sprites[0].rects[1].label.as_deref(), Some("coin"));
    }

    #[test]
    fn rects_without_active_sprite_is_error() {
        let (_manifest, ok, errors) = parse("[[sprites.rects]]\nx = 0\n");
        assert!(!ok);
        assert!(errors > 0);
    }

    #[test]
    fn parses_multiline_animation_frames() {
        let (manifest, ok, _) = parse(
            r#"
            [[animations]]
            id = "walk"
            sprite = "hero"
            loop = "loop"
            frames = [
                { index = 0, ms = 100 },
                { index = 1, ms = 100 },
            ]
            "#,
        );
        assert!(ok, "expected ok, errors present");
        let frames = manifest.animations[0].frames.as_ref().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].index, Some(0));
        assert_eq!(frames[1].ms, Some(100));
    }

    #[test]
    fn empty_frames_array_is_rejected() {
        let (_manifest, ok, errors) = parse(
            r#"
            [[animations]]
            id = "idle"
            sprite = "hero"
            frames = []
            "#,
        );
        assert!(!ok);
        assert!(errors > 0);
    }

    #[test]
    fn unknown_key_is_error() {
        let (_manifest, ok, errors) = parse("bogus_key = 1\n");
        assert!(!ok);
        assert_eq!(errors, 1);
    }

    #[test]
    fn hash_inside_quoted_string_is_not_a_comment() {
        let (manifest, ok, _) = parse("package_name = \"name # not a comment\"\n");
        assert!(ok);
        assert_eq!(manifest.package_name.as_deref(), Some("name # not a comment"));
    }

    #[test]
    fn carriage_return_is_stripped() {
        let (manifest, ok, _) = parse("schema_version = 1\r\npackage_name = \"demo\"\r\n");
        assert!(ok);
        assert_eq!(manifest.package_name.as_deref(), Some("demo"));
    }
}
