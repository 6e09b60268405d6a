//! Diagnostic channel and status kinds threaded through the build pipeline.
//!
//! Mirrors the reference implementation's `pr_status_t` / `pr_diagnostic_t`
//! pair: a single authoritative [`Status`] plus an ordered stream of
//! [`Diagnostic`]s emitted through a sink closure. No diagnostic implies no
//! user-visible message; the status is still authoritative.

use std::fmt;

/// Top-level outcome of a pipeline stage or CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    InvalidArgument,
    IoError,
    ParseError,
    ValidationError,
    AllocationFailed,
    InternalError,
}

impl Status {
    /// CLI exit code for this status, per spec.md §6.1.
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::InvalidArgument => 1,
            Status::ValidationError | Status::ParseError => 2,
            Status::IoError => 3,
            Status::AllocationFailed | Status::InternalError => 4,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Ok => "ok",
            Status::InvalidArgument => "invalid argument",
            Status::IoError => "io error",
            Status::ParseError => "parse error",
            Status::ValidationError => "validation error",
            Status::AllocationFailed => "allocation failed",
            Status::InternalError => "internal error",
        };
        f.write_str(text)
    }
}

/// Error type returned by fallible pipeline stages.
#[derive(Debug, Clone)]
pub struct PackratError {
    pub status: Status,
    pub message: String,
}

impl PackratError {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for PackratError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for PackratError {}

/// Severity of a single diagnostic, per spec.md §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// A single structured diagnostic emitted during build/validate.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub code: &'static str,
    pub asset_id: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            code,
            asset_id: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            code,
            asset_id: None,
        }
    }

    pub fn note(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            message: message.into(),
            file: None,
            line: None,
            column: None,
            code,
            asset_id: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_asset_id(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }
}

/// Write-only diagnostic channel threaded through build/validate.
pub type DiagSink<'a> = &'a mut dyn FnMut(Diagnostic);

/// Tracks error/warning counts alongside forwarding to the caller's sink,
/// the same bookkeeping the reference implementation's
/// `pr_manifest_diag_context_t` keeps next to its `pr_diag_sink_fn`.
pub struct DiagCounter<'a> {
    sink: DiagSink<'a>,
    pub error_count: u32,
    pub warning_count: u32,
}

impl<'a> DiagCounter<'a> {
    pub fn new(sink: DiagSink<'a>) -> Self {
        Self {
            sink,
            error_count: 0,
            warning_count: 0,
        }
    }

    pub fn emit(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.error_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Note => {}
        }
        (self.sink)(diag);
    }
}

/// Closed set of stable diagnostic codes used across the parser, validator,
/// and build pipeline. Keeping them as named constants (rather than inline
/// string literals at every call site) matches spec.md §6.5's requirement
/// that the set be closed and stable for caller-side filtering.
pub mod codes {
    pub const MANIFEST_READ_FAILED: &str = "manifest.read_failed";
    pub const MANIFEST_EMPTY: &str = "manifest.empty";
    pub const MANIFEST_UNKNOWN_KEY: &str = "manifest.unknown_key";
    pub const MANIFEST_UNKNOWN_SECTION: &str = "manifest.unknown_section";
    pub const MANIFEST_RECTS_NO_SPRITE: &str = "manifest.rects_without_sprite";
    pub const MANIFEST_INVALID_ASSIGNMENT: &str = "manifest.invalid_assignment";
    pub const MANIFEST_INVALID_INT: &str = "manifest.invalid_int";
    pub const MANIFEST_INVALID_FLOAT: &str = "manifest.invalid_float";
    pub const MANIFEST_INVALID_BOOL: &str = "manifest.invalid_bool";
    pub const MANIFEST_INVALID_STRING: &str = "manifest.invalid_string";
    pub const MANIFEST_ARRAY_MISSING_OPEN: &str = "manifest.array_missing_open";
    pub const MANIFEST_ARRAY_UNTERMINATED: &str = "manifest.array_unterminated";
    pub const MANIFEST_ANIM_FRAME_BAD_ENTRY: &str = "manifest.animations.frame_bad_entry";
    pub const MANIFEST_ANIM_FRAME_UNKNOWN_KEY: &str = "manifest.animations.frame_unknown_key";

    pub const MANIFEST_MISSING_SCHEMA_VERSION: &str = "manifest.missing_schema_version";
    pub const MANIFEST_UNSUPPORTED_SCHEMA_VERSION: &str = "manifest.unsupported_schema_version";
    pub const MANIFEST_MISSING_PACKAGE_NAME: &str = "manifest.missing_package_name";
    pub const MANIFEST_MISSING_OUTPUT: &str = "manifest.missing_output";
    pub const MANIFEST_OUTPUT_EXTENSION: &str = "build.output_extension";

    pub const ATLAS_MAX_WIDTH_RANGE: &str = "manifest.atlas.max_page_width_range";
    pub const ATLAS_MAX_HEIGHT_RANGE: &str = "manifest.atlas.max_page_height_range";
    pub const ATLAS_PADDING_RANGE: &str = "manifest.atlas.padding_range";
    pub const ATLAS_SAMPLING_UNKNOWN: &str = "manifest.atlas.sampling_unknown";

    pub const IMAGES_MISSING_ID: &str = "manifest.images.missing_id";
    pub const IMAGES_MISSING_PATH: &str = "manifest.images.missing_path";
    pub const IMAGES_COLOR_SPACE_UNKNOWN: &str = "manifest.images.color_space_unknown";
    pub const IMAGES_DUPLICATE_ID: &str = "manifest.images.duplicate_id";

    pub const SPRITES_MISSING_ID: &str = "manifest.sprites.missing_id";
    pub const SPRITES_MISSING_SOURCE: &str = "manifest.sprites.missing_source";
    pub const SPRITES_SOURCE_UNKNOWN: &str = "manifest.sprites.source_unknown";
    pub const SPRITES_PIVOT_X_RANGE: &str = "manifest.sprites.pivot_x_range";
    pub const SPRITES_PIVOT_Y_RANGE: &str = "manifest.sprites.pivot_y_range";
    pub const SPRITES_DUPLICATE_ID: &str = "manifest.sprites.duplicate_id";
    pub const SPRITES_GRID_CELL_W: &str = "manifest.sprites.grid.cell_w";
    pub const SPRITES_GRID_CELL_H: &str = "manifest.sprites.grid.cell_h";
    pub const SPRITES_GRID_FRAME_START: &str = "manifest.sprites.grid.frame_start";
    pub const SPRITES_GRID_FRAME_COUNT: &str = "manifest.sprites.grid.frame_count";
    pub const SPRITES_GRID_FRAME_RANGE_OOB: &str = "manifest.sprites.grid.frame_range_oob";
    pub const SPRITES_RECTS_EMPTY: &str = "manifest.sprites.rects.empty";
    pub const SPRITES_RECTS_MISSING_FIELDS: &str = "manifest.sprites.rects.missing_fields";
    pub const SPRITES_RECTS_RANGE: &str = "manifest.sprites.rects.range";
    pub const SPRITES_SINGLE_W_RANGE: &str = "manifest.sprites.single.w_range";
    pub const SPRITES_SINGLE_H_RANGE: &str = "manifest.sprites.single.h_range";
    pub const SPRITES_SINGLE_XY_RANGE: &str = "manifest.sprites.single.xy_range";

    pub const ANIM_MISSING_ID: &str = "manifest.animations.missing_id";
    pub const ANIM_MISSING_SPRITE: &str = "manifest.animations.missing_sprite";
    pub const ANIM_SPRITE_UNKNOWN: &str = "manifest.animations.sprite_unknown";
    pub const ANIM_FRAMES_MISSING: &str = "manifest.animations.frames_missing";
    pub const ANIM_FRAME_INDEX_RANGE: &str = "manifest.animations.frame_index_range";
    pub const ANIM_FRAME_MS_RANGE: &str = "manifest.animations.frame_ms_range";
    pub const ANIM_FRAME_INDEX_OOB: &str = "manifest.animations.frame_index_oob";
    pub const ANIM_FRAME_INDEX_UNBOUNDED: &str = "manifest.animations.frame_index_unbounded";
    pub const ANIM_DUPLICATE_ID: &str = "manifest.animations.duplicate_id";

    pub const IMPORT_READ_FAILED: &str = "build.image.read_failed";
    pub const IMPORT_DECODE_FAILED: &str = "build.image.decode_failed";
    pub const IMPORT_ZERO_SIZED: &str = "build.image.zero_sized";

    pub const FRAME_OUT_OF_BOUNDS: &str = "build.sprite.frame_out_of_bounds";
    pub const FRAME_ZERO_FRAMES: &str = "build.sprite.zero_frames";

    pub const ATLAS_FRAME_TOO_LARGE: &str = "build.atlas.frame_too_large";
    pub const ATLAS_INTERNAL_PLACEMENT: &str = "build.atlas.internal_placement_failure";

    pub const STRICT_WARNINGS_PRESENT: &str = "build.strict.warnings_present";
}
