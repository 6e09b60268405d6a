//! Manifest data model — the parsed (but not yet validated) tree.
//!
//! Field defaults mirror `pr_manifest_init` in the reference implementation:
//! the atlas block gets concrete defaults at construction time, everything
//! else is `Option`-shaped until the parser assigns it ("has_x" flags in the
//! C struct become `Option<T>` here).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteMode {
    Single,
    Grid,
    Rects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Pixel,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

impl LoopMode {
    pub fn code(self) -> u32 {
        match self {
            LoopMode::Once => 0,
            LoopMode::Loop => 1,
            LoopMode::PingPong => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub max_page_width: i64,
    pub max_page_height: i64,
    pub padding: i64,
    pub power_of_two: bool,
    pub sampling: Sampling,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_page_width: 2048,
            max_page_height: 2048,
            padding: 1,
            power_of_two: false,
            sampling: Sampling::Pixel,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageEntry {
    pub id: Option<String>,
    pub path: Option<String>,
    pub premultiply_alpha: bool,
    pub color_space: Option<ColorSpace>,
    pub line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SpriteRect {
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub w: Option<i64>,
    pub h: Option<i64>,
    pub label: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct SpriteEntry {
    pub id: Option<String>,
    pub source: Option<String>,
    pub mode: SpriteMode,
    pub pivot_x: f64,
    pub pivot_y: f64,
    // single
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub w: Option<i64>,
    pub h: Option<i64>,
    // grid
    pub cell_w: Option<i64>,
    pub cell_h: Option<i64>,
    pub margin_x: i64,
    pub margin_y: i64,
    pub spacing_x: i64,
    pub spacing_y: i64,
    pub frame_start: i64,
    pub frame_count: Option<i64>,
    // rects
    pub rects: Vec<SpriteRect>,
    pub line: u32,
}

impl Default for SpriteEntry {
    fn default() -> Self {
        Self {
            id: None,
            source: None,
            mode: SpriteMode::Single,
            pivot_x: 0.5,
            pivot_y: 0.5,
            x: None,
            y: None,
            w: None,
            h: None,
            cell_w: None,
            cell_h: None,
            margin_x: 0,
            margin_y: 0,
            spacing_x: 0,
            spacing_y: 0,
            frame_start: 0,
            frame_count: None,
            rects: Vec::new(),
            line: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnimationFrameDef {
    pub index: Option<i64>,
    pub ms: Option<i64>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct AnimationEntry {
    pub id: Option<String>,
    pub sprite: Option<String>,
    pub loop_mode: LoopMode,
    pub frames: Option<Vec<AnimationFrameDef>>,
    pub line: u32,
}

impl Default for AnimationEntry {
    fn default() -> Self {
        Self {
            id: None,
            sprite: None,
            loop_mode: LoopMode::Loop,
            frames: None,
            line: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub schema_version: Option<i64>,
    pub package_name: Option<String>,
    pub output: Option<String>,
    pub debug_output: Option<String>,
    pub pretty_debug_json: bool,
    pub atlas: AtlasConfig,
    pub images: Vec<ImageEntry>,
    pub sprites: Vec<SpriteEntry>,
    pub animations: Vec<AnimationEntry>,
}

impl Manifest {
    pub fn find_image_index(&self, id: &str) -> Option<usize> {
        self.images
            .iter()
            .position(|img| img.id.as_deref() == Some(id))
    }

    pub fn find_sprite_index(&self, id: &str) -> Option<usize> {
        self.sprites
            .iter()
            .position(|spr| spr.id.as_deref() == Some(id))
    }
}
