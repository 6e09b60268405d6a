//! R1 — runtime reader.
//!
//! Parses a `PRPK` container (owned file buffer or a borrowed byte slice)
//! into typed views over the bytes: header/chunk-table validation, then
//! per-chunk structural checks, then cross-chunk consistency checks, in the
//! exact order spec.md §4.9 lists. Any violation at any step is
//! `Status::ParseError` — integrity is treated as parse-level, per spec.md
//! §4.9's closing paragraph. A successfully opened [`Package`] is immutable
//! for its lifetime; nothing here mutates `bytes` after `open_*` returns.

use crate::diagnostics::{PackratError, Status};
use std::fs;

const HEADER_SIZE: usize = 24;
const CHUNK_ENTRY_SIZE: usize = 20;

enum Bytes<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl<'a> Bytes<'a> {
    fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Owned(v) => v,
            Bytes::Borrowed(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StringSpan {
    offset: u32,
    len: u32,
}

struct StringsChunk {
    blob_off: usize,
    spans: Vec<StringSpan>,
}

/// One sprite's resolved metadata, with its frames addressed as an index
/// range into [`Package`]'s global frame array.
#[derive(Debug, Clone, Copy)]
pub struct Sprite {
    pub name_str_idx: u32,
    pub source_image_index: u32,
    pub mode_tag: u32,
    pub first_frame: u32,
    pub frame_count: u32,
    pub pivot_x_milli: u32,
    pub pivot_y_milli: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpriteFrame {
    pub sprite_index: u32,
    pub local_frame_index: u32,
    pub source_x: u32,
    pub source_y: u32,
    pub source_w: u32,
    pub source_h: u32,
    pub atlas_page: u32,
    pub atlas_x: u32,
    pub atlas_y: u32,
    pub atlas_w: u32,
    pub atlas_h: u32,
    pub u0_milli: u32,
    pub v0_milli: u32,
    pub u1_milli: u32,
    pub v1_milli: u32,
}

impl SpriteFrame {
    pub fn uv(&self) -> (f32, f32, f32, f32) {
        (
            self.u0_milli as f32 / 1_000_000.0,
            self.v0_milli as f32 / 1_000_000.0,
            self.u1_milli as f32 / 1_000_000.0,
            self.v1_milli as f32 / 1_000_000.0,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Animation {
    pub name_str_idx: u32,
    pub sprite_index: u32,
    pub loop_mode: u32,
    pub key_start: u32,
    pub key_count: u32,
    pub total_duration_ms: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct AnimFrame {
    pub animation_index: u32,
    pub frame_index: u32,
    pub duration_ms: u32,
}

struct AtlasPageRecord {
    width: u32,
    height: u32,
    pixel_off: usize,
    pixel_size: u32,
}

impl Sprite {
    pub fn id<'p>(&self, pkg: &'p Package<'_>) -> &'p str {
        pkg.string_at(self.name_str_idx)
    }

    pub fn frames<'p>(&self, pkg: &'p Package<'_>) -> &'p [SpriteFrame] {
        let start = self.first_frame as usize;
        let end = start + self.frame_count as usize;
        &pkg.frames[start..end]
    }
}

impl Animation {
    pub fn id<'p>(&self, pkg: &'p Package<'_>) -> &'p str {
        pkg.string_at(self.name_str_idx)
    }

    pub fn keys<'p>(&self, pkg: &'p Package<'_>) -> &'p [AnimFrame] {
        let start = self.key_start as usize;
        let end = start + self.key_count as usize;
        &pkg.anim_frames[start..end]
    }
}

/// A parsed `.prpk` package. Owns or borrows a single contiguous byte
/// buffer; every returned view (sprite frames, animation keys, strings,
/// atlas pixels) is valid exactly as long as this handle is alive.
pub struct Package<'a> {
    bytes: Bytes<'a>,
    strs: StringsChunk,
    sprites: Vec<Sprite>,
    frames: Vec<SpriteFrame>,
    animations: Vec<Animation>,
    anim_frames: Vec<AnimFrame>,
    atlas_pages: Vec<AtlasPageRecord>,
}

fn parse_error(message: impl Into<String>) -> PackratError {
    PackratError::new(Status::ParseError, message)
}

fn read_u32(bytes: &[u8], off: usize) -> Result<u32, PackratError> {
    bytes
        .get(off..off + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
        .ok_or_else(|| parse_error("unexpected end of package while reading u32"))
}

fn read_u64(bytes: &[u8], off: usize) -> Result<u64, PackratError> {
    bytes
        .get(off..off + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
        .ok_or_else(|| parse_error("unexpected end of package while reading u64"))
}

struct ChunkEntry {
    id: [u8; 4],
    payload_off: u64,
    payload_size: u64,
}

struct Cursor<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Cursor<'b> {
    fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32, PackratError> {
        let v = read_u32(self.bytes, self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    fn bytes_remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn skip_bytes(&mut self, n: usize) -> Result<&'b [u8], PackratError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + n)
            .ok_or_else(|| parse_error("unexpected end of chunk payload"))?;
        self.pos += n;
        Ok(slice)
    }
}

impl<'a> Package<'a> {
    /// Reads an entire file into an owned buffer and parses it.
    pub fn open_file(path: &str) -> Result<Package<'static>, PackratError> {
        let bytes = fs::read(path).map_err(|err| {
            PackratError::new(Status::IoError, format!("failed to read package '{path}': {err}"))
        })?;
        Package::parse(Bytes::Owned(bytes))
    }

    /// Parses a package from a borrowed byte slice with no copy.
    pub fn open_bytes(bytes: &'a [u8]) -> Result<Package<'a>, PackratError> {
        Package::parse(Bytes::Borrowed(bytes))
    }

    fn parse(bytes: Bytes<'a>) -> Result<Package<'a>, PackratError> {
        let buf = bytes.as_slice();
        let size = buf.len();

        // 1. Header check.
        if size < HEADER_SIZE {
            return Err(parse_error("package is smaller than the container header"));
        }
        if &buf[0..4] != b"PRPK" {
            return Err(parse_error("bad magic: expected 'PRPK'"));
        }
        let version_major = u16::from_le_bytes(buf[4..6].try_into().unwrap());
        let header_size = read_u32(buf, 8)? as usize;
        let chunk_count = read_u32(buf, 12)? as usize;
        let chunk_table_off = read_u64(buf, 16)? as usize;
        if version_major < 1 {
            return Err(parse_error("unsupported version_major"));
        }
        if header_size < HEADER_SIZE {
            return Err(parse_error("header_size smaller than the minimum container header"));
        }
        if chunk_count < 1 {
            return Err(parse_error("chunk_count must be at least 1"));
        }
        let chunk_table_bytes = chunk_count
            .checked_mul(CHUNK_ENTRY_SIZE)
            .ok_or_else(|| parse_error("chunk table size overflows"))?;
        let chunk_table_end = chunk_table_off
            .checked_add(chunk_table_bytes)
            .ok_or_else(|| parse_error("chunk table extent overflows"))?;
        if chunk_table_end > size {
            return Err(parse_error("chunk table extends past end of file"));
        }

        // 2. Chunk table.
        let mut entries = Vec::with_capacity(chunk_count);
        for i in 0..chunk_count {
            let entry_off = chunk_table_off + i * CHUNK_ENTRY_SIZE;
            let mut id = [0u8; 4];
            id.copy_from_slice(&buf[entry_off..entry_off + 4]);
            let payload_off = read_u64(buf, entry_off + 4)?;
            let payload_size = read_u64(buf, entry_off + 12)?;
            let end = payload_off
                .checked_add(payload_size)
                .ok_or_else(|| parse_error("chunk payload extent overflows"))?;
            if end > size as u64 {
                return Err(parse_error(format!(
                    "chunk '{}' payload extends past end of file",
                    String::from_utf8_lossy(&id)
                )));
            }
            entries.push(ChunkEntry { id, payload_off, payload_size });
        }

        // 3. Required chunks.
        let find = |tag: &[u8; 4]| entries.iter().find(|e| &e.id == tag);
        let strs_entry = find(b"STRS").ok_or_else(|| parse_error("missing required 'STRS' chunk"))?;
        let sprt_entry = find(b"SPRT").ok_or_else(|| parse_error("missing required 'SPRT' chunk"))?;
        let anim_entry = find(b"ANIM").ok_or_else(|| parse_error("missing required 'ANIM' chunk"))?;
        let txtr_entry = find(b"TXTR");

        // 4. STRS.
        let strs = parse_strs(buf, strs_entry)?;
        let string_count = strs.spans.len();

        // 5. TXTR (if present).
        let atlas_pages = match txtr_entry {
            Some(entry) => parse_txtr(buf, entry)?,
            None => Vec::new(),
        };

        // 6. SPRT.
        let (sprites, frames) = parse_sprt(buf, sprt_entry, string_count, atlas_pages.len())?;

        // 7. ANIM.
        let (animations, anim_frames) = parse_anim(buf, anim_entry, string_count, sprites.len(), &sprites)?;

        log::debug!(
            "loaded package: {} sprite(s), {} animation(s), {} atlas page(s)",
            sprites.len(),
            animations.len(),
            atlas_pages.len()
        );

        Ok(Package {
            bytes,
            strs,
            sprites,
            frames,
            animations,
            anim_frames,
            atlas_pages,
        })
    }

    fn string_at(&self, idx: u32) -> &str {
        let span = self.strs.spans[idx as usize];
        let start = self.strs.blob_off + span.offset as usize;
        let end = start + span.len as usize;
        std::str::from_utf8(&self.bytes.as_slice()[start..end]).unwrap_or("")
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn atlas_page_count(&self) -> usize {
        self.atlas_pages.len()
    }

    pub fn sprite_at(&self, index: usize) -> Option<&Sprite> {
        self.sprites.get(index)
    }

    pub fn animation_at(&self, index: usize) -> Option<&Animation> {
        self.animations.get(index)
    }

    pub fn find_sprite(&self, id: &str) -> Option<(usize, &Sprite)> {
        self.sprites.iter().enumerate().find(|(_, s)| self.string_at(s.name_str_idx) == id)
    }

    pub fn find_animation(&self, id: &str) -> Option<(usize, &Animation)> {
        self.animations.iter().enumerate().find(|(_, a)| self.string_at(a.name_str_idx) == id)
    }

    /// Returns `(width, height, stride, pixels)` for atlas page `index`.
    /// `stride` is always `width * 4`; `pixels` is `None` when the page's
    /// `pixel_blob_size` was legitimately 0.
    pub fn atlas_page_pixels(&self, index: usize) -> Option<(u32, u32, u32, Option<&[u8]>)> {
        let page = self.atlas_pages.get(index)?;
        let pixels = if page.pixel_size == 0 {
            None
        } else {
            Some(&self.bytes.as_slice()[page.pixel_off..page.pixel_off + page.pixel_size as usize])
        };
        Some((page.width, page.height, page.width * 4, pixels))
    }

    /// Resolves a sprite/animation binding per spec.md §4.9: the animation
    /// is resolved first (error if supplied and unknown), then `sprite_id`
    /// (error if supplied and unknown); when both are given the animation's
    /// sprite must match the looked-up sprite. At least one identifier must
    /// resolve.
    pub fn resolve_sprite_binding(
        &self,
        sprite_id: Option<&str>,
        animation_id: Option<&str>,
    ) -> Result<(&Sprite, Option<&Animation>), PackratError> {
        let animation = match animation_id {
            Some(id) => Some(
                self.find_animation(id)
                    .ok_or_else(|| parse_error(format!("unknown animation id '{id}'")))?,
            ),
            None => None,
        };

        let sprite_from_id = match sprite_id {
            Some(id) => Some(
                self.find_sprite(id)
                    .ok_or_else(|| parse_error(format!("unknown sprite id '{id}'")))?,
            ),
            None => None,
        };

        match (sprite_from_id, animation) {
            (Some((sprite_index, sprite)), Some((_, anim))) => {
                if anim.sprite_index as usize != sprite_index {
                    return Err(parse_error("animation's sprite does not match the requested sprite id"));
                }
                Ok((sprite, Some(anim)))
            }
            (Some((_, sprite)), None) => Ok((sprite, None)),
            (None, Some((_, anim))) => {
                let sprite = self
                    .sprite_at(anim.sprite_index as usize)
                    .ok_or_else(|| parse_error("animation references a sprite index out of range"))?;
                Ok((sprite, Some(anim)))
            }
            (None, None) => Err(parse_error("resolve_sprite_binding requires at least one identifier")),
        }
    }
}

fn parse_strs(buf: &[u8], entry: &ChunkEntry) -> Result<StringsChunk, PackratError> {
    let mut c = Cursor::new(&buf[entry.payload_off as usize..(entry.payload_off + entry.payload_size) as usize]);
    let version = c.u32()?;
    if version != 1 {
        return Err(parse_error("STRS chunk has unsupported version"));
    }
    let string_count = c.u32()? as usize;
    let blob_bytes = c.u32()? as usize;
    let mut raw_offsets = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        raw_offsets.push(c.u32()?);
    }
    let blob = c.skip_bytes(blob_bytes)?;

    let mut spans = Vec::with_capacity(string_count);
    for (i, &offset) in raw_offsets.iter().enumerate() {
        if offset as usize >= blob.len() {
            return Err(parse_error(format!("STRS string {i} offset out of range")));
        }
        let nul_at = blob[offset as usize..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| parse_error(format!("STRS string {i} is not NUL-terminated within the blob")))?;
        spans.push(StringSpan { offset, len: nul_at as u32 });
    }

    let blob_off = entry.payload_off as usize + 12 + string_count * 4;
    Ok(StringsChunk { blob_off, spans })
}

fn parse_txtr(buf: &[u8], entry: &ChunkEntry) -> Result<Vec<AtlasPageRecord>, PackratError> {
    let base = entry.payload_off as usize;
    let mut c = Cursor::new(&buf[base..(entry.payload_off + entry.payload_size) as usize]);
    let version = c.u32()?;
    if version != 1 {
        return Err(parse_error("TXTR chunk has unsupported version"));
    }
    let page_count = c.u32()? as usize;
    let _max_w = c.u32()?;
    let _max_h = c.u32()?;
    let _padding = c.u32()?;
    let _power_of_two = c.u32()?;
    let _sampling_code = c.u32()?;

    let mut pages: Vec<Option<AtlasPageRecord>> = (0..page_count).map(|_| None).collect();
    for _ in 0..page_count {
        let page_index = c.u32()? as usize;
        let width = c.u32()?;
        let height = c.u32()?;
        let pixel_blob_size = c.u32()?;
        let expected = width as u64 * height as u64 * 4;
        if pixel_blob_size != 0 && pixel_blob_size as u64 != expected {
            return Err(parse_error("TXTR page pixel_blob_size does not match width*height*4"));
        }
        let pixel_off = base + c.pos;
        c.skip_bytes(pixel_blob_size as usize)?;
        if page_index >= page_count {
            return Err(parse_error("TXTR page_index out of range"));
        }
        if pages[page_index].is_some() {
            return Err(parse_error("TXTR page_index is not unique"));
        }
        pages[page_index] = Some(AtlasPageRecord { width, height, pixel_off, pixel_size: pixel_blob_size });
    }
    if c.bytes_remaining() != 0 {
        return Err(parse_error("TXTR chunk has trailing bytes after the last page record"));
    }
    pages
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.ok_or_else(|| parse_error(format!("TXTR page {i} was never written"))))
        .collect()
}

fn parse_sprt(
    buf: &[u8],
    entry: &ChunkEntry,
    string_count: usize,
    atlas_page_count: usize,
) -> Result<(Vec<Sprite>, Vec<SpriteFrame>), PackratError> {
    let mut c = Cursor::new(&buf[entry.payload_off as usize..(entry.payload_off + entry.payload_size) as usize]);
    let version = c.u32()?;
    if version != 1 {
        return Err(parse_error("SPRT chunk has unsupported version"));
    }
    let sprite_count = c.u32()? as usize;
    let frame_count = c.u32()? as usize;

    let mut sprites = Vec::with_capacity(sprite_count);
    for _ in 0..sprite_count {
        let name_str_idx = c.u32()?;
        let source_image_index = c.u32()?;
        let mode_tag = c.u32()?;
        let first_frame = c.u32()?;
        let this_frame_count = c.u32()?;
        let pivot_x_milli = c.u32()?;
        let pivot_y_milli = c.u32()?;

        if name_str_idx as usize >= string_count {
            return Err(parse_error("SPRT sprite name_str_idx out of range"));
        }
        let end = first_frame as u64 + this_frame_count as u64;
        if end > frame_count as u64 {
            return Err(parse_error("SPRT sprite frame range exceeds frame_count"));
        }

        sprites.push(Sprite {
            name_str_idx,
            source_image_index,
            mode_tag,
            first_frame,
            frame_count: this_frame_count,
            pivot_x_milli,
            pivot_y_milli,
        });
    }

    let mut frames = Vec::with_capacity(frame_count);
    for _ in 0..frame_count {
        frames.push(SpriteFrame {
            sprite_index: c.u32()?,
            local_frame_index: c.u32()?,
            source_x: c.u32()?,
            source_y: c.u32()?,
            source_w: c.u32()?,
            source_h: c.u32()?,
            atlas_page: c.u32()?,
            atlas_x: c.u32()?,
            atlas_y: c.u32()?,
            atlas_w: c.u32()?,
            atlas_h: c.u32()?,
            u0_milli: c.u32()?,
            v0_milli: c.u32()?,
            u1_milli: c.u32()?,
            v1_milli: c.u32()?,
        });
    }

    // Each (sprite_index, local_frame_index) must map to a unique global
    // slot within its sprite's declared range.
    let mut seen = vec![false; frame_count];
    for (global_index, frame) in frames.iter().enumerate() {
        let sprite = sprites
            .get(frame.sprite_index as usize)
            .ok_or_else(|| parse_error("SPRT frame references a sprite_index out of range"))?;
        let start = sprite.first_frame as usize;
        let slot = start + frame.local_frame_index as usize;
        if slot != global_index || frame.local_frame_index >= sprite.frame_count {
            return Err(parse_error("SPRT frame local_frame_index does not map into its sprite's declared range"));
        }
        if seen[slot] {
            return Err(parse_error("SPRT frame slot mapped to more than once"));
        }
        seen[slot] = true;
        if atlas_page_count > 0 && frame.atlas_page as usize >= atlas_page_count {
            return Err(parse_error("SPRT frame atlas_page out of range"));
        }
    }
    for (sprite_index, sprite) in sprites.iter().enumerate() {
        let start = sprite.first_frame as usize;
        let end = start + sprite.frame_count as usize;
        if seen[start..end].iter().any(|&s| !s) {
            return Err(parse_error(format!("sprite {sprite_index} has an unfilled frame slot in its declared range")));
        }
    }

    Ok((sprites, frames))
}

fn parse_anim(
    buf: &[u8],
    entry: &ChunkEntry,
    string_count: usize,
    sprite_count: usize,
    sprites: &[Sprite],
) -> Result<(Vec<Animation>, Vec<AnimFrame>), PackratError> {
    let mut c = Cursor::new(&buf[entry.payload_off as usize..(entry.payload_off + entry.payload_size) as usize]);
    let version = c.u32()?;
    if version != 1 {
        return Err(parse_error("ANIM chunk has unsupported version"));
    }
    let animation_count = c.u32()? as usize;
    let key_count = c.u32()? as usize;

    let mut animations = Vec::with_capacity(animation_count);
    for _ in 0..animation_count {
        let name_str_idx = c.u32()?;
        let sprite_index = c.u32()?;
        let loop_mode = c.u32()?;
        let key_start = c.u32()?;
        let this_key_count = c.u32()?;
        let total_duration_ms = c.u32()?;

        if name_str_idx as usize >= string_count {
            return Err(parse_error("ANIM animation name_str_idx out of range"));
        }
        if sprite_index as usize >= sprite_count {
            return Err(parse_error("ANIM animation sprite_index out of range"));
        }
        if loop_mode > 2 {
            return Err(parse_error("ANIM animation loop_mode must be 0, 1, or 2"));
        }
        let end = key_start as u64 + this_key_count as u64;
        if end > key_count as u64 {
            return Err(parse_error("ANIM animation key range exceeds key_count"));
        }

        animations.push(Animation {
            name_str_idx,
            sprite_index,
            loop_mode,
            key_start,
            key_count: this_key_count,
            total_duration_ms,
        });
    }

    let mut keys = Vec::with_capacity(key_count);
    for _ in 0..key_count {
        keys.push(AnimFrame {
            animation_index: c.u32()?,
            frame_index: c.u32()?,
            duration_ms: c.u32()?,
        });
    }

    for (global_index, key) in keys.iter().enumerate() {
        let animation = animations
            .get(key.animation_index as usize)
            .ok_or_else(|| parse_error("ANIM key references an animation_index out of range"))?;
        let start = animation.key_start as usize;
        let end = start + animation.key_count as usize;
        if global_index < start || global_index >= end {
            return Err(parse_error("ANIM key does not fall within its containing animation's declared range"));
        }
        let sprite = &sprites[animation.sprite_index as usize];
        if key.frame_index >= sprite.frame_count {
            return Err(parse_error("ANIM key frame_index is out of bounds for its animation's sprite"));
        }
    }

    Ok((animations, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animations::resolve_animations;
    use crate::atlas::pack_atlas;
    use crate::diagnostics::{DiagCounter, Diagnostic};
    use crate::encode::{encode_package, EncodeInput};
    use crate::frames::resolve_frames;
    use crate::image_import::ImportedImage;
    use crate::manifest::model::*;
    use crate::strings::build_string_table;

    fn one_sprite_package_bytes() -> Vec<u8> {
        let mut manifest = Manifest::default();
        manifest.schema_version = Some(1);
        manifest.package_name = Some("demo".to_string());
        manifest.output = Some("demo.prpk".to_string());
        manifest.images.push(ImageEntry {
            id: Some("sheet".to_string()),
            path: Some("sheet.png".to_string()),
            ..Default::default()
        });
        manifest.sprites.push(SpriteEntry {
            id: Some("hero".to_string()),
            source: Some("sheet".to_string()),
            mode: SpriteMode::Single,
            w: Some(64),
            h: Some(32),
            ..Default::default()
        });
        manifest.animations.push(AnimationEntry {
            id: Some("idle".to_string()),
            sprite: Some("hero".to_string()),
            loop_mode: LoopMode::Loop,
            frames: Some(vec![AnimationFrameDef { index: Some(0), ms: Some(100), line: 0 }]),
            line: 0,
        });

        let images = vec![ImportedImage {
            id: "sheet".to_string(),
            resolved_path: "sheet.png".to_string(),
            width: 64,
            height: 32,
            tight_row_bytes: 64 * 4,
            pixels: vec![255u8; 64 * 32 * 4],
            source_file_bytes: 0,
            color_space: ColorSpace::Srgb,
        }];

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (frame_sources, sprite_ranges) = resolve_frames(&manifest, &images, &mut counter).unwrap();
        let (packed_frames, atlas_pages) = pack_atlas(&manifest, &images, &frame_sources, &mut counter).unwrap();
        let (resolved_animations, animation_keys) = resolve_animations(&manifest, &sprite_ranges, &mut counter).unwrap();
        let string_index = build_string_table(&manifest, &images);

        encode_package(&EncodeInput {
            manifest: &manifest,
            string_index: &string_index,
            images: &images,
            sprite_ranges: &sprite_ranges,
            packed_frames: &packed_frames,
            atlas_pages: &atlas_pages,
            resolved_animations: &resolved_animations,
            animation_keys: &animation_keys,
        })
    }

    #[test]
    fn round_trips_a_single_sprite_single_frame_package() {
        let bytes = one_sprite_package_bytes();
        let pkg = Package::open_bytes(&bytes).expect("package should parse");

        assert_eq!(pkg.sprite_count(), 1);
        assert_eq!(pkg.animation_count(), 1);
        assert_eq!(pkg.atlas_page_count(), 1);

        let (_, sprite) = pkg.find_sprite("hero").expect("sprite should be found");
        assert_eq!(sprite.id(&pkg), "hero");
        assert_eq!(sprite.frame_count, 1);
        let frames = sprite.frames(&pkg);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].uv(), (0.0, 0.0, 1.0, 1.0));

        let (_, animation) = pkg.find_animation("idle").expect("animation should be found");
        assert_eq!(animation.total_duration_ms, 100);
        assert_eq!(animation.keys(&pkg).len(), 1);

        let (w, h, stride, pixels) = pkg.atlas_page_pixels(0).expect("page 0 should exist");
        assert_eq!((w, h, stride), (64, 32, 256));
        assert!(pixels.is_some());
    }

    #[test]
    fn resolve_sprite_binding_requires_at_least_one_id() {
        let bytes = one_sprite_package_bytes();
        let pkg = Package::open_bytes(&bytes).unwrap();
        assert!(pkg.resolve_sprite_binding(None, None).is_err());
        assert!(pkg.resolve_sprite_binding(Some("hero"), None).is_ok());
        assert!(pkg.resolve_sprite_binding(None, Some("idle")).is_ok());
        assert!(pkg.resolve_sprite_binding(Some("hero"), Some("idle")).is_ok());
    }

    #[test]
    fn rejects_truncated_header() {
        let result = Package::open_bytes(&[0u8; 8]);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().status, Status::ParseError);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = one_sprite_package_bytes();
        bytes[0] = b'X';
        let result = Package::open_bytes(&bytes);
        assert!(result.is_err());
    }
}
