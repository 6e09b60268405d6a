//! L8 — chunk encoder.
//!
//! Serializes the fully resolved build model (string table, atlas pages,
//! sprites/frames, animations/keys) into the `PRPK` little-endian binary
//! container described by spec.md §4.8. Every multi-byte integer is written
//! with an explicit `to_le_bytes()` call rather than a serialization crate:
//! this is a fixed, self-describing wire format with its own chunk framing,
//! not a Rust-value graph, so there is nothing for `serde` to buy here (the
//! workspace's existing `serde`/`serde_json` dependency is reserved for the
//! debug JSON sidecar in `debug_json.rs`, where it *is* the right tool).

use crate::animations::{AnimationKey, ResolvedAnimation};
use crate::atlas::{AtlasPage, PackedFrame};
use crate::image_import::ImportedImage;
use crate::manifest::model::{Manifest, SpriteMode};
use crate::strings::StringIndex;

const MAGIC: &[u8; 4] = b"PRPK";
const VERSION_MAJOR: u16 = 1;
const VERSION_MINOR: u16 = 0;
const HEADER_SIZE: u32 = 24;
const CHUNK_TABLE_ENTRY_SIZE: u64 = 20;

/// Sprite authoring-mode tag written into the `SPRT` chunk, per spec.md §3's
/// `mode_tag` field. Closed, stable numbering: 0=single, 1=grid, 2=rects.
fn mode_tag(mode: SpriteMode) -> u32 {
    match mode {
        SpriteMode::Single => 0,
        SpriteMode::Grid => 1,
        SpriteMode::Rects => 2,
    }
}

/// Image pixel format code written into the `INDX` chunk. Every imported
/// image is decoded to tightly packed 8-bit RGBA (spec.md §4.3), so this is
/// currently always 0; the field exists so an `INDX` reader never needs a
/// format guess.
const FORMAT_RGBA8: u32 = 0;

fn milli(value: f64) -> u32 {
    (value * 1000.0).round().clamp(0.0, u32::MAX as f64) as u32
}

struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

fn encode_strs(string_index: &StringIndex) -> Vec<u8> {
    let strings = string_index.table.as_slice();
    let mut blob = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(blob.len() as u32);
        blob.extend_from_slice(s.as_bytes());
        blob.push(0);
    }

    let mut w = ByteWriter::new();
    w.u32(1);
    w.u32(strings.len() as u32);
    w.u32(blob.len() as u32);
    for off in offsets {
        w.u32(off);
    }
    w.bytes(&blob);
    w.into_vec()
}

fn sampling_code(manifest: &Manifest) -> u32 {
    match manifest.atlas.sampling {
        crate::manifest::model::Sampling::Pixel => 0,
        crate::manifest::model::Sampling::Linear => 1,
    }
}

fn encode_txtr(manifest: &Manifest, pages: &[AtlasPage]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(1);
    w.u32(pages.len() as u32);
    w.u32(manifest.atlas.max_page_width as u32);
    w.u32(manifest.atlas.max_page_height as u32);
    w.u32(manifest.atlas.padding as u32);
    w.u32(manifest.atlas.power_of_two as u32);
    w.u32(sampling_code(manifest));
    for (page_index, page) in pages.iter().enumerate() {
        let width = page.final_w as u32;
        let height = page.final_h as u32;
        w.u32(page_index as u32);
        w.u32(width);
        w.u32(height);
        w.u32(page.pixels.len() as u32);
        w.bytes(&page.pixels);
    }
    w.into_vec()
}

#[allow(clippy::too_many_arguments)]
fn encode_sprt(
    manifest: &Manifest,
    string_index: &StringIndex,
    sprite_ranges: &[(usize, usize)],
    packed_frames: &[PackedFrame],
) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(1);
    w.u32(manifest.sprites.len() as u32);
    w.u32(packed_frames.len() as u32);

    for (sprite_index, sprite) in manifest.sprites.iter().enumerate() {
        let source_image_index = manifest.find_image_index(sprite.source.as_deref().unwrap_or("")).unwrap_or(0);
        let (first_frame, frame_count) = sprite_ranges[sprite_index];
        w.u32(string_index.sprite_name_idx[sprite_index]);
        w.u32(source_image_index as u32);
        w.u32(mode_tag(sprite.mode));
        w.u32(first_frame as u32);
        w.u32(frame_count as u32);
        w.u32(milli(sprite.pivot_x));
        w.u32(milli(sprite.pivot_y));
    }

    for frame in packed_frames {
        w.u32(frame.sprite_index as u32);
        w.u32(frame.local_frame_index as u32);
        w.u32(frame.source_x as u32);
        w.u32(frame.source_y as u32);
        w.u32(frame.source_w as u32);
        w.u32(frame.source_h as u32);
        w.u32(frame.atlas_page as u32);
        w.u32(frame.atlas_x as u32);
        w.u32(frame.atlas_y as u32);
        w.u32(frame.atlas_w as u32);
        w.u32(frame.atlas_h as u32);
        w.u32(frame.u0_milli);
        w.u32(frame.v0_milli);
        w.u32(frame.u1_milli);
        w.u32(frame.v1_milli);
    }

    w.into_vec()
}

fn encode_anim(
    string_index: &StringIndex,
    resolved_animations: &[ResolvedAnimation],
    animation_keys: &[AnimationKey],
) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(1);
    w.u32(resolved_animations.len() as u32);
    w.u32(animation_keys.len() as u32);

    for (animation_index, animation) in resolved_animations.iter().enumerate() {
        w.u32(string_index.animation_name_idx[animation_index]);
        w.u32(animation.sprite_index as u32);
        w.u32(animation.loop_mode_code);
        w.u32(animation.key_start as u32);
        w.u32(animation.key_count as u32);
        w.u32(animation.total_duration_ms as u32);
    }

    for key in animation_keys {
        w.u32(key.animation_index as u32);
        w.u32(key.frame_index);
        w.u32(key.duration_ms);
    }

    w.into_vec()
}

fn encode_indx(
    manifest: &Manifest,
    string_index: &StringIndex,
    images: &[ImportedImage],
    sprite_ranges: &[(usize, usize)],
    resolved_animations: &[ResolvedAnimation],
) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(1);
    w.u32(images.len() as u32);
    w.u32(manifest.sprites.len() as u32);
    w.u32(resolved_animations.len() as u32);

    for (i, _image) in images.iter().enumerate() {
        w.u32(string_index.image_id_idx[i]);
        w.u32(string_index.image_path_idx[i]);
        w.u32(images[i].width);
        w.u32(images[i].height);
        w.u32(FORMAT_RGBA8);
    }

    for (sprite_index, _sprite) in manifest.sprites.iter().enumerate() {
        let (first_frame, frame_count) = sprite_ranges[sprite_index];
        let source_image_index = manifest
            .find_image_index(manifest.sprites[sprite_index].source.as_deref().unwrap_or(""))
            .unwrap_or(0);
        w.u32(string_index.sprite_name_idx[sprite_index]);
        w.u32(sprite_index as u32);
        w.u32(source_image_index as u32);
        w.u32(first_frame as u32);
        w.u32(frame_count as u32);
    }

    for (animation_index, animation) in resolved_animations.iter().enumerate() {
        w.u32(string_index.animation_name_idx[animation_index]);
        w.u32(animation_index as u32);
        w.u32(animation.sprite_index as u32);
        w.u32(animation.key_start as u32);
        w.u32(animation.key_count as u32);
    }

    w.into_vec()
}

/// Every input the chunk encoder needs; gathered from the earlier pipeline
/// stages (L1-L7) by `build::build_package`.
pub struct EncodeInput<'a> {
    pub manifest: &'a Manifest,
    pub string_index: &'a StringIndex,
    pub images: &'a [ImportedImage],
    pub sprite_ranges: &'a [(usize, usize)],
    pub packed_frames: &'a [PackedFrame],
    pub atlas_pages: &'a [AtlasPage],
    pub resolved_animations: &'a [ResolvedAnimation],
    pub animation_keys: &'a [AnimationKey],
}

/// Assembles the `PRPK` container: header, chunk table, then chunk payloads
/// in `STRS, TXTR?, SPRT, ANIM, INDX` order (`TXTR` omitted when there are no
/// frames, per spec.md §4.8). Chunk lookup by readers is by id, so this fixed
/// writer order is an implementation choice, not a format requirement.
pub fn encode_package(input: &EncodeInput) -> Vec<u8> {
    let strs = encode_strs(input.string_index);
    let txtr = if input.packed_frames.is_empty() {
        None
    } else {
        Some(encode_txtr(input.manifest, input.atlas_pages))
    };
    let sprt = encode_sprt(input.manifest, input.string_index, input.sprite_ranges, input.packed_frames);
    let anim = encode_anim(input.string_index, input.resolved_animations, input.animation_keys);
    let indx = encode_indx(
        input.manifest,
        input.string_index,
        input.images,
        input.sprite_ranges,
        input.resolved_animations,
    );

    let mut chunks: Vec<(&[u8; 4], Vec<u8>)> = vec![(b"STRS", strs)];
    if let Some(txtr) = txtr {
        chunks.push((b"TXTR", txtr));
    }
    chunks.push((b"SPRT", sprt));
    chunks.push((b"ANIM", anim));
    chunks.push((b"INDX", indx));

    let chunk_count = chunks.len() as u32;
    let chunk_table_off: u64 = HEADER_SIZE as u64;
    let mut payload_off = chunk_table_off + chunk_count as u64 * CHUNK_TABLE_ENTRY_SIZE;

    let mut out = ByteWriter::new();
    out.bytes(MAGIC);
    out.buf.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
    out.buf.extend_from_slice(&VERSION_MINOR.to_le_bytes());
    out.u32(HEADER_SIZE);
    out.u32(chunk_count);
    out.u64(chunk_table_off);

    let mut offsets = Vec::with_capacity(chunks.len());
    for (id, payload) in &chunks {
        offsets.push(payload_off);
        out.bytes(id.as_slice());
        out.u64(payload_off);
        out.u64(payload.len() as u64);
        payload_off += payload.len() as u64;
    }

    for (_, payload) in &chunks {
        out.bytes(payload);
    }

    out.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::build_string_table;

    #[test]
    fn header_and_chunk_table_layout_are_consistent() {
        let mut manifest = Manifest::default();
        manifest.package_name = Some("demo".to_string());
        let string_index = build_string_table(&manifest, &[]);

        let input = EncodeInput {
            manifest: &manifest,
            string_index: &string_index,
            images: &[],
            sprite_ranges: &[],
            packed_frames: &[],
            atlas_pages: &[],
            resolved_animations: &[],
            animation_keys: &[],
        };
        let bytes = encode_package(&input);

        assert_eq!(&bytes[0..4], MAGIC);
        let chunk_count = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        assert_eq!(chunk_count, 4, "TXTR omitted when there are no frames");
        let chunk_table_off = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        assert_eq!(chunk_table_off, 24);

        for i in 0..chunk_count as usize {
            let entry_off = 24 + i * 20;
            let payload_off = u64::from_le_bytes(bytes[entry_off + 4..entry_off + 12].try_into().unwrap());
            let payload_size = u64::from_le_bytes(bytes[entry_off + 12..entry_off + 20].try_into().unwrap());
            assert!(payload_off + payload_size <= bytes.len() as u64);
        }
    }

    #[test]
    fn strs_offsets_are_strictly_increasing_and_nul_terminated() {
        let mut manifest = Manifest::default();
        manifest.package_name = Some("pkg".to_string());
        manifest.sprites.push(crate::manifest::model::SpriteEntry {
            id: Some("hero".to_string()),
            ..Default::default()
        });
        let string_index = build_string_table(&manifest, &[]);
        let strs = encode_strs(&string_index);

        let string_count = u32::from_le_bytes(strs[4..8].try_into().unwrap());
        let blob_bytes = u32::from_le_bytes(strs[8..12].try_into().unwrap());
        let mut offsets = Vec::new();
        for i in 0..string_count as usize {
            let off = 12 + i * 4;
            offsets.push(u32::from_le_bytes(strs[off..off + 4].try_into().unwrap()));
        }
        for w in offsets.windows(2) {
            assert!(w[0] < w[1]);
        }
        assert!(*offsets.last().unwrap() < blob_bytes);
    }
}
