//! L5 — atlas packer.
//!
//! Shelf-packs padded sprite frames into one or more fixed-maximum-size
//! pages, composites the frame pixels into each page's RGBA8 buffer, and
//! recomputes fixed-point UVs for every placed frame. Determinism (same
//! manifest + images → identical page count, placements, dimensions) comes
//! entirely from the stable sort key in [`sort_key`] — no hashing, no
//! iteration over an unordered container anywhere in this module.

use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use crate::frames::FrameSource;
use crate::image_import::ImportedImage;
use crate::manifest::model::Manifest;

#[derive(Debug, Clone, Copy)]
pub struct PackedFrame {
    pub sprite_index: usize,
    pub local_frame_index: usize,
    pub source_x: i64,
    pub source_y: i64,
    pub source_w: i64,
    pub source_h: i64,
    pub atlas_page: usize,
    pub atlas_x: i64,
    pub atlas_y: i64,
    pub atlas_w: i64,
    pub atlas_h: i64,
    pub u0_milli: u32,
    pub v0_milli: u32,
    pub u1_milli: u32,
    pub v1_milli: u32,
}

#[derive(Debug, Clone)]
pub struct AtlasPage {
    pub max_w: i64,
    pub max_h: i64,
    pub used_w: i64,
    pub used_h: i64,
    pub final_w: i64,
    pub final_h: i64,
    pub pixels: Vec<u8>,
}

struct PageState {
    max_w: i64,
    max_h: i64,
    cursor_x: i64,
    cursor_y: i64,
    shelf_h: i64,
    used_w: i64,
    used_h: i64,
}

impl PageState {
    fn new(max_w: i64, max_h: i64) -> Self {
        Self { max_w, max_h, cursor_x: 0, cursor_y: 0, shelf_h: 0, used_w: 0, used_h: 0 }
    }

    /// Attempts to place a `padded_w x padded_h` footprint on this page.
    /// Returns the unpadded placement origin on success. May close the
    /// current shelf (committing the cursor advance) even on failure —
    /// that consumed space is genuinely gone, per spec.md §4.5.
    fn try_place(&mut self, padded_w: i64, padded_h: i64, padding: i64) -> Option<(i64, i64)> {
        if self.cursor_x + padded_w > self.max_w {
            self.cursor_y += self.shelf_h;
            self.cursor_x = 0;
            self.shelf_h = 0;
        }
        if self.cursor_y + padded_h > self.max_h {
            return None;
        }
        let atlas_x = self.cursor_x + padding;
        let atlas_y = self.cursor_y + padding;
        self.cursor_x += padded_w;
        if padded_h > self.shelf_h {
            self.shelf_h = padded_h;
        }
        if self.cursor_x > self.used_w {
            self.used_w = self.cursor_x;
        }
        if self.cursor_y + self.shelf_h > self.used_h {
            self.used_h = self.cursor_y + self.shelf_h;
        }
        Some((atlas_x, atlas_y))
    }
}

fn sort_key(frame: &FrameSource) -> (i64, i64, i64, usize, usize) {
    let padded_w = frame.source_w;
    let padded_h = frame.source_h;
    (-(padded_w * padded_h), -padded_h, -padded_w, frame.sprite_index, frame.local_frame_index)
}

fn next_power_of_two(value: i64) -> i64 {
    if value <= 1 {
        return 1;
    }
    (value as u64).next_power_of_two() as i64
}

pub fn pack_atlas(
    manifest: &Manifest,
    images: &[ImportedImage],
    frames: &[FrameSource],
    diag: &mut DiagCounter,
) -> Result<(Vec<PackedFrame>, Vec<AtlasPage>), PackratError> {
    if frames.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let atlas = &manifest.atlas;
    let padding = atlas.padding;
    let max_w = atlas.max_page_width;
    let max_h = atlas.max_page_height;

    let mut order: Vec<usize> = (0..frames.len()).collect();
    order.sort_by_key(|&i| sort_key(&frames[i]));

    for &i in &order {
        let frame = &frames[i];
        let padded_w = frame.source_w + 2 * padding;
        let padded_h = frame.source_h + 2 * padding;
        if padded_w > max_w || padded_h > max_h {
            diag.emit(
                Diagnostic::error(
                    codes::ATLAS_FRAME_TOO_LARGE,
                    format!(
                        "frame (sprite {}, local {}) padded footprint {padded_w}x{padded_h} exceeds max page size {max_w}x{max_h}.",
                        frame.sprite_index, frame.local_frame_index
                    ),
                ),
            );
            return Err(PackratError::new(Status::ValidationError, "a frame's padded footprint exceeds the max page size"));
        }
    }

    let mut pages: Vec<PageState> = Vec::new();
    let mut placements: Vec<(usize, i64, i64)> = vec![(0, 0, 0); frames.len()];

    for &i in &order {
        let frame = &frames[i];
        let padded_w = frame.source_w + 2 * padding;
        let padded_h = frame.source_h + 2 * padding;

        let mut placed = None;
        for (page_index, page) in pages.iter_mut().enumerate() {
            if let Some((x, y)) = page.try_place(padded_w, padded_h, padding) {
                placed = Some((page_index, x, y));
                break;
            }
        }

        let placed = match placed {
            Some(p) => p,
            None => {
                let mut page = PageState::new(max_w, max_h);
                let origin = page.try_place(padded_w, padded_h, padding).ok_or_else(|| {
                    diag.emit(Diagnostic::error(
                        codes::ATLAS_INTERNAL_PLACEMENT,
                        "a fresh page refused its first placement despite passing the frame-too-large check.",
                    ));
                    PackratError::new(Status::InternalError, "fresh atlas page refused first placement")
                })?;
                pages.push(page);
                (pages.len() - 1, origin.0, origin.1)
            }
        };

        placements[i] = placed;
    }

    let mut final_pages: Vec<AtlasPage> = pages
        .iter()
        .map(|page| {
            let mut final_w = page.used_w.max(1);
            let mut final_h = page.used_h.max(1);
            if atlas.power_of_two {
                final_w = next_power_of_two(final_w).min(max_w);
                final_h = next_power_of_two(final_h).min(max_h);
            }
            AtlasPage {
                max_w,
                max_h,
                used_w: page.used_w,
                used_h: page.used_h,
                final_w,
                final_h,
                pixels: vec![0u8; (final_w * final_h * 4) as usize],
            }
        })
        .collect();

    let mut packed = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let (page_index, atlas_x, atlas_y) = placements[i];
        let page = &final_pages[page_index];

        let u0 = (atlas_x * 1_000_000 / page.final_w) as u32;
        let v0 = (atlas_y * 1_000_000 / page.final_h) as u32;
        let u1 = ((atlas_x + frame.source_w) * 1_000_000 / page.final_w) as u32;
        let v1 = ((atlas_y + frame.source_h) * 1_000_000 / page.final_h) as u32;

        packed.push(PackedFrame {
            sprite_index: frame.sprite_index,
            local_frame_index: frame.local_frame_index,
            source_x: frame.source_x,
            source_y: frame.source_y,
            source_w: frame.source_w,
            source_h: frame.source_h,
            atlas_page: page_index,
            atlas_x,
            atlas_y,
            atlas_w: frame.source_w,
            atlas_h: frame.source_h,
            u0_milli: u0,
            v0_milli: v0,
            u1_milli: u1,
            v1_milli: v1,
        });

        let image = resolve_image_for_sprite(manifest, images, frame.sprite_index)?;
        blit_frame(&mut final_pages[page_index], image, frame, atlas_x, atlas_y);
    }

    Ok((packed, final_pages))
}

fn resolve_image_for_sprite<'a>(
    manifest: &Manifest,
    images: &'a [ImportedImage],
    sprite_index: usize,
) -> Result<&'a ImportedImage, PackratError> {
    let sprite = &manifest.sprites[sprite_index];
    let source = sprite.source.as_deref().unwrap_or("");
    let image_index = manifest
        .find_image_index(source)
        .ok_or_else(|| PackratError::new(Status::InternalError, "sprite source image unresolved during atlas packing"))?;
    images
        .get(image_index)
        .ok_or_else(|| PackratError::new(Status::InternalError, "image index out of range during atlas packing"))
}

fn blit_frame(page: &mut AtlasPage, image: &ImportedImage, frame: &FrameSource, atlas_x: i64, atlas_y: i64) {
    let w = frame.source_w as usize;
    let h = frame.source_h as usize;
    let final_w = page.final_w as usize;
    let src_row_bytes = image.tight_row_bytes as usize;

    for row in 0..h {
        let src_y = frame.source_y as usize + row;
        let src_x = frame.source_x as usize;
        let src_off = src_y * src_row_bytes + src_x * 4;
        let dst_y = atlas_y as usize + row;
        let dst_x = atlas_x as usize;
        let dst_off = (dst_y * final_w + dst_x) * 4;
        page.pixels[dst_off..dst_off + w * 4].copy_from_slice(&image.pixels[src_off..src_off + w * 4]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagCounter;
    use crate::manifest::model::{AtlasConfig, ImageEntry, Sampling, SpriteEntry, SpriteMode};

    fn image(width: u32, height: u32) -> ImportedImage {
        ImportedImage {
            id: "sheet".to_string(),
            resolved_path: "sheet.png".to_string(),
            width,
            height,
            tight_row_bytes: width * 4,
            pixels: vec![255u8; (width * height * 4) as usize],
            source_file_bytes: 0,
            color_space: crate::manifest::model::ColorSpace::Srgb,
        }
    }

    fn manifest_with_atlas(atlas: AtlasConfig, sprite_count: usize) -> Manifest {
        let mut manifest = Manifest { atlas, ..Default::default() };
        manifest.images.push(ImageEntry { id: Some("sheet".to_string()), path: Some("sheet.png".to_string()), ..Default::default() });
        for i in 0..sprite_count {
            manifest.sprites.push(SpriteEntry {
                id: Some(format!("s{i}")),
                source: Some("sheet".to_string()),
                mode: SpriteMode::Single,
                ..Default::default()
            });
        }
        manifest
    }

    #[test]
    fn single_frame_exact_fit_packs_on_fresh_page() {
        let atlas = AtlasConfig { max_page_width: 64, max_page_height: 32, padding: 0, power_of_two: false, sampling: Sampling::Pixel };
        let manifest = manifest_with_atlas(atlas, 1);
        let images = vec![image(64, 32)];
        let frames = vec![FrameSource { sprite_index: 0, local_frame_index: 0, source_x: 0, source_y: 0, source_w: 64, source_h: 32 }];

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (packed, pages) = pack_atlas(&manifest, &images, &frames, &mut counter).unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].final_w, pages[0].final_h), (64, 32));
        assert_eq!((packed[0].u0_milli, packed[0].v0_milli), (0, 0));
        assert_eq!((packed[0].u1_milli, packed[0].v1_milli), (1_000_000, 1_000_000));
    }

    #[test]
    fn frame_one_pixel_too_large_fails() {
        let atlas = AtlasConfig { max_page_width: 64, max_page_height: 32, padding: 0, power_of_two: false, sampling: Sampling::Pixel };
        let manifest = manifest_with_atlas(atlas, 1);
        let images = vec![image(65, 32)];
        let frames = vec![FrameSource { sprite_index: 0, local_frame_index: 0, source_x: 0, source_y: 0, source_w: 65, source_h: 32 }];

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = pack_atlas(&manifest, &images, &frames, &mut counter);
        assert!(result.is_err());
    }

    #[test]
    fn power_of_two_never_exceeds_max() {
        let atlas = AtlasConfig { max_page_width: 100, max_page_height: 100, padding: 0, power_of_two: true, sampling: Sampling::Pixel };
        let manifest = manifest_with_atlas(atlas, 1);
        let images = vec![image(80, 80)];
        let frames = vec![FrameSource { sprite_index: 0, local_frame_index: 0, source_x: 0, source_y: 0, source_w: 80, source_h: 80 }];

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (_packed, pages) = pack_atlas(&manifest, &images, &frames, &mut counter).unwrap();
        assert!(pages[0].final_w <= 100);
        assert!(pages[0].final_h <= 100);
    }

    #[test]
    fn rects_spill_across_multiple_pages() {
        let atlas = AtlasConfig { max_page_width: 256, max_page_height: 256, padding: 1, power_of_two: false, sampling: Sampling::Pixel };
        let manifest = manifest_with_atlas(atlas, 1);
        let images = vec![image(512, 512)];
        let frames: Vec<FrameSource> = (0..5)
            .map(|i| FrameSource { sprite_index: 0, local_frame_index: i, source_x: 0, source_y: 0, source_w: 200, source_h: 200 })
            .collect();

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (packed, pages) = pack_atlas(&manifest, &images, &frames, &mut counter).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(packed.iter().filter(|f| f.atlas_page == 0).count(), 4);
        assert_eq!(packed.iter().filter(|f| f.atlas_page == 1).count(), 1);
    }

    #[test]
    fn placements_never_overlap_within_a_page() {
        let atlas = AtlasConfig { max_page_width: 64, max_page_height: 64, padding: 1, power_of_two: false, sampling: Sampling::Pixel };
        let manifest = manifest_with_atlas(atlas, 4);
        let images = vec![image(64, 64)];
        let frames: Vec<FrameSource> = (0..4)
            .map(|i| FrameSource { sprite_index: i, local_frame_index: 0, source_x: 0, source_y: 0, source_w: 16, source_h: 16 })
            .collect();

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (packed, _pages) = pack_atlas(&manifest, &images, &frames, &mut counter).unwrap();

        for a in 0..packed.len() {
            for b in (a + 1)..packed.len() {
                let (fa, fb) = (&packed[a], &packed[b]);
                if fa.atlas_page != fb.atlas_page {
                    continue;
                }
                let overlap_x = fa.atlas_x < fb.atlas_x + fb.atlas_w && fb.atlas_x < fa.atlas_x + fa.atlas_w;
                let overlap_y = fa.atlas_y < fb.atlas_y + fb.atlas_h && fb.atlas_y < fa.atlas_y + fa.atlas_h;
                assert!(!(overlap_x && overlap_y), "frames {a} and {b} overlap");
            }
        }
    }
}
