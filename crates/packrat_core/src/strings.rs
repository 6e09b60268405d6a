//! L7 — string interning and index maps.
//!
//! A single [`StringTable`] dedups every string referenced by the package:
//! the package name (reserved slot 0, per spec.md §3), then each image's id
//! and resolved path, then each sprite id, then each animation id, all in
//! declaration order. Entities carry the resulting index rather than the
//! string itself, matching the "compact numeric indexes" spec.md §4.7 asks
//! for.

use crate::image_import::ImportedImage;
use crate::manifest::model::Manifest;
use std::collections::HashMap;

/// Ordered, deduplicated string storage. Insertion order is preserved;
/// re-interning an already-seen string returns its existing index.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    pub fn as_slice(&self) -> &[String] {
        &self.strings
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// String-table indices for every named entity in the manifest, built by
/// [`build_string_table`].
pub struct StringIndex {
    pub table: StringTable,
    pub package_name_idx: u32,
    pub image_id_idx: Vec<u32>,
    pub image_path_idx: Vec<u32>,
    pub sprite_name_idx: Vec<u32>,
    pub animation_name_idx: Vec<u32>,
}

/// Interns every string the package needs, in the order spec.md §4.7
/// prescribes: package name first (reserved slot 0), then every image id and
/// resolved path, then every sprite id, then every animation id.
pub fn build_string_table(manifest: &Manifest, images: &[ImportedImage]) -> StringIndex {
    let mut table = StringTable::new();

    let package_name_idx = table.intern(manifest.package_name.as_deref().unwrap_or(""));

    let mut image_id_idx = Vec::with_capacity(images.len());
    let mut image_path_idx = Vec::with_capacity(images.len());
    for image in images {
        image_id_idx.push(table.intern(&image.id));
        image_path_idx.push(table.intern(&image.resolved_path));
    }

    let mut sprite_name_idx = Vec::with_capacity(manifest.sprites.len());
    for sprite in &manifest.sprites {
        sprite_name_idx.push(table.intern(sprite.id.as_deref().unwrap_or("")));
    }

    let mut animation_name_idx = Vec::with_capacity(manifest.animations.len());
    for animation in &manifest.animations {
        animation_name_idx.push(table.intern(animation.id.as_deref().unwrap_or("")));
    }

    StringIndex {
        table,
        package_name_idx,
        image_id_idx,
        image_path_idx,
        sprite_name_idx,
        animation_name_idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::model::{ImageEntry, SpriteEntry};

    #[test]
    fn package_name_reserves_slot_zero() {
        let mut manifest = Manifest::default();
        manifest.package_name = Some("demo".to_string());
        let idx = build_string_table(&manifest, &[]);
        assert_eq!(idx.package_name_idx, 0);
        assert_eq!(idx.table.as_slice()[0], "demo");
    }

    #[test]
    fn duplicate_strings_share_one_slot() {
        let mut manifest = Manifest::default();
        manifest.package_name = Some("shared".to_string());
        manifest.sprites.push(SpriteEntry {
            id: Some("shared".to_string()),
            ..Default::default()
        });
        let idx = build_string_table(&manifest, &[]);
        assert_eq!(idx.sprite_name_idx[0], idx.package_name_idx);
        assert_eq!(idx.table.len(), 1);
    }

    #[test]
    fn interns_image_id_and_path_in_order() {
        let manifest = Manifest::default();
        let images = vec![crate::image_import::ImportedImage {
            id: "sheet".to_string(),
            resolved_path: "art/sheet.png".to_string(),
            width: 1,
            height: 1,
            tight_row_bytes: 4,
            pixels: vec![0; 4],
            source_file_bytes: 0,
            color_space: crate::manifest::model::ColorSpace::Srgb,
        }];
        let idx = build_string_table(&manifest, &images);
        assert_eq!(idx.table.as_slice()[idx.image_id_idx[0] as usize], "sheet");
        assert_eq!(idx.table.as_slice()[idx.image_path_idx[0] as usize], "art/sheet.png");
        let _ = ImageEntry::default();
    }
}
