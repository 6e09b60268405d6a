//! L6 — animation resolver.
//!
//! Flattens `manifest.animations` into a global, contiguous `AnimationKey`
//! array and a per-animation `(key_start, key_count, total_duration_ms)`
//! summary. By the time this stage runs, L2 has already confirmed every
//! frame index is in range for sprites with a statically known frame
//! count; this stage re-checks against the frame counts actually resolved
//! by L4 (authoritative for `grid` sprites without an explicit
//! `frame_count`) and aborts on the first violation, per spec.md §7.

use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use crate::frames::SpriteFrameRange;
use crate::manifest::model::Manifest;

#[derive(Debug, Clone, Copy)]
pub struct AnimationKey {
    pub animation_index: usize,
    pub frame_index: u32,
    pub duration_ms: u32,
}

#[derive(Debug, Clone)]
pub struct ResolvedAnimation {
    pub sprite_index: usize,
    pub loop_mode_code: u32,
    pub key_start: usize,
    pub key_count: usize,
    pub total_duration_ms: u64,
}

pub fn resolve_animations(
    manifest: &Manifest,
    sprite_frame_ranges: &[SpriteFrameRange],
    diag: &mut DiagCounter,
) -> Result<(Vec<ResolvedAnimation>, Vec<AnimationKey>), PackratError> {
    let mut keys = Vec::new();
    let mut resolved = Vec::with_capacity(manifest.animations.len());

    for (animation_index, animation) in manifest.animations.iter().enumerate() {
        let asset_id = animation.id.clone().unwrap_or_default();
        let sprite_id = animation.sprite.as_deref().unwrap_or("");
        let sprite_index = manifest.find_sprite_index(sprite_id).ok_or_else(|| {
            PackratError::new(Status::InternalError, format!("animation '{asset_id}' references unresolved sprite (should have failed validation)"))
        })?;
        let (_first_frame, frame_count) = sprite_frame_ranges[sprite_index];

        let key_start = keys.len();
        let frames = animation.frames.as_ref().ok_or_else(|| {
            PackratError::new(Status::InternalError, "animation with no frames reached the resolver (should have failed validation)".to_string())
        })?;

        let mut total_duration_ms: u64 = 0;
        for frame in frames {
            let frame_index = frame.index.unwrap_or(0).max(0) as u32;
            if frame_index as usize >= frame_count {
                diag.emit(
                    Diagnostic::error(
                        codes::ANIM_FRAME_INDEX_OOB,
                        format!("animation frame index {frame_index} is out of bounds for sprite with {frame_count} resolved frame(s)."),
                    )
                    .with_asset_id(asset_id.clone()),
                );
                return Err(PackratError::new(Status::ValidationError, "animation frame index out of bounds after frame resolution"));
            }

            let duration_ms = frame.ms.unwrap_or(0).max(0) as u32;
            total_duration_ms += duration_ms as u64;
            keys.push(AnimationKey { animation_index, frame_index, duration_ms });
        }

        resolved.push(ResolvedAnimation {
            sprite_index,
            loop_mode_code: animation.loop_mode.code(),
            key_start,
            key_count: keys.len() - key_start,
            total_duration_ms,
        });
    }

    Ok((resolved, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagCounter;
    use crate::manifest::model::{AnimationEntry, AnimationFrameDef, LoopMode, SpriteEntry};

    fn manifest_with_animation(frames: Vec<AnimationFrameDef>) -> Manifest {
        let mut manifest = Manifest::default();
        manifest.sprites.push(SpriteEntry { id: Some("hero".to_string()), ..Default::default() });
        manifest.animations.push(AnimationEntry {
            id: Some("walk".to_string()),
            sprite: Some("hero".to_string()),
            loop_mode: LoopMode::Loop,
            frames: Some(frames),
            line: 0,
        });
        manifest
    }

    #[test]
    fn accumulates_total_duration() {
        let manifest = manifest_with_animation(vec![
            AnimationFrameDef { index: Some(0), ms: Some(100), line: 0 },
            AnimationFrameDef { index: Some(1), ms: Some(150), line: 0 },
        ]);
        let ranges = vec![(0, 2)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let (resolved, keys) = resolve_animations(&manifest, &ranges, &mut counter).unwrap();
        assert_eq!(resolved[0].total_duration_ms, 250);
        assert_eq!(resolved[0].key_count, 2);
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn out_of_range_frame_index_fails() {
        let manifest = manifest_with_animation(vec![AnimationFrameDef { index: Some(5), ms: Some(100), line: 0 }]);
        let ranges = vec![(0, 1)];
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = resolve_animations(&manifest, &ranges, &mut counter);
        assert!(result.is_err());
    }
}
