//! Build pipeline orchestrator — wires L1 through L8 into a single
//! `build_package` call, in the strict L1→L8 order spec.md §2 requires.
//! Each stage's `Result` is propagated with `?`; nothing downstream of a
//! failing stage runs, and no output bytes are written until every stage
//! upstream of the encoder has succeeded.

use crate::animations::resolve_animations;
use crate::atlas::pack_atlas;
use crate::debug_json;
use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use crate::encode::{encode_package, EncodeInput};
use crate::frames::resolve_frames;
use crate::image_import::import_images;
use crate::manifest::{self, Manifest};
use crate::strings::build_string_table;
use std::fs;
use std::path::Path;

/// Build-time flags layered on top of the manifest, per spec.md §6.1/§5.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides `manifest.output` (CLI `--output`).
    pub output_override: Option<String>,
    /// Overrides `manifest.debug_output` (CLI `--debug-output`).
    pub debug_output_override: Option<String>,
    /// Overrides `manifest.pretty_debug_json` (CLI `--pretty-debug-json`).
    pub pretty_debug_json_override: Option<bool>,
    /// Strict mode: any validation warning aborts the build before any
    /// bytes are written, per spec.md §5's "Strict-mode" paragraph.
    pub strict: bool,
}

/// Summary of a successful build, returned to the caller (CLI or embedder)
/// instead of written into any process-wide state — spec.md §9 explicitly
/// forbids a "global mutable result buffer".
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub output_path: String,
    pub debug_output_path: Option<String>,
    pub bytes_written: u64,
    pub image_count: usize,
    pub sprite_count: usize,
    pub animation_count: usize,
    pub atlas_page_count: usize,
}

fn create_parent_dir(path: &str) -> Result<(), PackratError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|err| PackratError::new(Status::IoError, format!("failed to create output directory for '{path}': {err}")))?;
        }
    }
    Ok(())
}

/// Runs the full build pipeline (L1-L8) for the manifest at `manifest_path`,
/// emitting diagnostics through `diag` and writing the resulting `.prpk`
/// (and, if configured, debug JSON sidecar) to disk.
pub fn build_package(manifest_path: &str, options: &BuildOptions, diag: &mut DiagCounter) -> Result<BuildResult, PackratError> {
    log::debug!("build: loading manifest '{manifest_path}'");
    let manifest = manifest::load_and_validate(manifest_path, diag)?;
    log::trace!(
        "build: manifest loaded ({} image(s), {} sprite(s), {} animation(s))",
        manifest.images.len(),
        manifest.sprites.len(),
        manifest.animations.len()
    );

    if options.strict && diag.warning_count > 0 {
        diag.emit(Diagnostic::error(
            codes::STRICT_WARNINGS_PRESENT,
            format!("strict mode: {} warning(s) present; aborting before any bytes are written.", diag.warning_count),
        ));
        return Err(PackratError::new(
            Status::ValidationError,
            format!("strict mode: {} warning(s) present", diag.warning_count),
        ));
    }

    let images = import_images(manifest_path, &manifest, diag)?;
    log::debug!("build: imported {} image(s)", images.len());
    let (frame_sources, sprite_ranges) = resolve_frames(&manifest, &images, diag)?;
    log::debug!("build: resolved {} frame(s)", frame_sources.len());
    let (packed_frames, atlas_pages) = pack_atlas(&manifest, &images, &frame_sources, diag)?;
    log::debug!("build: packed {} frame(s) into {} atlas page(s)", packed_frames.len(), atlas_pages.len());
    let (resolved_animations, animation_keys) = resolve_animations(&manifest, &sprite_ranges, diag)?;
    log::debug!("build: resolved {} animation(s)", resolved_animations.len());
    let string_index = build_string_table(&manifest, &images);
    log::trace!("build: interned {} string(s)", string_index.table.len());

    let bytes = encode_package(&EncodeInput {
        manifest: &manifest,
        string_index: &string_index,
        images: &images,
        sprite_ranges: &sprite_ranges,
        packed_frames: &packed_frames,
        atlas_pages: &atlas_pages,
        resolved_animations: &resolved_animations,
        animation_keys: &animation_keys,
    });

    let output_path = options
        .output_override
        .clone()
        .or_else(|| manifest.output.clone())
        .ok_or_else(|| PackratError::new(Status::InternalError, "output path missing after validation"))?;

    create_parent_dir(&output_path)?;
    fs::write(&output_path, &bytes)
        .map_err(|err| PackratError::new(Status::IoError, format!("failed to write package '{output_path}': {err}")))?;

    let debug_output_path = options.debug_output_override.clone().or_else(|| manifest.debug_output.clone());
    if let Some(debug_path) = &debug_output_path {
        let pretty = options.pretty_debug_json_override.unwrap_or(manifest.pretty_debug_json);
        let json = debug_json::render(&manifest, &images, pretty)
            .map_err(|err| PackratError::new(Status::InternalError, format!("failed to serialize debug JSON: {err}")))?;
        create_parent_dir(debug_path)?;
        fs::write(debug_path, json)
            .map_err(|err| PackratError::new(Status::IoError, format!("failed to write debug JSON '{debug_path}': {err}")))?;
    }

    Ok(BuildResult {
        output_path,
        debug_output_path,
        bytes_written: bytes.len() as u64,
        image_count: images.len(),
        sprite_count: manifest.sprites.len(),
        animation_count: manifest.animations.len(),
        atlas_page_count: atlas_pages.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::runtime::Package;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir_for(label: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("packrat_build_{label}_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        img.save(path).unwrap();
    }

    #[test]
    fn builds_a_single_sprite_package_end_to_end() {
        let dir = temp_dir_for("single");
        let image_path = dir.join("sheet.png");
        write_png(&image_path, 64, 32);

        let manifest_path = dir.join("pack.toml");
        {
            let mut file = fs::File::create(&manifest_path).unwrap();
            writeln!(
                file,
                "schema_version = 1\npackage_name = \"demo\"\noutput = \"{out}\"\n\n[[images]]\nid = \"sheet\"\npath = \"sheet.png\"\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"single\"\nw = 64\nh = 32\n\n[[animations]]\nid = \"idle\"\nsprite = \"hero\"\nframes = [{{ index = 0, ms = 100 }}]\n",
                out = dir.join("out.prpk").to_str().unwrap().replace('\\', "/")
            )
            .unwrap();
        }

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let options = BuildOptions::default();
        let result = build_package(manifest_path.to_str().unwrap(), &options, &mut counter).expect("build should succeed");

        assert_eq!(result.image_count, 1);
        assert_eq!(result.sprite_count, 1);
        assert_eq!(result.animation_count, 1);
        assert_eq!(result.atlas_page_count, 1);

        let pkg = Package::open_file(&result.output_path).expect("package should parse");
        assert_eq!(pkg.sprite_count(), 1);
        assert_eq!(pkg.animation_count(), 1);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strict_mode_aborts_before_writing_on_warnings() {
        let dir = temp_dir_for("strict");
        let manifest_path = dir.join("pack.toml");
        let output_path = dir.join("out.bin");
        {
            let mut file = fs::File::create(&manifest_path).unwrap();
            writeln!(
                file,
                "schema_version = 1\npackage_name = \"demo\"\noutput = \"{}\"\n",
                output_path.to_str().unwrap().replace('\\', "/")
            )
            .unwrap();
        }

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let options = BuildOptions { strict: true, ..Default::default() };
        let result = build_package(manifest_path.to_str().unwrap(), &options, &mut counter);

        assert!(result.is_err());
        assert!(!output_path.exists());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn writes_debug_json_alongside_package() {
        let dir = temp_dir_for("debugjson");
        let image_path = dir.join("sheet.png");
        write_png(&image_path, 16, 16);

        let manifest_path = dir.join("pack.toml");
        let out_path = dir.join("out.prpk");
        let debug_path = dir.join("out.debug.json");
        {
            let mut file = fs::File::create(&manifest_path).unwrap();
            writeln!(
                file,
                "schema_version = 1\npackage_name = \"demo\"\noutput = \"{}\"\ndebug_output = \"{}\"\n\n[[images]]\nid = \"sheet\"\npath = \"sheet.png\"\n\n[[sprites]]\nid = \"icon\"\nsource = \"sheet\"\nmode = \"single\"\nw = 16\nh = 16\n",
                out_path.to_str().unwrap().replace('\\', "/"),
                debug_path.to_str().unwrap().replace('\\', "/"),
            )
            .unwrap();
        }

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let options = BuildOptions::default();
        let result = build_package(manifest_path.to_str().unwrap(), &options, &mut counter).expect("build should succeed");

        assert!(result.debug_output_path.is_some());
        assert!(debug_path.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
