use packrat_core::diagnostics::{DiagCounter, Diagnostic, PackratError, Severity, Status};
use packrat_core::{build, manifest, runtime};
use std::process::ExitCode;

fn usage() -> String {
    "Usage:\n  packrat validate <manifest>\n  packrat build    <manifest> [--output <path>] [--debug-output <path>] [--pretty-debug-json] [--quiet] [--strict]\n  packrat inspect  <package>  [--json] [--verbose]".to_string()
}

fn print_diagnostic(diag: &Diagnostic, quiet: bool) {
    if quiet && diag.severity != Severity::Error {
        return;
    }
    let mut location = String::new();
    if let Some(file) = &diag.file {
        location.push_str(file);
        if let Some(line) = diag.line {
            location.push_str(&format!(":{line}"));
        }
    }
    if location.is_empty() {
        eprintln!("{} [{}] {}", diag.severity.as_str(), diag.code, diag.message);
    } else {
        eprintln!("{} [{}] {} ({location})", diag.severity.as_str(), diag.code, diag.message);
    }
}

fn run_validate(args: &[String]) -> Result<(), PackratError> {
    if args.len() != 1 {
        return Err(PackratError::new(Status::InvalidArgument, usage()));
    }
    let mut sink = |diag: Diagnostic| print_diagnostic(&diag, false);
    let mut counter = DiagCounter::new(&mut sink);
    manifest::load_and_validate(&args[0], &mut counter)?;
    println!(
        "manifest '{}' is valid ({} warning(s))",
        args[0], counter.warning_count
    );
    Ok(())
}

fn run_build(args: &[String]) -> Result<(), PackratError> {
    if args.is_empty() {
        return Err(PackratError::new(Status::InvalidArgument, usage()));
    }
    let manifest_path = &args[0];
    let mut options = build::BuildOptions::default();
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| PackratError::new(Status::InvalidArgument, "--output requires a value"))?;
                options.output_override = Some(value.clone());
            }
            "--debug-output" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| PackratError::new(Status::InvalidArgument, "--debug-output requires a value"))?;
                options.debug_output_override = Some(value.clone());
            }
            "--pretty-debug-json" => options.pretty_debug_json_override = Some(true),
            "--quiet" => quiet = true,
            "--strict" => options.strict = true,
            other => return Err(PackratError::new(Status::InvalidArgument, format!("unknown flag '{other}'\n{}", usage()))),
        }
        i += 1;
    }

    let mut sink = |diag: Diagnostic| print_diagnostic(&diag, quiet);
    let mut counter = DiagCounter::new(&mut sink);
    let result = build::build_package(manifest_path, &options, &mut counter)?;

    println!(
        "wrote '{}' ({} bytes): {} image(s), {} sprite(s), {} animation(s), {} atlas page(s)",
        result.output_path, result.bytes_written, result.image_count, result.sprite_count, result.animation_count, result.atlas_page_count
    );
    if let Some(debug_path) = &result.debug_output_path {
        println!("wrote debug JSON '{debug_path}'");
    }
    Ok(())
}

fn run_inspect(args: &[String]) -> Result<(), PackratError> {
    if args.is_empty() {
        return Err(PackratError::new(Status::InvalidArgument, usage()));
    }
    let package_path = &args[0];
    let mut json = false;
    let mut verbose = false;
    for flag in &args[1..] {
        match flag.as_str() {
            "--json" => json = true,
            "--verbose" => verbose = true,
            other => return Err(PackratError::new(Status::InvalidArgument, format!("unknown flag '{other}'\n{}", usage()))),
        }
    }

    let pkg = runtime::Package::open_file(package_path)?;

    if json {
        let doc = inspect_json(&pkg, verbose);
        let text = serde_json::to_string_pretty(&doc).map_err(|err| PackratError::new(Status::InternalError, format!("failed to serialize inspection report: {err}")))?;
        println!("{text}");
        return Ok(());
    }

    println!("sprites: {}", pkg.sprite_count());
    println!("animations: {}", pkg.animation_count());
    println!("atlas pages: {}", pkg.atlas_page_count());
    if verbose {
        for i in 0..pkg.sprite_count() {
            let sprite = pkg.sprite_at(i).expect("index within sprite_count");
            println!("  sprite[{i}] = '{}' ({} frame(s))", sprite.id(&pkg), sprite.frames(&pkg).len());
        }
        for i in 0..pkg.animation_count() {
            let animation = pkg.animation_at(i).expect("index within animation_count");
            println!("  animation[{i}] = '{}' ({} key(s))", animation.id(&pkg), animation.keys(&pkg).len());
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct InspectSprite {
    id: String,
    frame_count: usize,
}

#[derive(serde::Serialize)]
struct InspectAnimation {
    id: String,
    key_count: usize,
}

#[derive(serde::Serialize)]
struct InspectDocument {
    sprite_count: usize,
    animation_count: usize,
    atlas_page_count: usize,
    sprites: Vec<InspectSprite>,
    animations: Vec<InspectAnimation>,
}

fn inspect_json(pkg: &runtime::Package<'_>, verbose: bool) -> InspectDocument {
    let (sprites, animations) = if verbose {
        let sprites = (0..pkg.sprite_count())
            .map(|i| {
                let sprite = pkg.sprite_at(i).expect("index within sprite_count");
                InspectSprite {
                    id: sprite.id(pkg).to_string(),
                    frame_count: sprite.frames(pkg).len(),
                }
            })
            .collect();
        let animations = (0..pkg.animation_count())
            .map(|i| {
                let animation = pkg.animation_at(i).expect("index within animation_count");
                InspectAnimation {
                    id: animation.id(pkg).to_string(),
                    key_count: animation.keys(pkg).len(),
                }
            })
            .collect();
        (sprites, animations)
    } else {
        (Vec::new(), Vec::new())
    };

    InspectDocument {
        sprite_count: pkg.sprite_count(),
        animation_count: pkg.animation_count(),
        atlas_page_count: pkg.atlas_page_count(),
        sprites,
        animations,
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{}", usage());
        return ExitCode::from(1);
    }

    let (command, rest) = args.split_first().unwrap();
    let result = match command.as_str() {
        "validate" => run_validate(rest),
        "build" => run_build(rest),
        "inspect" => run_inspect(rest),
        other => Err(PackratError::new(Status::InvalidArgument, format!("unknown command '{other}'\n{}", usage()))),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            log::error!("{}", err.message);
            ExitCode::from(err.status.exit_code() as u8)
        }
    }
}
