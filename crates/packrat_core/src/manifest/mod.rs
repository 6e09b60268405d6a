//! L1 + L2 — manifest loading: read, parse, and semantically validate.

pub mod model;
pub mod parser;
pub mod validator;

pub use model::Manifest;

use crate::diagnostics::{codes, DiagCounter, Diagnostic, PackratError, Status};
use std::fs;

/// Reads, parses, and validates a manifest file at `path`. Diagnostics for
/// every stage are forwarded through `diag`. Returns the fully validated
/// [`Manifest`] on success, or a [`PackratError`] carrying the appropriate
/// [`Status`] (`IoError` for unreadable files, `ParseError` for grammar
/// violations, `ValidationError` for semantic failures) on failure —
/// mirrors `pr_manifest_load_and_validate`.
pub fn load_and_validate(path: &str, diag: &mut DiagCounter) -> Result<Manifest, PackratError> {
    let text = fs::read_to_string(path).map_err(|err| {
        diag.emit(
            Diagnostic::error(codes::MANIFEST_READ_FAILED, format!("failed to read manifest '{path}': {err}"))
                .with_file(path),
        );
        PackratError::new(Status::IoError, format!("failed to read manifest '{path}': {err}"))
    })?;

    if text.trim().is_empty() {
        diag.emit(Diagnostic::error(codes::MANIFEST_EMPTY, "manifest file is empty.").with_file(path));
        return Err(PackratError::new(Status::ParseError, format!("manifest '{path}' is empty")));
    }

    let mut manifest = Manifest::default();
    if !parser::parse_text(path, &text, diag, &mut manifest) {
        return Err(PackratError::new(
            Status::ParseError,
            format!("manifest '{path}' failed to parse ({} error(s))", diag.error_count),
        ));
    }
    log::trace!("manifest '{path}' parsed");

    if !validator::validate(path, &manifest, diag) {
        return Err(PackratError::new(
            Status::ValidationError,
            format!("manifest '{path}' failed validation ({} error(s))", diag.error_count),
        ));
    }
    log::debug!("manifest '{path}' validated ({} warning(s))", diag.warning_count);

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_manifest_path(label: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("packrat_manifest_{label}_{}_{}.toml", std::process::id(), nanos))
    }

    #[test]
    fn loads_valid_manifest_from_disk() {
        let path = temp_manifest_path("valid");
        {
            let mut file = fs::File::create(&path).unwrap();
            writeln!(
                file,
                "schema_version = 1\npackage_name = \"demo\"\noutput = \"out/demo.prpk\"\n\n[[images]]\nid = \"sheet\"\npath = \"sheet.png\"\n\n[[sprites]]\nid = \"hero\"\nsource = \"sheet\"\nmode = \"single\"\nw = 32\nh = 32\n"
            )
            .unwrap();
        }

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = load_and_validate(path.to_str().unwrap(), &mut counter);
        fs::remove_file(&path).ok();

        let manifest = result.expect("manifest should load");
        assert_eq!(manifest.package_name.as_deref(), Some("demo"));
        assert_eq!(manifest.sprites.len(), 1);
    }

    #[test]
    fn reports_io_error_for_missing_file() {
        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = load_and_validate("/nonexistent/packrat_test_manifest.toml", &mut counter);
        let err = result.expect_err("missing file should fail");
        assert_eq!(err.status, Status::IoError);
    }

    #[test]
    fn reports_parse_error_for_empty_file() {
        let path = temp_manifest_path("empty");
        fs::File::create(&path).unwrap();

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = load_and_validate(path.to_str().unwrap(), &mut counter);
        fs::remove_file(&path).ok();

        let err = result.expect_err("empty manifest should fail");
        assert_eq!(err.status, Status::ParseError);
    }

    #[test]
    fn reports_validation_error_for_missing_required_fields() {
        let path = temp_manifest_path("invalid");
        {
            let mut file = fs::File::create(&path).unwrap();
            writeln!(file, "package_name = \"demo\"\n").unwrap();
        }

        let mut sink = |_d: Diagnostic| {};
        let mut counter = DiagCounter::new(&mut sink);
        let result = load_and_validate(path.to_str().unwrap(), &mut counter);
        fs::remove_file(&path).ok();

        let err = result.expect_err("missing schema_version/output should fail validation");
        assert_eq!(err.status, Status::ValidationError);
    }
}
