//! Language detection by marker file.

use std::path::Path;

use poag_core::node::UNKNOWN_LANGUAGE;
use tracing::debug;

pub const RUST: &str = "rust";
pub const WASM: &str = "wasm";
pub const PYTHON: &str = "python";
pub const WEB: &str = "web";

/// Primary language of the component in `dir`.
///
/// `Cargo.toml` means rust, or wasm when the crate builds a `cdylib` and
/// depends on `wasm-bindgen`. Then `pyproject.toml` (python) and
/// `package.json` (web).
pub fn detect_language(dir: &Path) -> String {
    let cargo = dir.join("Cargo.toml");
    if cargo.is_file() {
        return if targets_wasm(&cargo) { WASM } else { RUST }.to_string();
    }
    if dir.join("pyproject.toml").is_file() {
        return PYTHON.to_string();
    }
    if dir.join("package.json").is_file() {
        return WEB.to_string();
    }
    UNKNOWN_LANGUAGE.to_string()
}

fn targets_wasm(cargo_toml: &Path) -> bool {
    let manifest = match std::fs::read_to_string(cargo_toml)
        .map_err(|e| e.to_string())
        .and_then(|raw| raw.parse::<toml::Table>().map_err(|e| e.to_string()))
    {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!(event = "language.cargo_unreadable", path = %cargo_toml.display(), error = %e);
            return false;
        }
    };

    let cdylib = manifest
        .get("lib")
        .and_then(|lib| lib.get("crate-type"))
        .and_then(|types| types.as_array())
        .is_some_and(|types| types.iter().any(|t| t.as_str() == Some("cdylib")));
    let bindgen = manifest
        .get("dependencies")
        .and_then(|deps| deps.as_table())
        .is_some_and(|deps| deps.contains_key("wasm-bindgen"));
    cdylib && bindgen
}
