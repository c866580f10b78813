//! Error types for poag-flake

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while inspecting Nix flakes.
#[derive(Error, Debug)]
pub enum FlakeError {
    /// Nix command not found
    #[error("Nix is not installed or not in PATH")]
    NixNotFound,

    /// Nix command execution failed
    #[error("Nix command failed: {0}")]
    NixCommandFailed(String),

    /// No flake.nix at the project root
    #[error("no flake.nix found at {}", .0.display())]
    NotAFlake(PathBuf),

    /// Invalid flake.lock format
    #[error("Invalid flake.lock format: {0}")]
    InvalidFlakeLock(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FlakeError> for poag_core::PoagError {
    fn from(err: FlakeError) -> Self {
        poag_core::PoagError::InvalidManifest(err.to_string())
    }
}
