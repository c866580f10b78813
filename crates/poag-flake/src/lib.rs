//! POAG Flake: Nix sub-flake discovery for POAG
//!
//! Scans a flake project for sub-flakes and resolves them into the manifest
//! that `poag-core` builds its dependency graph from. Metadata comes from
//! `nix flake metadata` when Nix is installed, otherwise from `flake.lock`.

pub mod discover;
pub mod error;
pub mod flake;
pub mod language;

pub use discover::{discover, find_subflakes};
pub use error::FlakeError;
pub use flake::{
    get_flake_metadata, hash_flake_lock, read_flake_lock, FlakeLockNode, FlakeLocks,
    FlakeMetadata, LockFileMetadata, LockedRef, MetadataSource, NixMetadata, FLAKE_LOCK, FLAKE_NIX,
};
pub use language::detect_language;

/// Result type for flake operations
pub type Result<T> = std::result::Result<T, FlakeError>;
