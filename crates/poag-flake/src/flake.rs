//! Nix flake metadata and `flake.lock` parsing
//!
//! Metadata comes from `nix flake metadata --json` when Nix is available and
//! from the lock file alone when it is not. The lock file also provides a
//! content revision for flakes that are not inside a git checkout.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::FlakeError;
use crate::Result;

pub const FLAKE_NIX: &str = "flake.nix";
pub const FLAKE_LOCK: &str = "flake.lock";

/// Metadata from a Nix Flake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakeMetadata {
    /// Flake description
    pub description: Option<String>,
    /// Last modified timestamp
    pub last_modified: Option<u64>,
    /// Locked inputs
    pub locks: Option<FlakeLocks>,
    /// Original flake URL
    pub original_url: Option<String>,
    /// Resolved URL
    pub resolved_url: Option<String>,
    /// Revision (if from git)
    pub revision: Option<String>,
}

impl FlakeMetadata {
    /// Input names declared by the flake itself.
    pub fn root_inputs(&self) -> Vec<String> {
        self.locks
            .as_ref()
            .map(FlakeLocks::root_inputs)
            .unwrap_or_default()
    }
}

/// Flake lock file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakeLocks {
    /// Lock file version
    pub version: u32,
    /// Root node name
    pub root: String,
    /// Nodes in the lock file
    pub nodes: BTreeMap<String, FlakeLockNode>,
}

impl FlakeLocks {
    /// Input names of the lock's root node, sorted.
    pub fn root_inputs(&self) -> Vec<String> {
        self.nodes
            .get(&self.root)
            .and_then(|node| node.inputs.as_ref())
            .map(|inputs| inputs.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// A node in the flake.lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlakeLockNode {
    /// Input name to lock node name (or follows path)
    pub inputs: Option<BTreeMap<String, serde_json::Value>>,
    /// Locked reference
    pub locked: Option<LockedRef>,
    /// Original reference
    pub original: Option<serde_json::Value>,
}

/// A locked reference in flake.lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedRef {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub rev: Option<String>,
    /// Reference type (github, git, path, etc.)
    #[serde(rename = "type")]
    pub ref_type: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "narHash")]
    pub nar_hash: Option<String>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<u64>,
}

/// Run `nix flake metadata --json` in `flake_path`.
pub fn get_flake_metadata(flake_path: &Path) -> Result<FlakeMetadata> {
    let output = Command::new("nix")
        .args(["flake", "metadata", "--json", "--no-update-lock-file"])
        .current_dir(flake_path)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => FlakeError::NixNotFound,
            _ => FlakeError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FlakeError::NixCommandFailed(stderr.trim().to_string()));
    }

    let metadata: FlakeMetadata = serde_json::from_slice(&output.stdout)?;
    Ok(metadata)
}

/// Parse `flake.lock` in `flake_path`. `Ok(None)` when there is none.
pub fn read_flake_lock(flake_path: &Path) -> Result<Option<FlakeLocks>> {
    let lock_path = flake_path.join(FLAKE_LOCK);
    let content = match std::fs::read(&lock_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let locks = serde_json::from_slice(&content)
        .map_err(|e| FlakeError::InvalidFlakeLock(format!("{}: {e}", lock_path.display())))?;
    Ok(Some(locks))
}

/// SHA-256 of the normalized lock file.
///
/// The lock is parsed and re-serialized first so formatting differences do
/// not change the hash.
pub fn hash_flake_lock(locks: &FlakeLocks) -> Result<String> {
    let normalized = serde_json::to_vec(locks)?;
    let mut hasher = Sha256::new();
    hasher.update(&normalized);
    Ok(hex::encode(hasher.finalize()))
}

/// Where flake metadata comes from.
pub trait MetadataSource: Send + Sync {
    fn metadata(&self, flake_path: &Path) -> Result<FlakeMetadata>;
}

/// Asks Nix, and falls back to the lock file when Nix is missing or fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixMetadata;

impl MetadataSource for NixMetadata {
    fn metadata(&self, flake_path: &Path) -> Result<FlakeMetadata> {
        match get_flake_metadata(flake_path) {
            Ok(metadata) => Ok(metadata),
            Err(FlakeError::NixNotFound) => {
                debug!(event = "flake.nix_missing", path = %flake_path.display());
                LockFileMetadata.metadata(flake_path)
            }
            Err(e) => {
                warn!(
                    event = "flake.metadata_failed",
                    path = %flake_path.display(),
                    error = %e,
                    "falling back to flake.lock"
                );
                LockFileMetadata.metadata(flake_path)
            }
        }
    }
}

/// Reads `flake.lock` only. No description, no git revision.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockFileMetadata;

impl MetadataSource for LockFileMetadata {
    fn metadata(&self, flake_path: &Path) -> Result<FlakeMetadata> {
        Ok(FlakeMetadata {
            locks: read_flake_lock(flake_path)?,
            ..FlakeMetadata::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LOCK: &str = r#"{
        "version": 7,
        "root": "root",
        "nodes": {
            "root": {
                "inputs": { "nixpkgs": "nixpkgs", "hello-rs": "hello-rs" }
            },
            "hello-rs": {
                "locked": { "type": "path", "path": "./hello-rs", "lastModified": 1 }
            },
            "nixpkgs": {
                "locked": {
                    "type": "github",
                    "owner": "NixOS",
                    "repo": "nixpkgs",
                    "rev": "abc123"
                }
            }
        }
    }"#;

    #[test]
    fn root_inputs_are_sorted_names() {
        let locks: FlakeLocks = serde_json::from_str(LOCK).unwrap();
        assert_eq!(locks.root_inputs(), vec!["hello-rs", "nixpkgs"]);
    }

    #[test]
    fn metadata_parses_nix_output_shape() {
        let raw = format!(
            r#"{{"description":"hello","lastModified":5,"revision":"deadbeef",
                "originalUrl":"path:.","resolvedUrl":"path:.","locks":{LOCK}}}"#
        );
        let metadata: FlakeMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(metadata.description.as_deref(), Some("hello"));
        assert_eq!(metadata.revision.as_deref(), Some("deadbeef"));
        assert_eq!(metadata.original_url.as_deref(), Some("path:."));
        assert_eq!(metadata.root_inputs(), vec!["hello-rs", "nixpkgs"]);
    }

    #[test]
    fn missing_lock_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_flake_lock(dir.path()).unwrap().is_none());
    }

    #[test]
    fn corrupt_lock_is_invalid() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(FLAKE_LOCK), "{ nope").unwrap();
        let err = read_flake_lock(dir.path()).unwrap_err();
        assert!(matches!(err, FlakeError::InvalidFlakeLock(_)));
    }

    #[test]
    fn lock_hash_ignores_formatting() {
        let pretty: FlakeLocks = serde_json::from_str(LOCK).unwrap();
        let compact_raw = serde_json::to_string(&pretty).unwrap();
        let compact: FlakeLocks = serde_json::from_str(&compact_raw).unwrap();
        let hash = hash_flake_lock(&pretty).unwrap();
        assert_eq!(hash, hash_flake_lock(&compact).unwrap());
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn changing_flake_input_changes_hash() {
        let v1: FlakeLocks = serde_json::from_str(
            r#"{"version": 7, "root": "root", "nodes": {"root": {"inputs": {}}, "nixpkgs": {"locked": {"rev": "v1"}}}}"#,
        )
        .unwrap();
        let v2: FlakeLocks = serde_json::from_str(
            r#"{"version": 7, "root": "root", "nodes": {"root": {"inputs": {}}, "nixpkgs": {"locked": {"rev": "v2"}}}}"#,
        )
        .unwrap();
        assert_ne!(hash_flake_lock(&v1).unwrap(), hash_flake_lock(&v2).unwrap());
    }

    #[test]
    fn lock_file_source_reads_inputs_only() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(FLAKE_LOCK), LOCK).unwrap();
        let metadata = LockFileMetadata.metadata(dir.path()).unwrap();
        assert!(metadata.description.is_none());
        assert!(metadata.revision.is_none());
        assert_eq!(metadata.root_inputs(), vec!["hello-rs", "nixpkgs"]);
    }
}
