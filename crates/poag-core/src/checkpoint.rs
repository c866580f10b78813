//! Durable record of which `(project, node)` pairs finished one-time
//! initialization.
//!
//! Layout: `<state>/checkpoints/metadata.json`, a flat JSON object keyed by
//! thread identity (`"<project>:<node>"`). The whole mapping is rewritten
//! atomically on every mutation; callers serialize mutations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{PoagError, Result};
use crate::persist::write_atomic;

const CHECKPOINT_DIR: &str = "checkpoints";
const METADATA_FILE: &str = "metadata.json";

/// Stable handle for a node's long-lived agent session.
pub fn thread_id(project: &str, node: &str) -> String {
    format!("{project}:{node}")
}

/// Node name of `key` when it belongs to exactly `project`. Project paths
/// may contain `:`, node names may not.
fn node_of<'a>(key: &'a str, project: &str) -> Option<&'a str> {
    key.rsplit_once(':')
        .filter(|(owner, _)| *owner == project)
        .map(|(_, node)| node)
}

/// JSON-file checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at the given state directory.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir
                .as_ref()
                .join(CHECKPOINT_DIR)
                .join(METADATA_FILE),
        }
    }

    /// Directory holding the mapping and session files.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn is_initialized(&self, project: &str, node: &str) -> bool {
        self.load()
            .get(&thread_id(project, node))
            .copied()
            .unwrap_or(false)
    }

    /// Record `node` as initialized. Idempotent.
    pub fn mark_initialized(&self, project: &str, node: &str) -> Result<()> {
        let mut mapping = self.load();
        mapping.insert(thread_id(project, node), true);
        self.save(&mapping)
    }

    /// Remove the entry for `node`, or every entry of `project` when `node`
    /// is `None`. Returns the node names that were cleared.
    pub fn clear(&self, project: &str, node: Option<&str>) -> Result<Vec<String>> {
        let mut mapping = self.load();
        let cleared: Vec<String> = match node {
            Some(node) => mapping
                .remove(&thread_id(project, node))
                .map(|_| vec![node.to_string()])
                .unwrap_or_default(),
            None => {
                let nodes: Vec<String> = mapping
                    .keys()
                    .filter_map(|k| node_of(k, project))
                    .map(str::to_string)
                    .collect();
                for node in &nodes {
                    mapping.remove(&thread_id(project, node));
                }
                nodes
            }
        };

        if !cleared.is_empty() {
            self.save(&mapping)?;
        }
        Ok(cleared)
    }

    /// Initialized node names for `project`, sorted.
    pub fn initialized_nodes(&self, project: &str) -> Vec<String> {
        self.load()
            .into_iter()
            .filter(|(_, done)| *done)
            .filter_map(|(k, _)| node_of(&k, project).map(str::to_string))
            .collect()
    }

    fn load(&self) -> BTreeMap<String, bool> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(event = "checkpoint.unreadable", path = %self.path.display(), error = %e);
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(event = "checkpoint.corrupt", path = %self.path.display(), error = %e);
            BTreeMap::new()
        })
    }

    fn save(&self, mapping: &BTreeMap<String, bool>) -> Result<()> {
        let json = serde_json::to_vec_pretty(mapping)?;
        write_atomic(&self.path, &json).map_err(|e| {
            PoagError::Checkpoint(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn thread_id_joins_project_and_node() {
        assert_eq!(thread_id("/p", "svc"), "/p:svc");
    }

    #[test]
    fn mark_is_idempotent() {
        let (_dir, store) = make_store();
        assert!(!store.is_initialized("/p", "svc"));
        store.mark_initialized("/p", "svc").unwrap();
        store.mark_initialized("/p", "svc").unwrap();
        assert!(store.is_initialized("/p", "svc"));
        assert_eq!(store.initialized_nodes("/p"), vec!["svc"]);
    }

    #[test]
    fn clearing_one_node_leaves_others() {
        let (_dir, store) = make_store();
        store.mark_initialized("/p", "a").unwrap();
        store.mark_initialized("/p", "b").unwrap();
        assert_eq!(store.clear("/p", Some("a")).unwrap(), vec!["a"]);
        assert!(!store.is_initialized("/p", "a"));
        assert!(store.is_initialized("/p", "b"));
        assert!(store.clear("/p", Some("a")).unwrap().is_empty());
    }

    #[test]
    fn clearing_project_leaves_other_projects() {
        let (_dir, store) = make_store();
        store.mark_initialized("/p", "a").unwrap();
        store.mark_initialized("/p", "b").unwrap();
        store.mark_initialized("/q", "a").unwrap();
        assert_eq!(store.clear("/p", None).unwrap(), vec!["a", "b"]);
        assert!(store.initialized_nodes("/p").is_empty());
        assert!(store.is_initialized("/q", "a"));
    }

    #[test]
    fn clearing_project_spares_projects_sharing_its_prefix() {
        let (_dir, store) = make_store();
        store.mark_initialized("/a", "svc").unwrap();
        store.mark_initialized("/a:b", "lib").unwrap();
        assert_eq!(store.initialized_nodes("/a"), vec!["svc"]);
        assert_eq!(store.clear("/a", None).unwrap(), vec!["svc"]);
        assert!(store.is_initialized("/a:b", "lib"));
        assert_eq!(store.initialized_nodes("/a:b"), vec!["lib"]);
    }

    #[test]
    fn corrupt_mapping_reads_as_empty() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join(METADATA_FILE), "{not json").unwrap();
        assert!(!store.is_initialized("/p", "a"));
        store.mark_initialized("/p", "a").unwrap();
        assert!(store.is_initialized("/p", "a"));
    }

    #[test]
    fn unwritable_location_is_checkpoint_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "a file, not a directory").unwrap();
        let store = CheckpointStore::new(&blocker);
        let err = store.mark_initialized("/p", "a").unwrap_err();
        assert!(matches!(err, PoagError::Checkpoint(_)));
    }
}
