//! Content revision lookup for contract freshness.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::project::Project;

/// Reports the content revision governing a directory.
pub trait RevisionSource: Send + Sync {
    /// `None` when no revision can be determined.
    fn current_revision(&self, dir: &Path) -> Option<String>;
}

/// Uses `git rev-parse HEAD` in the node directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitRevision;

impl RevisionSource for GitRevision {
    fn current_revision(&self, dir: &Path) -> Option<String> {
        let output = match Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!(event = "revision.git_unavailable", error = %e);
                return None;
            }
        };

        if !output.status.success() {
            debug!(
                event = "revision.not_a_repo",
                dir = %dir.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            );
            return None;
        }

        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!sha.is_empty()).then_some(sha)
    }
}

/// Git first, then the content revision the manifest recorded for the node
/// directory (a flake's locked revision or lock-file hash).
#[derive(Debug, Clone, Default)]
pub struct ProjectRevision {
    recorded: BTreeMap<PathBuf, String>,
}

impl ProjectRevision {
    pub fn from_project(project: &Project) -> Self {
        let recorded = project
            .nodes()
            .filter_map(|node| {
                let revision = node.content_revision.clone()?;
                let dir = project.node_dir(&node.name).ok()?;
                Some((dir, revision))
            })
            .collect();
        Self { recorded }
    }
}

impl RevisionSource for ProjectRevision {
    fn current_revision(&self, dir: &Path) -> Option<String> {
        GitRevision.current_revision(dir).or_else(|| {
            let recorded = self.recorded.get(dir).cloned();
            if recorded.is_some() {
                debug!(event = "revision.manifest_fallback", dir = %dir.display());
            }
            recorded
        })
    }
}

/// Fixed revision, for tests and manifests that pin one.
#[derive(Debug, Clone, Default)]
pub struct StaticRevision(pub Option<String>);

impl StaticRevision {
    pub fn new(revision: impl Into<String>) -> Self {
        Self(Some(revision.into()))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

impl RevisionSource for StaticRevision {
    fn current_revision(&self, _dir: &Path) -> Option<String> {
        self.0.clone()
    }
}
