//! Shared handles to one project and the stores that describe it.

use std::path::Path;
use std::sync::Arc;

use crate::checkpoint::{thread_id, CheckpointStore};
use crate::contracts::ContractStore;
use crate::error::Result;
use crate::observer::{OrchestrationEvent, Reporter};
use crate::project::Project;
use crate::revision::RevisionSource;
use crate::session::SessionStore;

/// Everything a phase needs to read or write per-node state. Cheap to clone.
#[derive(Clone)]
pub struct Workspace {
    pub project: Arc<Project>,
    pub checkpoints: CheckpointStore,
    pub sessions: SessionStore,
    pub revisions: Arc<dyn RevisionSource>,
    pub reporter: Arc<dyn Reporter>,
}

impl Workspace {
    /// Workspace whose checkpoints and sessions live under `state_dir`.
    pub fn new(
        project: Project,
        state_dir: &Path,
        revisions: Arc<dyn RevisionSource>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            project: Arc::new(project),
            checkpoints: CheckpointStore::new(state_dir),
            sessions: SessionStore::new(state_dir),
            revisions,
            reporter,
        }
    }

    /// Contract store of `node`.
    pub fn contracts(&self, node: &str) -> Result<ContractStore> {
        Ok(ContractStore::new(
            self.project.node_dir(node)?,
            Arc::clone(&self.revisions),
        ))
    }

    pub fn thread_id(&self, node: &str) -> String {
        thread_id(&self.project.key(), node)
    }

    pub fn is_initialized(&self, node: &str) -> bool {
        self.checkpoints.is_initialized(&self.project.key(), node)
    }

    pub fn mark_initialized(&self, node: &str) -> Result<()> {
        self.checkpoints.mark_initialized(&self.project.key(), node)
    }

    pub fn report(&self, event: OrchestrationEvent) {
        self.reporter.report(&event);
    }
}
