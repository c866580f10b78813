//! Phase 1: one-time exploration of a node.
//!
//! Gated by the checkpoint. A checkpointed node is explored again once its
//! revision moves away from the one its index was recorded at; a node whose
//! contracts are already current is marked initialized without calling the
//! agent. On agent failure nothing on disk changes, so the next run retries.

use chrono::Utc;
use tracing::instrument;

use crate::agent::{ExplorationRequest, ExplorationRunner};
use crate::error::Result;
use crate::observer::{InitSkip, OrchestrationEvent};
use crate::session::SessionRecord;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    AlreadyInitialized,
    ContractsCurrent,
    Initialized { input_contracts: Vec<String> },
    Failed { error: String },
}

impl InitOutcome {
    /// True when the node ends up initialized.
    pub fn is_ready(&self) -> bool {
        !matches!(self, InitOutcome::Failed { .. })
    }
}

/// Run Phase 1 for `node`.
///
/// Only an unwritable checkpoint or session store is an `Err`; agent and
/// contract-file failures come back as [`InitOutcome::Failed`].
#[instrument(skip(ws, explorer))]
pub async fn initialize_node(
    ws: &Workspace,
    explorer: &dyn ExplorationRunner,
    node: &str,
) -> Result<InitOutcome> {
    let store = ws.contracts(node)?;
    if ws.is_initialized(node) {
        // Without a revision there is nothing to compare against; trust the
        // checkpoint.
        let stale = match store.current_revision() {
            Some(_) => store.check_current().err(),
            None => None,
        };
        let Some(stale) = stale else {
            ws.report(OrchestrationEvent::InitSkipped {
                node: node.to_string(),
                reason: InitSkip::AlreadyInitialized,
            });
            return Ok(InitOutcome::AlreadyInitialized);
        };
        ws.report(OrchestrationEvent::InitStale {
            node: node.to_string(),
            reason: stale.to_string(),
        });
    } else if store.are_contracts_current() {
        ws.mark_initialized(node)?;
        ws.report(OrchestrationEvent::InitSkipped {
            node: node.to_string(),
            reason: InitSkip::ContractsCurrent,
        });
        return Ok(InitOutcome::ContractsCurrent);
    }

    let info = ws.project.node(node)?;
    let graph = ws.project.graph();
    let dependencies = graph.direct_dependencies(node);
    let request = ExplorationRequest {
        node: node.to_string(),
        workdir: ws.project.node_dir(node)?,
        language: info.language.clone(),
        description: info.description.clone(),
        dependencies: dependencies.clone(),
        dependents: graph.all_dependents(node),
    };

    let report = match explorer.explore(request).await {
        Ok(report) => report,
        Err(e) => return Ok(failed(ws, node, e.to_string())),
    };

    let mut written = Vec::new();
    for (dep, text) in &report.dependency_sections {
        if !dependencies.contains(dep) {
            ws.report(OrchestrationEvent::ExtraSectionIgnored {
                node: node.to_string(),
                section: dep.clone(),
            });
            continue;
        }
        if let Err(e) = store.write_input_contract(dep, text) {
            return Ok(failed(ws, node, e.to_string()));
        }
        written.push(dep.clone());
    }
    if let Err(e) = store.record_inputs(&written) {
        return Ok(failed(ws, node, e.to_string()));
    }

    ws.sessions.save(&SessionRecord {
        thread_id: ws.thread_id(node),
        node: node.to_string(),
        session_id: report.session_id,
        self_summary: report.self_summary,
        updated_at: Utc::now(),
    })?;
    ws.mark_initialized(node)?;

    ws.report(OrchestrationEvent::InitCompleted {
        node: node.to_string(),
        input_contracts: written.len(),
    });
    Ok(InitOutcome::Initialized {
        input_contracts: written,
    })
}

fn failed(ws: &Workspace, node: &str, error: String) -> InitOutcome {
    ws.report(OrchestrationEvent::InitFailed {
        node: node.to_string(),
        error: error.clone(),
    });
    InitOutcome::Failed { error }
}
