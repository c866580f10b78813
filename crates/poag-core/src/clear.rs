//! Reset initialization so the next run explores again.

use tracing::info;

use crate::error::Result;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Nodes whose checkpoint entry was removed.
    pub checkpoints: Vec<String>,
    /// Nodes whose `.contracts` directory was removed.
    pub contracts: Vec<String>,
    /// Nodes whose session record was removed.
    pub sessions: Vec<String>,
}

/// Clear one node, or every node of the project when `node` is `None`.
///
/// Removes the checkpoint entry, the session record and the `.contracts`
/// directory. Other nodes are untouched.
pub fn clear(ws: &Workspace, node: Option<&str>) -> Result<ClearReport> {
    let project_key = ws.project.key();
    let targets: Vec<String> = match node {
        Some(name) => {
            ws.project.node(name)?;
            vec![name.to_string()]
        }
        None => ws.project.nodes().map(|n| n.name.clone()).collect(),
    };

    let mut report = ClearReport {
        checkpoints: ws.checkpoints.clear(&project_key, node)?,
        ..ClearReport::default()
    };
    for name in &targets {
        if ws.sessions.delete(&ws.thread_id(name))? {
            report.sessions.push(name.clone());
        }
        if ws.contracts(name)?.clear()? {
            report.contracts.push(name.clone());
        }
    }

    info!(
        event = "clear.done",
        checkpoints = report.checkpoints.len(),
        contracts = report.contracts.len(),
        sessions = report.sessions.len(),
    );
    Ok(report)
}
