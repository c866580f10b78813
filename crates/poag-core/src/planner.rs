//! Per-node planning step run during fan-out.
//!
//! Never fails: every problem becomes an `Error: ...` string so one node's
//! trouble cannot sink the run.

use chrono::Utc;
use tracing::warn;

use crate::agent::{AgentRequest, AgentRunner};
use crate::error::PoagError;
use crate::observer::OrchestrationEvent;
use crate::prompts::planning_prompt;
use crate::session::SessionRecord;
use crate::workspace::Workspace;

/// Ask `node`'s agent for a plan. Returns the plan text or an `Error: ...`
/// string.
pub async fn plan_node(
    ws: &Workspace,
    agent: &dyn AgentRunner,
    node: &str,
    instruction: &str,
) -> String {
    ws.report(OrchestrationEvent::PlanningStarted {
        node: node.to_string(),
    });
    let result = run_planning(ws, agent, node, instruction).await;
    ws.report(OrchestrationEvent::PlanningFinished {
        node: node.to_string(),
        succeeded: result.is_ok(),
    });
    result.unwrap_or_else(|e| format!("Error: {e}"))
}

async fn run_planning(
    ws: &Workspace,
    agent: &dyn AgentRunner,
    node: &str,
    instruction: &str,
) -> Result<String, String> {
    if !ws.is_initialized(node) {
        let err = PoagError::NotInitialized {
            node: node.to_string(),
        };
        return Err(format!("{err}. Run initialization first."));
    }

    let info = ws.project.node(node).map_err(|e| e.to_string())?;
    let contracts = ws.contracts(node).map_err(|e| e.to_string())?.all_contracts();
    let thread_id = ws.thread_id(node);
    let session = ws.sessions.load(&thread_id);

    let request = AgentRequest {
        node: node.to_string(),
        workdir: ws.project.node_dir(node).map_err(|e| e.to_string())?,
        prompt: planning_prompt(info, instruction, &contracts),
        resume_session: session.as_ref().and_then(|s| s.session_id.clone()),
    };
    let response = agent.run(request).await.map_err(|e| e.to_string())?;

    if let Some(new_id) = response.session_id {
        let known = session.as_ref().and_then(|s| s.session_id.as_deref());
        if known != Some(new_id.as_str()) {
            let record = SessionRecord {
                thread_id,
                node: node.to_string(),
                session_id: Some(new_id),
                self_summary: session.map(|s| s.self_summary).unwrap_or_default(),
                updated_at: Utc::now(),
            };
            if let Err(e) = ws.sessions.save(&record) {
                warn!(event = "session.save_failed", node = %node, error = %e);
            }
        }
    }

    Ok(response.result)
}
