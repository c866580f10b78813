//! Merge per-node results into the final response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::state::RootState;

/// Fixed follow-up checklist attached to every successful run.
pub const NEXT_STEPS: [&str; 5] = [
    "Review the plan for each affected component",
    "Run the tests each plan names before changing code; they should fail",
    "Implement the changes described in each plan",
    "Re-run each component's tests and confirm they pass",
    "Run `nix flake check` from the project root to verify integration",
];

const NO_PLANS: &str = "No plans generated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub request: String,
    pub plans: BTreeMap<String, String>,
    pub analyzed_nodes: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error: String,
    pub queried_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsolidatedOutput {
    Plan(PlanReport),
    Error(ErrorReport),
}

impl ConsolidatedOutput {
    pub fn is_error(&self) -> bool {
        matches!(self, ConsolidatedOutput::Error(_))
    }
}

pub fn consolidate(state: &RootState) -> ConsolidatedOutput {
    if state.collected_results.is_empty() {
        return ConsolidatedOutput::Error(ErrorReport {
            error: NO_PLANS.to_string(),
            queried_nodes: state.relevant_nodes.clone(),
        });
    }

    ConsolidatedOutput::Plan(PlanReport {
        request: state.user_request.clone(),
        plans: state.collected_results.clone(),
        analyzed_nodes: state.collected_results.keys().cloned().collect(),
        next_steps: NEXT_STEPS.iter().map(|s| s.to_string()).collect(),
    })
}
