//! Root workflow state and the fan-in reducers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::consolidate::ConsolidatedOutput;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootState {
    pub user_request: String,
    pub relevant_nodes: Vec<String>,
    pub per_node_instruction: BTreeMap<String, String>,
    /// Append-only; merged by concatenation.
    pub queried_nodes: Vec<String>,
    /// Merged by union.
    pub collected_results: BTreeMap<String, String>,
    pub consolidated_output: Option<ConsolidatedOutput>,
}

impl RootState {
    pub fn new(user_request: impl Into<String>) -> Self {
        Self {
            user_request: user_request.into(),
            ..Self::default()
        }
    }

    /// Instruction for `node`, falling back to the raw request.
    pub fn instruction_for(&self, node: &str) -> String {
        self.per_node_instruction
            .get(node)
            .cloned()
            .unwrap_or_else(|| self.user_request.clone())
    }

    /// Fold one branch's update into the state.
    pub fn apply(&mut self, update: BranchUpdate) {
        self.queried_nodes = reduce_queried(
            std::mem::take(&mut self.queried_nodes),
            update.queried_nodes,
        );
        self.collected_results = reduce_results(
            std::mem::take(&mut self.collected_results),
            update.collected_results,
        );
    }
}

/// What one fan-out branch contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchUpdate {
    pub queried_nodes: Vec<String>,
    pub collected_results: BTreeMap<String, String>,
}

impl BranchUpdate {
    pub fn single(node: impl Into<String>, result: impl Into<String>) -> Self {
        let node = node.into();
        Self {
            queried_nodes: vec![node.clone()],
            collected_results: BTreeMap::from([(node, result.into())]),
        }
    }
}

pub fn reduce_queried(mut acc: Vec<String>, update: Vec<String>) -> Vec<String> {
    acc.extend(update);
    acc
}

/// Union of two result maps. Branches write disjoint keys; on a clash the
/// update wins.
pub fn reduce_results(
    mut acc: BTreeMap<String, String>,
    update: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    acc.extend(update);
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_order_does_not_change_the_merge() {
        let a = BranchUpdate::single("lib", "plan A");
        let b = BranchUpdate::single("svc", "plan B");

        let mut ab = RootState::new("req");
        ab.apply(a.clone());
        ab.apply(b.clone());

        let mut ba = RootState::new("req");
        ba.apply(b);
        ba.apply(a);

        assert_eq!(ab.collected_results, ba.collected_results);
        let mut q1 = ab.queried_nodes.clone();
        let mut q2 = ba.queried_nodes.clone();
        q1.sort();
        q2.sort();
        assert_eq!(q1, q2);
        assert_eq!(ab.queried_nodes.len(), 2);
    }

    #[test]
    fn queried_nodes_concatenate() {
        assert_eq!(
            reduce_queried(vec!["a".into()], vec!["b".into(), "a".into()]),
            vec!["a", "b", "a"]
        );
    }

    #[test]
    fn instruction_falls_back_to_request() {
        let mut state = RootState::new("do it");
        state
            .per_node_instruction
            .insert("svc".into(), "svc specific".into());
        assert_eq!(state.instruction_for("svc"), "svc specific");
        assert_eq!(state.instruction_for("lib"), "do it");
    }

    #[test]
    fn state_serializes_camel_case() {
        let value = serde_json::to_value(RootState::new("x")).unwrap();
        assert!(value.get("userRequest").is_some());
        assert!(value.get("collectedResults").is_some());
    }
}
