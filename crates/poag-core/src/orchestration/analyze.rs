//! Request analysis: which nodes are relevant, and what each should do.

use std::collections::BTreeMap;
use std::path::Path;

use crate::agent::{NodeSummary, RelevanceClassifier, RelevanceRequest};
use crate::observer::OrchestrationEvent;
use crate::workspace::Workspace;

/// The project README is trimmed to this many characters of context.
pub const README_EXCERPT_CHARS: usize = 3000;

/// Relevant nodes, sorted, and their instructions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub relevant: Vec<String>,
    pub instructions: BTreeMap<String, String>,
}

/// Leading excerpt of the project README, or an empty string.
pub fn project_context(root: &Path) -> String {
    std::fs::read_to_string(root.join("README.md"))
        .map(|text| text.chars().take(README_EXCERPT_CHARS).collect())
        .unwrap_or_default()
}

/// One summary per node, drawn from its contracts when they are current.
pub fn node_summaries(ws: &Workspace) -> Vec<NodeSummary> {
    ws.project
        .nodes()
        .map(|node| {
            let summary = match ws.contracts(&node.name) {
                Ok(store) if store.are_contracts_current() => {
                    let contracts = store.all_contracts();
                    let mut parts = Vec::new();
                    if !contracts.inputs.is_empty() {
                        let deps: Vec<&str> =
                            contracts.inputs.keys().map(String::as_str).collect();
                        parts.push(format!("depends on: {}", deps.join(", ")));
                    }
                    if !contracts.outputs.is_empty() {
                        let deps: Vec<&str> =
                            contracts.outputs.keys().map(String::as_str).collect();
                        parts.push(format!("provides to: {}", deps.join(", ")));
                    }
                    if parts.is_empty() {
                        "no neighbor contracts".to_string()
                    } else {
                        parts.join("; ")
                    }
                }
                _ => "no contracts yet".to_string(),
            };
            NodeSummary {
                name: node.name.clone(),
                language: node.language.clone(),
                summary,
            }
        })
        .collect()
}

/// Ask the classifier which nodes the request concerns.
///
/// With no classifier, or when it fails, every non-root node is relevant
/// and receives the raw request. Names that are not project nodes are
/// dropped.
pub async fn analyze_request(
    ws: &Workspace,
    classifier: Option<&dyn RelevanceClassifier>,
    user_request: &str,
) -> Selection {
    let Some(classifier) = classifier else {
        return fallback(ws, user_request, "no relevance classifier configured".to_string());
    };

    let request = RelevanceRequest {
        project_context: project_context(ws.project.root()),
        nodes: node_summaries(ws),
        user_request: user_request.to_string(),
    };
    let answer = match classifier.classify(request).await {
        Ok(answer) => answer,
        Err(e) => return fallback(ws, user_request, e.to_string()),
    };

    let (instructions, unknown): (BTreeMap<_, _>, BTreeMap<_, _>) = answer
        .into_iter()
        .partition(|(name, _)| ws.project.contains(name));
    if !unknown.is_empty() {
        ws.report(OrchestrationEvent::UnknownNodesDropped {
            nodes: unknown.into_keys().collect(),
        });
    }

    let relevant: Vec<String> = instructions.keys().cloned().collect();
    ws.report(OrchestrationEvent::NodesSelected {
        nodes: relevant.clone(),
    });
    Selection {
        relevant,
        instructions,
    }
}

fn fallback(ws: &Workspace, user_request: &str, reason: String) -> Selection {
    ws.report(OrchestrationEvent::RelevanceFallback { reason });
    let relevant = ws.project.non_root_names();
    let instructions = relevant
        .iter()
        .map(|name| (name.clone(), user_request.to_string()))
        .collect();
    ws.report(OrchestrationEvent::NodesSelected {
        nodes: relevant.clone(),
    });
    Selection {
        relevant,
        instructions,
    }
}
