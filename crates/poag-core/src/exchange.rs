//! Phase 2: answer each dependent's input contract with an output contract.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::agent::{AgentRequest, AgentRunner};
use crate::contracts::{contract_digest, OutputSource, UNKNOWN_REVISION};
use crate::error::Result;
use crate::observer::{ExchangeSkip, OrchestrationEvent};
use crate::prompts::provider_contract_prompt;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Nothing consumes this node; the index was not touched.
    NoDependents,
    /// Every present input contract is already answered at this revision.
    UpToDate { gaps: Vec<String> },
    Generated {
        written: Vec<String>,
        /// Dependents that have no input contract about this node.
        gaps: Vec<String>,
        /// `(dependent, error)` for agent or write failures.
        failures: Vec<(String, String)>,
    },
}

/// Run Phase 2 for `node` as provider.
///
/// Gaps and per-dependent agent failures are reported, not returned as
/// errors. Only a failure to rewrite the index is an `Err`.
#[instrument(skip(ws, agent))]
pub async fn exchange_contracts(
    ws: &Workspace,
    agent: &dyn AgentRunner,
    node: &str,
) -> Result<ExchangeOutcome> {
    let dependents = ws.project.graph().all_dependents(node);
    if dependents.is_empty() {
        ws.report(OrchestrationEvent::ExchangeSkipped {
            node: node.to_string(),
            reason: ExchangeSkip::NoDependents,
        });
        return Ok(ExchangeOutcome::NoDependents);
    }

    let mut needs = Vec::new();
    let mut gaps = Vec::new();
    for dependent in &dependents {
        match ws.contracts(dependent)?.read_input_contract(node) {
            Some(text) => needs.push((dependent.clone(), text)),
            None => {
                ws.report(OrchestrationEvent::ContractGap {
                    provider: node.to_string(),
                    dependent: dependent.clone(),
                });
                gaps.push(dependent.clone());
            }
        }
    }

    let store = ws.contracts(node)?;
    if store.outputs_answer(&needs) {
        ws.report(OrchestrationEvent::ExchangeSkipped {
            node: node.to_string(),
            reason: ExchangeSkip::UpToDate,
        });
        return Ok(ExchangeOutcome::UpToDate { gaps });
    }

    let workdir = ws.project.node_dir(node)?;
    let revision = store
        .current_revision()
        .unwrap_or_else(|| UNKNOWN_REVISION.to_string());
    let mut written = Vec::new();
    let mut sources = BTreeMap::new();
    let mut failures = Vec::new();

    for (dependent, their_needs) in &needs {
        let request = AgentRequest {
            node: node.to_string(),
            workdir: workdir.clone(),
            prompt: provider_contract_prompt(node, dependent, their_needs),
            resume_session: None,
        };
        let outcome = match agent.run(request).await {
            Ok(response) => store
                .write_output_contract(dependent, &response.result)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match outcome {
            Ok(_) => {
                ws.report(OrchestrationEvent::OutputContractWritten {
                    provider: node.to_string(),
                    dependent: dependent.clone(),
                });
                sources.insert(
                    dependent.clone(),
                    OutputSource {
                        revision: revision.clone(),
                        digest: contract_digest(their_needs),
                    },
                );
                written.push(dependent.clone());
            }
            Err(error) => {
                ws.report(OrchestrationEvent::ExchangeFailed {
                    provider: node.to_string(),
                    dependent: dependent.clone(),
                    error: error.clone(),
                });
                failures.push((dependent.clone(), error));
            }
        }
    }

    if !written.is_empty() {
        store.record_outputs(&written, sources)?;
    }

    Ok(ExchangeOutcome::Generated {
        written,
        gaps,
        failures,
    })
}
