//! The root workflow state machine.
//!
//! ```text
//! AnalyzeRequest → InitializeAgents → ExchangeContracts → FanOut → Consolidate → Done
//! ```
//!
//! Initialization and exchange run one node at a time in dependency order.
//! Fan-out spawns one planning task per relevant node on a `JoinSet` and
//! merges results through the state reducers as they arrive. A branch that
//! panics is recorded as an `Error: ...` plan for its node. A cancel future
//! aborts outstanding branches; whatever finished is consolidated.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use super::analyze::analyze_request;
use super::consolidate::consolidate;
use super::state::{BranchUpdate, RootState};
use super::Phase;
use crate::agent::{AgentRunner, ExplorationRunner, RelevanceClassifier};
use crate::error::Result;
use crate::exchange::exchange_contracts;
use crate::initialize::initialize_node;
use crate::observer::{ExchangeSkip, OrchestrationEvent};
use crate::planner::plan_node;
use crate::workspace::Workspace;

pub struct OrchestrationEngine {
    ws: Workspace,
    explorer: Arc<dyn ExplorationRunner>,
    agent: Arc<dyn AgentRunner>,
    classifier: Option<Arc<dyn RelevanceClassifier>>,
}

impl OrchestrationEngine {
    pub fn new(
        ws: Workspace,
        explorer: Arc<dyn ExplorationRunner>,
        agent: Arc<dyn AgentRunner>,
    ) -> Self {
        Self {
            ws,
            explorer,
            agent,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn RelevanceClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    /// Run the workflow to completion.
    pub async fn run(&self, user_request: &str) -> Result<RootState> {
        self.run_until(user_request, std::future::pending()).await
    }

    /// Run the workflow; if `cancel` resolves during fan-out, abort pending
    /// branches and consolidate what finished.
    ///
    /// Returns `Err` only for infrastructure failures (checkpoint or index
    /// writes). Per-node failures end up in the consolidated output.
    pub async fn run_until<F>(&self, user_request: &str, cancel: F) -> Result<RootState>
    where
        F: Future<Output = ()>,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("poag.run", run_id = %run_id);
        self.drive(user_request, cancel).instrument(span).await
    }

    async fn drive<F>(&self, user_request: &str, cancel: F) -> Result<RootState>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut state = RootState::new(user_request);
        let mut order = Vec::new();
        let mut ready = BTreeSet::new();
        let mut phase = Phase::AnalyzeRequest;

        loop {
            self.ws.report(OrchestrationEvent::PhaseEntered { phase });
            phase = match phase {
                Phase::AnalyzeRequest => {
                    let selection =
                        analyze_request(&self.ws, self.classifier.as_deref(), user_request).await;
                    state.relevant_nodes = selection.relevant;
                    state.per_node_instruction = selection.instructions;
                    Phase::InitializeAgents
                }
                Phase::InitializeAgents => {
                    order = self.ordered(&state.relevant_nodes);
                    for node in &order {
                        let outcome =
                            initialize_node(&self.ws, self.explorer.as_ref(), node).await?;
                        if outcome.is_ready() {
                            ready.insert(node.clone());
                        }
                    }
                    Phase::ExchangeContracts
                }
                Phase::ExchangeContracts => {
                    for node in &order {
                        if !ready.contains(node) {
                            self.ws.report(OrchestrationEvent::ExchangeSkipped {
                                node: node.clone(),
                                reason: ExchangeSkip::NotInitialized,
                            });
                            continue;
                        }
                        exchange_contracts(&self.ws, self.agent.as_ref(), node).await?;
                    }
                    Phase::FanOut
                }
                Phase::FanOut => {
                    if !state.relevant_nodes.is_empty() {
                        self.fan_out(&mut state, &mut cancel).await;
                    }
                    Phase::Consolidate
                }
                Phase::Consolidate => {
                    let output = consolidate(&state);
                    self.ws.report(OrchestrationEvent::Consolidated {
                        plans: state.collected_results.len(),
                    });
                    state.consolidated_output = Some(output);
                    Phase::Done
                }
                Phase::Done => break,
            };
        }

        Ok(state)
    }

    /// `nodes` in initialization order. A cycle is reported and the
    /// name-sorted fallback order used instead.
    fn ordered(&self, nodes: &[String]) -> Vec<String> {
        let order = match self.ws.project.graph().initialization_order() {
            Ok(order) => order,
            Err(cycle) => {
                self.ws.report(OrchestrationEvent::CycleDetected {
                    involved: cycle.involved,
                });
                cycle.order
            }
        };
        order.into_iter().filter(|n| nodes.contains(n)).collect()
    }

    async fn fan_out<C>(&self, state: &mut RootState, cancel: &mut C)
    where
        C: Future<Output = ()> + Unpin,
    {
        let mut tasks = JoinSet::new();
        let mut branches = HashMap::new();
        for node in state.relevant_nodes.clone() {
            let ws = self.ws.clone();
            let agent = Arc::clone(&self.agent);
            let instruction = state.instruction_for(&node);
            let handle = tasks.spawn(
                {
                    let node = node.clone();
                    async move { plan_node(&ws, agent.as_ref(), &node, &instruction).await }
                }
                .in_current_span(),
            );
            branches.insert(handle.id(), node);
        }

        let mut completed = 0;
        loop {
            tokio::select! {
                biased;
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((id, plan))) => {
                        if let Some(node) = branches.remove(&id) {
                            state.apply(BranchUpdate::single(node, plan));
                        }
                        completed += 1;
                    }
                    Some(Err(e)) => {
                        let Some(node) = branches.remove(&e.id()) else {
                            warn!(event = "fanout.branch_lost", error = %e);
                            continue;
                        };
                        warn!(event = "fanout.branch_failed", node = %node, error = %e);
                        let plan = format!("Error: planning task failed: {e}");
                        state.apply(BranchUpdate::single(node, plan));
                        completed += 1;
                    }
                    None => break,
                },
                _ = &mut *cancel => {
                    let aborted = tasks.len();
                    tasks.abort_all();
                    self.ws.report(OrchestrationEvent::FanOutCancelled { completed, aborted });
                    break;
                }
            }
        }
    }
}
