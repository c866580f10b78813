//! Injected progress reporting.
//!
//! Components never print. They hand [`OrchestrationEvent`]s to an
//! `Arc<dyn Reporter>`; the default [`TracingReporter`] turns them into
//! structured `tracing` events with an `event = "..."` field.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::orchestration::Phase;

/// Why initialization was skipped for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSkip {
    AlreadyInitialized,
    ContractsCurrent,
}

/// Why Phase 2 was skipped for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeSkip {
    NoDependents,
    UpToDate,
    /// Phase 1 did not complete for the node in this run.
    NotInitialized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationEvent {
    PhaseEntered {
        phase: Phase,
    },
    RelevanceFallback {
        reason: String,
    },
    NodesSelected {
        nodes: Vec<String>,
    },
    UnknownNodesDropped {
        nodes: Vec<String>,
    },
    CycleDetected {
        involved: Vec<String>,
    },
    InitSkipped {
        node: String,
        reason: InitSkip,
    },
    /// A checkpointed node's index no longer matches; Phase 1 runs again.
    InitStale {
        node: String,
        reason: String,
    },
    InitCompleted {
        node: String,
        input_contracts: usize,
    },
    InitFailed {
        node: String,
        error: String,
    },
    ExtraSectionIgnored {
        node: String,
        section: String,
    },
    ContractGap {
        provider: String,
        dependent: String,
    },
    OutputContractWritten {
        provider: String,
        dependent: String,
    },
    ExchangeFailed {
        provider: String,
        dependent: String,
        error: String,
    },
    ExchangeSkipped {
        node: String,
        reason: ExchangeSkip,
    },
    PlanningStarted {
        node: String,
    },
    PlanningFinished {
        node: String,
        succeeded: bool,
    },
    FanOutCancelled {
        completed: usize,
        aborted: usize,
    },
    Consolidated {
        plans: usize,
    },
}

pub trait Reporter: Send + Sync {
    fn report(&self, event: &OrchestrationEvent);
}

/// Emits every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &OrchestrationEvent) {
        use OrchestrationEvent as E;
        match event {
            E::PhaseEntered { phase } => info!(event = "phase.entered", phase = ?phase),
            E::RelevanceFallback { reason } => {
                warn!(event = "relevance.fallback", reason = %reason)
            }
            E::NodesSelected { nodes } => info!(event = "relevance.selected", nodes = ?nodes),
            E::UnknownNodesDropped { nodes } => {
                warn!(event = "relevance.unknown_dropped", nodes = ?nodes)
            }
            E::CycleDetected { involved } => warn!(event = "graph.cycle", involved = ?involved),
            E::InitSkipped { node, reason } => {
                info!(event = "init.skipped", node = %node, reason = ?reason)
            }
            E::InitStale { node, reason } => {
                info!(event = "init.stale", node = %node, reason = %reason)
            }
            E::InitCompleted {
                node,
                input_contracts,
            } => info!(event = "init.completed", node = %node, input_contracts = *input_contracts),
            E::InitFailed { node, error } => warn!(event = "init.failed", node = %node, error = %error),
            E::ExtraSectionIgnored { node, section } => {
                warn!(event = "init.extra_section", node = %node, section = %section)
            }
            E::ContractGap {
                provider,
                dependent,
            } => warn!(event = "exchange.gap", provider = %provider, dependent = %dependent),
            E::OutputContractWritten {
                provider,
                dependent,
            } => info!(event = "exchange.written", provider = %provider, dependent = %dependent),
            E::ExchangeFailed {
                provider,
                dependent,
                error,
            } => warn!(
                event = "exchange.failed",
                provider = %provider,
                dependent = %dependent,
                error = %error,
            ),
            E::ExchangeSkipped { node, reason } => {
                info!(event = "exchange.skipped", node = %node, reason = ?reason)
            }
            E::PlanningStarted { node } => info!(event = "plan.started", node = %node),
            E::PlanningFinished { node, succeeded } => {
                info!(event = "plan.finished", node = %node, succeeded = *succeeded)
            }
            E::FanOutCancelled { completed, aborted } => warn!(
                event = "fanout.cancelled",
                completed = *completed,
                aborted = *aborted,
            ),
            E::Consolidated { plans } => info!(event = "run.consolidated", plans = *plans),
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<OrchestrationEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrchestrationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: &OrchestrationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
