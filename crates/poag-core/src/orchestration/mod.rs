//! Phased orchestration: analyze the request, initialize and exchange
//! contracts for the relevant nodes, fan planning out to them, then merge.

pub mod analyze;
pub mod consolidate;
pub mod engine;
pub mod state;

pub use analyze::{analyze_request, node_summaries, project_context, Selection};
pub use consolidate::{consolidate, ConsolidatedOutput, ErrorReport, PlanReport, NEXT_STEPS};
pub use engine::OrchestrationEngine;
pub use state::{reduce_queried, reduce_results, BranchUpdate, RootState};

/// States of the root workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    AnalyzeRequest,
    InitializeAgents,
    ExchangeContracts,
    FanOut,
    Consolidate,
    Done,
}
