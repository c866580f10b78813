//! POAG Core Library
//!
//! Dependency graph, contract store and the phased orchestration engine that
//! plans work across the components of a multi-component project.

pub mod agent;
pub mod checkpoint;
pub mod clear;
pub mod contracts;
pub mod describe;
pub mod error;
pub mod exchange;
pub mod graph;
pub mod home;
pub mod initialize;
pub mod node;
pub mod observer;
pub mod orchestration;
pub mod planner;
pub mod project;
pub mod prompts;
pub mod revision;
pub mod session;
pub mod telemetry;
pub mod workspace;

mod persist;

#[cfg(test)]
mod testing;

pub use agent::{
    AgentError, AgentRequest, AgentResponse, AgentRunner, ClassifierError, ExplorationReport,
    ExplorationRequest, ExplorationRunner, NodeSummary, RelevanceClassifier, RelevanceRequest,
};
pub use checkpoint::{thread_id, CheckpointStore};
pub use clear::{clear, ClearReport};
pub use contracts::{contract_digest, ContractIndex, ContractSet, ContractStore, OutputSource};
pub use describe::{describe_node, neighborhood, node_for_dir, NodeDescription, Relationship};
pub use error::{PoagError, Result};
pub use exchange::{exchange_contracts, ExchangeOutcome};
pub use graph::{CycleDetected, DependencyGraph, Slot};
pub use home::{Home, PoagConfig};
pub use initialize::{initialize_node, InitOutcome};
pub use node::{Manifest, ManifestEntry, Node, ROOT_NODE};
pub use observer::{MemoryReporter, OrchestrationEvent, Reporter, TracingReporter};
pub use orchestration::{ConsolidatedOutput, OrchestrationEngine, Phase, RootState};
pub use planner::plan_node;
pub use project::Project;
pub use revision::{GitRevision, ProjectRevision, RevisionSource, StaticRevision};
pub use session::{SessionRecord, SessionStore};
pub use telemetry::init_tracing;
pub use workspace::Workspace;
