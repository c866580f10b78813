//! Error types for the POAG core.
//!
//! Per-node failures (agent errors, missing contracts) are reported and
//! folded into the run; only infrastructure failures propagate as
//! [`PoagError`] out of the orchestration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the POAG core.
#[derive(Debug, Error)]
pub enum PoagError {
    /// A required credential or setting is absent.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The reasoning agent could not be reached.
    #[error("agent unavailable: {0}")]
    AgentUnavailable(String),

    /// The agent ran but reported a failure.
    #[error("agent error: {0}")]
    Agent(String),

    /// An agent or classifier response could not be parsed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The component graph contains a cycle.
    #[error("dependency cycle detected involving nodes: {nodes:?}")]
    CycleDetected { nodes: Vec<String> },

    /// A node's contract index is stale or absent.
    #[error("stale or missing contracts in {}: {reason}", dir.display())]
    StaleOrMissingContract { dir: PathBuf, reason: String },

    /// A node was used before completing one-time initialization.
    #[error("node '{node}' is not initialized")]
    NotInitialized { node: String },

    /// The resolved manifest violates a structural rule.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// A referenced node is not part of the project.
    #[error("node not found in project: {node}")]
    NodeNotFound { node: String },

    /// The project root cannot be used.
    #[error("invalid project root {path}: {reason}")]
    ProjectRoot { path: PathBuf, reason: String },

    /// The checkpoint mapping could not be persisted.
    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, PoagError>;
