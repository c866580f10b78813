//! Narrow interfaces to the external reasoning agent and the relevance
//! classifier.
//!
//! The core never parses free-form agent prose: adapters return structured
//! values or a typed failure, and every failure is a recoverable outcome for
//! the node concerned.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PoagError;

/// Failure of a single agent call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("malformed agent response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Failed(String),

    #[error("agent timed out after {after:?}")]
    Timeout { after: Duration },
}

impl From<AgentError> for PoagError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Unavailable(msg) => PoagError::AgentUnavailable(msg),
            AgentError::MalformedResponse(msg) => PoagError::MalformedResponse(msg),
            AgentError::Failed(msg) => PoagError::Agent(msg),
            timeout @ AgentError::Timeout { .. } => PoagError::Agent(timeout.to_string()),
        }
    }
}

/// Phase 1 input: one node and its neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationRequest {
    pub node: String,
    pub workdir: PathBuf,
    pub language: String,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
}

/// Phase 1 output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationReport {
    pub session_id: Option<String>,
    pub self_summary: String,
    /// Dependency name → what this node needs from it.
    #[serde(default)]
    pub dependency_sections: BTreeMap<String, String>,
}

#[async_trait]
pub trait ExplorationRunner: Send + Sync {
    async fn explore(&self, request: ExplorationRequest) -> Result<ExplorationReport, AgentError>;
}

/// A general agent call: one prompt in one node directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub node: String,
    pub workdir: PathBuf,
    pub prompt: String,
    pub resume_session: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentResponse {
    pub session_id: Option<String>,
    pub result: String,
}

#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError>;
}

/// Failure of the relevance classifier. Every variant triggers the
/// "all nodes relevant" fallback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("classifier unavailable: {0}")]
    Unavailable(String),

    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),
}

/// What the classifier is told about each candidate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub language: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceRequest {
    pub project_context: String,
    pub nodes: Vec<NodeSummary>,
    pub user_request: String,
}

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    /// Node name → instruction tailored to that node.
    async fn classify(
        &self,
        request: RelevanceRequest,
    ) -> Result<BTreeMap<String, String>, ClassifierError>;
}
