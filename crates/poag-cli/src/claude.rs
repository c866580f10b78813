//! Headless coding-agent adapter.
//!
//! Runs `<command> -p <prompt> --output-format json [--resume <id>]` in the
//! node directory and reads the `{session_id, result}` object it prints.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use poag_core::prompts::exploration_prompt;
use poag_core::{
    AgentError, AgentRequest, AgentResponse, AgentRunner, ExplorationReport, ExplorationRequest,
    ExplorationRunner, PoagConfig,
};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::reply::parse_object;

/// What the agent prints on stdout with `--output-format json`.
#[derive(Debug, Deserialize)]
struct CliOutput {
    session_id: Option<String>,
    #[serde(default)]
    result: String,
    #[serde(default)]
    is_error: bool,
}

/// The JSON object the exploration prompt asks for.
#[derive(Debug, Deserialize)]
struct ExplorationReply {
    self_summary: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ClaudeCodeAgent {
    command: String,
    timeout: Duration,
}

impl ClaudeCodeAgent {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PoagConfig) -> Self {
        Self::new(
            config.agent_command.clone(),
            Duration::from_secs(config.agent_timeout_secs),
        )
    }
}

#[async_trait]
impl AgentRunner for ClaudeCodeAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let mut command = Command::new(&self.command);
        command
            .arg("-p")
            .arg(&request.prompt)
            .args(["--output-format", "json"]);
        if let Some(session) = &request.resume_session {
            command.args(["--resume", session]);
        }
        let child = command
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    AgentError::Unavailable(format!("`{}` not found in PATH", self.command))
                }
                _ => AgentError::Unavailable(e.to_string()),
            })?;

        debug!(
            event = "agent.spawned",
            node = %request.node,
            resume = request.resume_session.is_some(),
        );

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AgentError::Timeout {
                after: self.timeout,
            })?
            .map_err(|e| AgentError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(AgentError::Failed(if stderr.is_empty() {
                format!("agent exited with {}", output.status)
            } else {
                stderr.to_string()
            }));
        }

        parse_cli_output(&output.stdout)
    }
}

#[async_trait]
impl ExplorationRunner for ClaudeCodeAgent {
    async fn explore(&self, request: ExplorationRequest) -> Result<ExplorationReport, AgentError> {
        let response = self
            .run(AgentRequest {
                node: request.node.clone(),
                workdir: request.workdir.clone(),
                prompt: exploration_prompt(&request),
                resume_session: None,
            })
            .await?;
        parse_exploration(response)
    }
}

fn parse_cli_output(stdout: &[u8]) -> Result<AgentResponse, AgentError> {
    let output: CliOutput = serde_json::from_slice(stdout)
        .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;
    if output.is_error {
        return Err(AgentError::Failed(output.result));
    }
    Ok(AgentResponse {
        session_id: output.session_id,
        result: output.result,
    })
}

fn parse_exploration(response: AgentResponse) -> Result<ExplorationReport, AgentError> {
    let reply: ExplorationReply =
        parse_object(&response.result).map_err(AgentError::MalformedResponse)?;
    Ok(ExplorationReport {
        session_id: response.session_id,
        self_summary: reply.self_summary,
        dependency_sections: reply.dependencies,
    })
}
