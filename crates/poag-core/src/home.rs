//! Configuration and state directories.
//!
//! - config: `$XDG_CONFIG_HOME/poag/poag.json`
//! - state:  `$XDG_STATE_HOME/poag/` (checkpoints, sessions)
//!
//! `POAG_HOME` relocates both under one directory, which is how tests and
//! sandboxes run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PoagError, Result};
use crate::persist::write_atomic;

const APP_NAME: &str = "poag";
const CONFIG_FILE: &str = "poag.json";

pub const HOME_ENV: &str = "POAG_HOME";
pub const AGENT_COMMAND_ENV: &str = "POAG_AGENT_COMMAND";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoagConfig {
    /// Executable of the headless coding agent.
    pub agent_command: String,
    /// Upper bound on one agent call.
    pub agent_timeout_secs: u64,
    pub classifier_model: String,
    pub classifier_endpoint: String,
    pub classifier_timeout_secs: u64,
    /// Never written to disk; read from `ANTHROPIC_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for PoagConfig {
    fn default() -> Self {
        Self {
            agent_command: "claude".to_string(),
            agent_timeout_secs: 900,
            classifier_model: "claude-sonnet-4-20250514".to_string(),
            classifier_endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            classifier_timeout_secs: 60,
            api_key: None,
        }
    }
}

impl PoagConfig {
    /// Apply environment overrides through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(command) = lookup(AGENT_COMMAND_ENV).filter(|c| !c.is_empty()) {
            self.agent_command = command;
        }
        self.api_key = lookup(API_KEY_ENV).filter(|k| !k.is_empty());
        self
    }
}

/// Where POAG keeps its configuration and state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home {
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Home {
    /// Resolve from `POAG_HOME`, else the XDG directories.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::sandbox(PathBuf::from(root)));
        }
        let config = dirs::config_dir().ok_or_else(|| {
            PoagError::ConfigurationMissing("could not determine config directory".to_string())
        })?;
        let state = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| {
                PoagError::ConfigurationMissing("could not determine state directory".to_string())
            })?;
        Ok(Self {
            config_dir: config.join(APP_NAME),
            state_dir: state.join(APP_NAME),
        })
    }

    /// Both directories under `parent`.
    pub fn sandbox(parent: impl AsRef<Path>) -> Self {
        let parent = parent.as_ref();
        Self {
            config_dir: parent.join("config").join(APP_NAME),
            state_dir: parent.join("state").join(APP_NAME),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Load `poag.json`. A missing file is created with defaults; a corrupt
    /// one is reported and replaced by defaults in memory.
    pub fn load_config(&self) -> PoagConfig {
        let path = self.config_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(event = "config.corrupt", path = %path.display(), error = %e);
                PoagConfig::default()
            }),
            Err(_) => {
                let config = PoagConfig::default();
                if let Err(e) = self.save_config(&config) {
                    warn!(event = "config.write_failed", path = %path.display(), error = %e);
                }
                config
            }
        }
    }

    pub fn save_config(&self, config: &PoagConfig) -> Result<()> {
        let json = serde_json::to_vec_pretty(config)?;
        write_atomic(&self.config_path(), &json)?;
        Ok(())
    }
}
