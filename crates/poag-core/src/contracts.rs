//! Per-node contract documents and their revision-stamped index.
//!
//! Layout under a node directory:
//!
//! ```text
//! .contracts/
//!   index.json          lastRevision, inputs, outputs, generatedAt, outputSources
//!   inputs/<dep>.md     what this node needs from <dep>
//!   outputs/<dep>.md    what this node provides to <dep>
//! ```
//!
//! An index is current only when it parses, the node's revision is known and
//! equal to `lastRevision`, and every indexed file exists. Anything else is
//! treated as stale; there are no false positives.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{PoagError, Result};
use crate::persist::write_atomic;
use crate::revision::RevisionSource;

pub const CONTRACTS_DIR: &str = ".contracts";
pub const INDEX_FILE: &str = "index.json";
/// Stored as `lastRevision` when no revision is available.
pub const UNKNOWN_REVISION: &str = "unknown";

const INPUTS_DIR: &str = "inputs";
const OUTPUTS_DIR: &str = "outputs";

/// Which input contract an output contract answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSource {
    /// Provider revision at generation time.
    pub revision: String,
    /// SHA-256 (hex) of the dependent's input contract.
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractIndex {
    pub last_revision: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_sources: BTreeMap<String, OutputSource>,
}

/// Every contract a node holds, keyed by the neighbor it concerns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractSet {
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
}

impl ContractSet {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// SHA-256 hex digest of a contract body.
pub fn contract_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn file_name(neighbor: &str) -> String {
    format!("{neighbor}.md")
}

/// Contract store for one node directory.
#[derive(Clone)]
pub struct ContractStore {
    node_dir: PathBuf,
    revisions: Arc<dyn RevisionSource>,
}

impl std::fmt::Debug for ContractStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractStore")
            .field("node_dir", &self.node_dir)
            .finish_non_exhaustive()
    }
}

impl ContractStore {
    pub fn new(node_dir: impl Into<PathBuf>, revisions: Arc<dyn RevisionSource>) -> Self {
        Self {
            node_dir: node_dir.into(),
            revisions,
        }
    }

    /// The `.contracts` directory.
    pub fn dir(&self) -> PathBuf {
        self.node_dir.join(CONTRACTS_DIR)
    }

    fn index_path(&self) -> PathBuf {
        self.dir().join(INDEX_FILE)
    }

    fn input_path(&self, dependency: &str) -> PathBuf {
        self.dir().join(INPUTS_DIR).join(file_name(dependency))
    }

    fn output_path(&self, dependent: &str) -> PathBuf {
        self.dir().join(OUTPUTS_DIR).join(file_name(dependent))
    }

    /// Current revision of the node directory, if any.
    pub fn current_revision(&self) -> Option<String> {
        self.revisions.current_revision(&self.node_dir)
    }

    /// Parsed index, or `None` when absent or corrupt.
    pub fn load_index(&self) -> Option<ContractIndex> {
        let path = self.index_path();
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(event = "contracts.index_corrupt", path = %path.display(), error = %e);
                None
            }
        }
    }

    pub fn are_contracts_current(&self) -> bool {
        match self.check_current() {
            Ok(()) => true,
            Err(stale) => {
                debug!(event = "contracts.stale", error = %stale);
                false
            }
        }
    }

    /// Like [`are_contracts_current`](Self::are_contracts_current), with the
    /// reason the index is stale as a
    /// [`PoagError::StaleOrMissingContract`].
    pub fn check_current(&self) -> Result<()> {
        let stale = |reason: String| PoagError::StaleOrMissingContract {
            dir: self.node_dir.clone(),
            reason,
        };
        let index = self.load_index().ok_or_else(|| stale("no index".to_string()))?;
        let revision = self
            .current_revision()
            .ok_or_else(|| stale("revision unavailable".to_string()))?;
        if revision != index.last_revision {
            return Err(stale(format!(
                "revision changed from {} to {revision}",
                index.last_revision
            )));
        }

        let contracts = self.dir();
        let missing = index
            .inputs
            .iter()
            .map(|f| contracts.join(INPUTS_DIR).join(f))
            .chain(index.outputs.iter().map(|f| contracts.join(OUTPUTS_DIR).join(f)))
            .find(|p| !p.is_file());
        match missing {
            Some(path) => Err(stale(format!("missing {}", path.display()))),
            None => Ok(()),
        }
    }

    pub fn write_input_contract(&self, dependency: &str, text: &str) -> Result<PathBuf> {
        let path = self.input_path(dependency);
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    pub fn write_output_contract(&self, dependent: &str, text: &str) -> Result<PathBuf> {
        let path = self.output_path(dependent);
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    pub fn read_input_contract(&self, dependency: &str) -> Option<String> {
        fs::read_to_string(self.input_path(dependency)).ok()
    }

    pub fn read_output_contract(&self, dependent: &str) -> Option<String> {
        fs::read_to_string(self.output_path(dependent)).ok()
    }

    /// Every contract file present on disk.
    pub fn all_contracts(&self) -> ContractSet {
        ContractSet {
            inputs: read_dir_contracts(&self.dir().join(INPUTS_DIR)),
            outputs: read_dir_contracts(&self.dir().join(OUTPUTS_DIR)),
        }
    }

    /// Rewrite the index from scratch with the current revision.
    pub fn record_generation(&self, inputs: &[String], outputs: &[String]) -> Result<ContractIndex> {
        let index = ContractIndex {
            last_revision: self.revision_or_sentinel(),
            inputs: sorted_file_names(inputs),
            outputs: sorted_file_names(outputs),
            generated_at: Some(Utc::now()),
            output_sources: BTreeMap::new(),
        };
        self.save_index(&index)?;
        Ok(index)
    }

    /// Replace the recorded inputs, keeping whatever outputs were recorded.
    pub fn record_inputs(&self, inputs: &[String]) -> Result<ContractIndex> {
        let existing = self.load_index().unwrap_or_default();
        let index = ContractIndex {
            last_revision: self.revision_or_sentinel(),
            inputs: sorted_file_names(inputs),
            outputs: existing.outputs,
            generated_at: Some(Utc::now()),
            output_sources: existing.output_sources,
        };
        self.save_index(&index)?;
        Ok(index)
    }

    /// Add freshly written outputs to the index, keeping recorded inputs and
    /// previously recorded outputs.
    ///
    /// `lastRevision` is carried over from the existing index (the sentinel
    /// when there is none): only Phase 1 recording advances it.
    pub fn record_outputs(
        &self,
        outputs: &[String],
        sources: BTreeMap<String, OutputSource>,
    ) -> Result<ContractIndex> {
        let existing = self.load_index().unwrap_or_default();
        let mut merged: BTreeSet<String> = existing.outputs.into_iter().collect();
        merged.extend(outputs.iter().map(|n| file_name(n)));

        let mut output_sources = existing.output_sources;
        output_sources.extend(sources);

        let last_revision = if existing.last_revision.is_empty() {
            UNKNOWN_REVISION.to_string()
        } else {
            existing.last_revision
        };

        let index = ContractIndex {
            last_revision,
            inputs: existing.inputs,
            outputs: merged.into_iter().collect(),
            generated_at: Some(Utc::now()),
            output_sources,
        };
        self.save_index(&index)?;
        Ok(index)
    }

    /// True when the index is current and every `(dependent, input contract)`
    /// pair already has an output contract generated at the current revision
    /// from that exact input text.
    pub fn outputs_answer(&self, requests: &[(String, String)]) -> bool {
        if !self.are_contracts_current() {
            return false;
        }
        let (Some(index), Some(revision)) = (self.load_index(), self.current_revision()) else {
            return false;
        };
        requests.iter().all(|(dependent, input)| {
            index.output_sources.get(dependent).is_some_and(|source| {
                source.revision == revision && source.digest == contract_digest(input)
            }) && self.output_path(dependent).is_file()
        })
    }

    /// Remove the whole `.contracts` directory. Returns `true` if it existed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_dir_all(self.dir()) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn revision_or_sentinel(&self) -> String {
        self.current_revision()
            .unwrap_or_else(|| UNKNOWN_REVISION.to_string())
    }

    fn save_index(&self, index: &ContractIndex) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &json)?;
        Ok(())
    }
}

fn sorted_file_names(names: &[String]) -> Vec<String> {
    let set: BTreeSet<String> = names.iter().map(|n| file_name(n)).collect();
    set.into_iter().collect()
}

fn read_dir_contracts(dir: &Path) -> BTreeMap<String, String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeMap::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            let body = fs::read_to_string(&path).ok()?;
            Some((stem, body))
        })
        .collect()
}
