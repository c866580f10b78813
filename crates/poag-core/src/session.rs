//! Per-thread agent session records.
//!
//! Layout: `<state>/checkpoints/sessions/<sha256(thread id)>.json`. Hashing
//! keeps file names flat no matter what the project path looks like.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Result;
use crate::persist::write_atomic;

/// The long-lived agent session attached to one thread identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub thread_id: String,
    pub node: String,
    pub session_id: Option<String>,
    pub self_summary: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at the given state directory.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: state_dir.as_ref().join("checkpoints").join("sessions"),
        }
    }

    fn record_path(&self, thread_id: &str) -> PathBuf {
        let digest = Sha256::digest(thread_id.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&self.record_path(&record.thread_id), &json)?;
        Ok(())
    }

    /// Load the record for `thread_id`. Missing or corrupt records read as
    /// `None`.
    pub fn load(&self, thread_id: &str) -> Option<SessionRecord> {
        let path = self.record_path(thread_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(event = "session.corrupt", path = %path.display(), error = %e);
                None
            }
        }
    }

    /// Delete the record. Returns `true` if one existed.
    pub fn delete(&self, thread_id: &str) -> Result<bool> {
        match std::fs::remove_file(self.record_path(thread_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
