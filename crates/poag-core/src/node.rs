//! Project nodes and the resolved manifest they are built from.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PoagError, Result};

/// Name of the distinguished node representing the whole project.
pub const ROOT_NODE: &str = "root";

/// Language reported when no marker file matches.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// One independently-versioned component of the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,
    /// Relative to the project root; `.` for the root node.
    pub path: PathBuf,
    /// Derived from the dependency graph, sorted.
    pub dependencies: Vec<String>,
    pub language: String,
    pub description: Option<String>,
    /// Revision reported by the manifest source; the freshness fallback when
    /// the node directory is not in a git repository.
    pub content_revision: Option<String>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.name == ROOT_NODE
    }
}

/// A `(node, declared dependencies)` record as produced by a manifest source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub content_revision: Option<String>,
    #[serde(default = "unknown_language")]
    pub language: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn unknown_language() -> String {
    UNKNOWN_LANGUAGE.to_string()
}

impl ManifestEntry {
    /// Create an entry with no dependencies and unknown language.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dependencies: Vec::new(),
            content_revision: None,
            language: unknown_language(),
            description: None,
        }
    }

    /// Builder-style helper to declare dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The resolved list of manifest entries for one project, root included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Read a manifest from a JSON file.
    ///
    /// Accepts either `{"entries": [...]}` or a bare array of entries.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        if let Ok(entries) = serde_json::from_str::<Vec<ManifestEntry>>(&raw) {
            return Ok(Self { entries });
        }
        serde_json::from_str(&raw).map_err(|e| {
            PoagError::InvalidManifest(format!("{}: {e}", path.display()))
        })
    }
}
