//! A project: its root directory, its nodes and their dependency graph.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{PoagError, Result};
use crate::graph::DependencyGraph;
use crate::node::{Manifest, Node, ROOT_NODE};

/// Nodes of one project resolved against the dependency graph.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    nodes: BTreeMap<String, Node>,
    graph: DependencyGraph,
}

impl Project {
    /// Resolve a manifest rooted at `root`.
    ///
    /// The root directory must exist. The manifest must name every node once
    /// and contain exactly one `root` node.
    pub fn from_manifest(root: impl AsRef<Path>, manifest: &Manifest) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PoagError::ProjectRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        let root = root.canonicalize().map_err(|e| PoagError::ProjectRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut declarations: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &manifest.entries {
            if entry.name.is_empty() {
                return Err(PoagError::InvalidManifest(
                    "node with empty name".to_string(),
                ));
            }
            if declarations
                .insert(entry.name.clone(), entry.dependencies.clone())
                .is_some()
            {
                return Err(PoagError::InvalidManifest(format!(
                    "duplicate node '{}'",
                    entry.name
                )));
            }
        }
        if !declarations.contains_key(ROOT_NODE) {
            return Err(PoagError::InvalidManifest(format!(
                "no '{ROOT_NODE}' node"
            )));
        }

        let graph = DependencyGraph::build(&declarations);
        let nodes = manifest
            .entries
            .iter()
            .map(|entry| {
                let node = Node {
                    name: entry.name.clone(),
                    path: if entry.name == ROOT_NODE {
                        PathBuf::from(".")
                    } else {
                        entry.path.clone()
                    },
                    dependencies: graph.direct_dependencies(&entry.name),
                    language: entry.language.clone(),
                    description: entry.description.clone(),
                    content_revision: entry.content_revision.clone(),
                };
                (entry.name.clone(), node)
            })
            .collect();

        Ok(Self { root, nodes, graph })
    }

    /// Canonical project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key under which checkpoints for this project are stored.
    pub fn key(&self) -> String {
        self.root.display().to_string()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Names of every node except the root, sorted.
    pub fn non_root_names(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|name| name.as_str() != ROOT_NODE)
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Result<&Node> {
        self.nodes.get(name).ok_or_else(|| PoagError::NodeNotFound {
            node: name.to_string(),
        })
    }

    /// Absolute directory of a node.
    pub fn node_dir(&self, name: &str) -> Result<PathBuf> {
        let node = self.node(name)?;
        if node.is_root() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(&node.path))
        }
    }
}
