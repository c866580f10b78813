//! Node descriptions and neighborhoods, as printed by `poag describe` and
//! `poag ls --neighbors`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::node::ROOT_NODE;
use crate::project::Project;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Dependency,
    Dependent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborInfo {
    pub description: Option<String>,
    pub language: String,
    pub relationship: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractsView {
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub path: PathBuf,
    pub language: String,
    pub description: Option<String>,
    pub readme: Option<String>,
    pub flake_nix: Option<String>,
    pub neighbors: BTreeMap<String, NeighborInfo>,
    pub contracts: ContractsView,
}

/// Everything an agent may want to know about `name`.
pub fn describe_node(ws: &Workspace, name: &str) -> Result<NodeDescription> {
    let project = &ws.project;
    let node = project.node(name)?;
    let dir = project.node_dir(name)?;
    let graph = project.graph();

    let mut neighbors = BTreeMap::new();
    let deps = graph.direct_dependencies(name);
    let dependents = graph.all_dependents(name);
    for (names, relationship) in [
        (&deps, Relationship::Dependency),
        (&dependents, Relationship::Dependent),
    ] {
        for neighbor in names {
            let Ok(info) = project.node(neighbor) else {
                continue;
            };
            neighbors
                .entry(neighbor.clone())
                .or_insert_with(|| NeighborInfo {
                    description: info.description.clone(),
                    language: info.language.clone(),
                    relationship: Vec::new(),
                })
                .relationship
                .push(relationship);
        }
    }

    let contracts = ws.contracts(name)?.all_contracts();
    Ok(NodeDescription {
        name: node.name.clone(),
        path: node.path.clone(),
        language: node.language.clone(),
        description: node.description.clone(),
        readme: std::fs::read_to_string(dir.join("README.md")).ok(),
        flake_nix: std::fs::read_to_string(dir.join("flake.nix")).ok(),
        neighbors,
        contracts: ContractsView {
            inputs: contracts.inputs,
            outputs: contracts.outputs,
        },
    })
}

/// `name`, its direct dependencies and all its dependents, sorted.
pub fn neighborhood(project: &Project, name: &str) -> Result<Vec<String>> {
    project.node(name)?;
    let graph = project.graph();
    let mut names: BTreeSet<String> = BTreeSet::from([name.to_string()]);
    names.extend(graph.direct_dependencies(name));
    names.extend(graph.all_dependents(name));
    Ok(names.into_iter().collect())
}

/// The node whose directory is `dir`, if any.
pub fn node_for_dir(project: &Project, dir: &Path) -> Option<String> {
    let dir = dir.canonicalize().ok()?;
    if dir == project.root() {
        return Some(ROOT_NODE.to_string());
    }
    project
        .nodes()
        .filter(|node| !node.is_root())
        .find(|node| {
            project
                .root()
                .join(&node.path)
                .canonicalize()
                .is_ok_and(|p| p == dir)
        })
        .map(|node| node.name.clone())
}
