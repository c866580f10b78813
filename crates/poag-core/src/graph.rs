//! Slot-level dependency graph over project nodes.
//!
//! Every node owns one output slot (`(name, "default")`) and one input slot
//! per declared dependency (`(name, dependency)`). An edge runs from the
//! provider's output slot to the consumer's input slot, so `lib → svc` reads
//! "svc consumes lib". Collapsing slots to their owning component yields the
//! component relation used for ordering and impact queries.
//!
//! Ordering uses Kahn's algorithm with name-ordered tie breaking, so every
//! query is a pure function of the declarations.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::PoagError;
use crate::node::ROOT_NODE;

/// Name of the single output slot every component exposes.
pub const DEFAULT_SLOT: &str = "default";

/// A vertex of the slot graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    /// What `component` provides to its dependents.
    Output { component: String },
    /// What `component` needs from `dependency`.
    Input {
        component: String,
        dependency: String,
    },
}

impl Slot {
    pub fn output(component: impl Into<String>) -> Self {
        Slot::Output {
            component: component.into(),
        }
    }

    pub fn input(component: impl Into<String>, dependency: impl Into<String>) -> Self {
        Slot::Input {
            component: component.into(),
            dependency: dependency.into(),
        }
    }

    /// The component owning this slot.
    pub fn component(&self) -> &str {
        match self {
            Slot::Output { component } | Slot::Input { component, .. } => component,
        }
    }

    /// The slot label: `"default"` for outputs, the dependency name for inputs.
    pub fn label(&self) -> &str {
        match self {
            Slot::Output { .. } => DEFAULT_SLOT,
            Slot::Input { dependency, .. } => dependency,
        }
    }
}

/// Raised by [`DependencyGraph::initialization_order`] when the component
/// graph is not acyclic.
///
/// Carries a usable fallback order (every component, sorted by name) so the
/// caller can report the cycle and carry on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    /// Every component, sorted by name.
    pub order: Vec<String>,
    /// Components that sit on (or between) cycles.
    pub involved: Vec<String>,
}

impl From<CycleDetected> for PoagError {
    fn from(cycle: CycleDetected) -> Self {
        PoagError::CycleDetected {
            nodes: cycle.involved,
        }
    }
}

/// Directed slot graph built from `(node, declared dependencies)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    components: BTreeSet<String>,
    /// `slot → {successor slots}`
    successors: BTreeMap<Slot, BTreeSet<Slot>>,
    /// `slot → {predecessor slots}`
    predecessors: BTreeMap<Slot, BTreeSet<Slot>>,
}

impl DependencyGraph {
    /// Build the graph from each node's declared dependencies.
    ///
    /// Dependencies naming unknown nodes are ignored, as are
    /// self-dependencies.
    pub fn build(declarations: &BTreeMap<String, Vec<String>>) -> Self {
        let mut graph = Self {
            components: declarations.keys().cloned().collect(),
            ..Self::default()
        };

        for name in declarations.keys() {
            graph.successors.entry(Slot::output(name)).or_default();
            graph.predecessors.entry(Slot::output(name)).or_default();
        }

        for (name, deps) in declarations {
            for dep in deps {
                if dep == name || !graph.components.contains(dep) {
                    continue;
                }
                let from = Slot::output(dep);
                let to = Slot::input(name, dep);
                graph
                    .successors
                    .entry(from.clone())
                    .or_default()
                    .insert(to.clone());
                graph.successors.entry(to.clone()).or_default();
                graph.predecessors.entry(to).or_default().insert(from);
            }
        }

        graph
    }

    /// True when `name` is a component of this graph.
    pub fn contains(&self, name: &str) -> bool {
        self.components.contains(name)
    }

    /// All components, sorted by name.
    pub fn components(&self) -> Vec<String> {
        self.components.iter().cloned().collect()
    }

    /// All slots, in sorted order.
    pub fn slots(&self) -> Vec<Slot> {
        self.successors.keys().cloned().collect()
    }

    /// Collapsed `(provider, consumer)` pairs, sorted.
    pub fn component_edges(&self) -> Vec<(String, String)> {
        let mut edges = BTreeSet::new();
        for (from, targets) in &self.successors {
            for to in targets {
                if from.component() != to.component() {
                    edges.insert((from.component().to_string(), to.component().to_string()));
                }
            }
        }
        edges.into_iter().collect()
    }

    /// Components `name` consumes, sorted.
    pub fn direct_dependencies(&self, name: &str) -> Vec<String> {
        let mut deps = BTreeSet::new();
        for (slot, preds) in &self.predecessors {
            if !matches!(slot, Slot::Input { component, .. } if component == name) {
                continue;
            }
            for pred in preds {
                if pred.component() != name {
                    deps.insert(pred.component().to_string());
                }
            }
        }
        deps.into_iter().collect()
    }

    /// Components consuming `name` directly, plus the root node whenever the
    /// root transitively depends on `name`.
    pub fn all_dependents(&self, name: &str) -> Vec<String> {
        let mut dependents: BTreeSet<String> = self
            .successors
            .get(&Slot::output(name))
            .into_iter()
            .flatten()
            .map(|slot| slot.component().to_string())
            .filter(|component| component != name)
            .collect();

        if name != ROOT_NODE && self.transitive_impact(name).iter().any(|c| c == ROOT_NODE) {
            dependents.insert(ROOT_NODE.to_string());
        }

        dependents.into_iter().collect()
    }

    /// Every component reachable downstream of `name` (BFS over the component
    /// relation), excluding `name` itself. Sorted.
    pub fn transitive_impact(&self, name: &str) -> Vec<String> {
        let downstream = self.downstream();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(name.to_string());

        while let Some(current) = queue.pop_front() {
            if let Some(next) = downstream.get(&current) {
                for consumer in next {
                    if consumer != name && visited.insert(consumer.clone()) {
                        queue.push_back(consumer.clone());
                    }
                }
            }
        }

        visited.into_iter().collect()
    }

    /// Components in dependency-first order, ties broken by name.
    ///
    /// Returns [`CycleDetected`] when no such order exists.
    pub fn initialization_order(&self) -> Result<Vec<String>, CycleDetected> {
        let downstream = self.downstream();
        let mut in_degree: BTreeMap<&str, usize> =
            self.components.iter().map(|c| (c.as_str(), 0)).collect();
        for consumers in downstream.values() {
            for consumer in consumers {
                if let Some(deg) = in_degree.get_mut(consumer.as_str()) {
                    *deg += 1;
                }
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&c, _)| c)
            .collect();
        let mut sorted = Vec::with_capacity(self.components.len());

        while let Some(current) = ready.pop_first() {
            sorted.push(current.to_string());
            for consumer in downstream.get(current).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(consumer.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(consumer.as_str());
                    }
                }
            }
        }

        if sorted.len() == self.components.len() {
            return Ok(sorted);
        }

        Err(CycleDetected {
            order: self.components(),
            involved: self.cycle_members(&sorted, &downstream),
        })
    }

    /// Render the component relation as a Mermaid flowchart.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for (from, to) in self.component_edges() {
            out.push_str(&format!("    {from} --> {to}\n"));
        }
        out
    }

    /// `provider → {consumers}` at component level.
    fn downstream(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut downstream: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in self.component_edges() {
            downstream.entry(from).or_default().insert(to);
        }
        downstream
    }

    /// Components left over by Kahn's algorithm, minus those that merely hang
    /// off a cycle without reaching back into one.
    fn cycle_members(
        &self,
        sorted: &[String],
        downstream: &BTreeMap<String, BTreeSet<String>>,
    ) -> Vec<String> {
        let mut remaining: BTreeSet<String> = self
            .components
            .iter()
            .filter(|c| !sorted.contains(c))
            .cloned()
            .collect();

        loop {
            let sinks: Vec<String> = remaining
                .iter()
                .filter(|c| {
                    !downstream
                        .get(*c)
                        .into_iter()
                        .flatten()
                        .any(|next| remaining.contains(next))
                })
                .cloned()
                .collect();
            if sinks.is_empty() {
                break;
            }
            for sink in sinks {
                remaining.remove(&sink);
            }
        }

        remaining.into_iter().collect()
    }
}
