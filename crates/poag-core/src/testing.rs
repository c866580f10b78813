//! Fakes and fixtures shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::agent::{
    AgentError, AgentRequest, AgentResponse, AgentRunner, ClassifierError, ExplorationReport,
    ExplorationRequest, ExplorationRunner, RelevanceClassifier, RelevanceRequest,
};
use crate::node::{Manifest, ManifestEntry};
use crate::observer::MemoryReporter;
use crate::project::Project;
use crate::revision::StaticRevision;
use crate::workspace::Workspace;

pub(crate) struct Fixture {
    pub _dir: tempfile::TempDir,
    pub ws: Workspace,
    pub reporter: Arc<MemoryReporter>,
}

/// `root → svc → lib`, revision `r1`.
pub(crate) fn chain_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let project_dir = dir.path().join("project");
    for sub in ["svc", "lib"] {
        std::fs::create_dir_all(project_dir.join(sub)).unwrap();
    }
    let manifest = Manifest::new(vec![
        ManifestEntry::new("root", ".").depends_on(["svc"]),
        ManifestEntry::new("svc", "svc").depends_on(["lib"]),
        ManifestEntry::new("lib", "lib"),
    ]);
    let project = Project::from_manifest(&project_dir, &manifest).unwrap();
    let reporter = Arc::new(MemoryReporter::new());
    let ws = Workspace::new(
        project,
        &dir.path().join("state"),
        Arc::new(StaticRevision::new("r1")),
        reporter.clone(),
    );
    Fixture {
        _dir: dir,
        ws,
        reporter,
    }
}

pub(crate) struct FakeExplorer {
    sections: BTreeMap<String, String>,
    failure: Option<AgentError>,
    calls: AtomicUsize,
}

impl FakeExplorer {
    pub fn with_sections(sections: &[(&str, &str)]) -> Self {
        Self {
            sections: sections
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: AgentError) -> Self {
        Self {
            failure: Some(error),
            ..Self::with_sections(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplorationRunner for FakeExplorer {
    async fn explore(&self, request: ExplorationRequest) -> Result<ExplorationReport, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(ExplorationReport {
            session_id: Some(format!("sess-{}", request.node)),
            self_summary: format!("summary of {}", request.node),
            dependency_sections: self.sections.clone(),
        })
    }
}

/// Agent that answers with its prompt, fails, or never answers or panics
/// for some nodes.
pub(crate) struct FakeAgent {
    failure: Option<AgentError>,
    hang: BTreeSet<String>,
    panic: BTreeSet<String>,
    requests: Mutex<Vec<AgentRequest>>,
}

impl FakeAgent {
    pub fn echo() -> Self {
        Self {
            failure: None,
            hang: BTreeSet::new(),
            panic: BTreeSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: AgentError) -> Self {
        Self {
            failure: Some(error),
            ..Self::echo()
        }
    }

    pub fn hanging_on(nodes: &[&str]) -> Self {
        Self {
            hang: nodes.iter().map(|n| n.to_string()).collect(),
            ..Self::echo()
        }
    }

    pub fn panicking_on(nodes: &[&str]) -> Self {
        Self {
            panic: nodes.iter().map(|n| n.to_string()).collect(),
            ..Self::echo()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRunner for FakeAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.hang.contains(&request.node) {
            std::future::pending::<()>().await;
        }
        if self.panic.contains(&request.node) {
            panic!("agent crashed on {}", request.node);
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(AgentResponse {
            session_id: Some(format!("sess-{}", request.node)),
            result: request.prompt,
        })
    }
}

pub(crate) struct FakeClassifier {
    answer: Result<BTreeMap<String, String>, ClassifierError>,
    seen: Mutex<Vec<RelevanceRequest>>,
}

impl FakeClassifier {
    pub fn answering(pairs: &[(&str, &str)]) -> Self {
        Self {
            answer: Ok(pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ClassifierError) -> Self {
        Self {
            answer: Err(error),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<RelevanceRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelevanceClassifier for FakeClassifier {
    async fn classify(
        &self,
        request: RelevanceRequest,
    ) -> Result<BTreeMap<String, String>, ClassifierError> {
        self.seen.lock().unwrap().push(request);
        self.answer.clone()
    }
}
