//! End-to-end runs of the orchestration engine against fake agents.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use poag_core::{
    AgentError, AgentRequest, AgentResponse, AgentRunner, ClassifierError, ConsolidatedOutput,
    ExplorationReport, ExplorationRequest, ExplorationRunner, Manifest, ManifestEntry,
    MemoryReporter, OrchestrationEngine, OrchestrationEvent, Project, RelevanceClassifier,
    RelevanceRequest, StaticRevision, Workspace,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingExplorer {
    explored: Mutex<Vec<String>>,
}

impl RecordingExplorer {
    fn explored(&self) -> Vec<String> {
        self.explored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExplorationRunner for RecordingExplorer {
    async fn explore(&self, request: ExplorationRequest) -> Result<ExplorationReport, AgentError> {
        self.explored.lock().unwrap().push(request.node.clone());
        let dependency_sections = request
            .dependencies
            .iter()
            .map(|dep| (dep.clone(), format!("{} needs {dep}", request.node)))
            .collect();
        Ok(ExplorationReport {
            session_id: Some(format!("session-{}", request.node)),
            self_summary: format!("{} summary", request.node),
            dependency_sections,
        })
    }
}

#[derive(Default)]
struct RecordingAgent {
    requests: Mutex<Vec<AgentRequest>>,
}

impl RecordingAgent {
    fn nodes(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.node.clone())
            .collect()
    }
}

#[async_trait]
impl AgentRunner for RecordingAgent {
    async fn run(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(AgentResponse {
            session_id: request.resume_session.clone(),
            result: format!("plan for {}", request.node),
        })
    }
}

struct FixedClassifier(Result<BTreeMap<String, String>, ClassifierError>);

#[async_trait]
impl RelevanceClassifier for FixedClassifier {
    async fn classify(
        &self,
        _request: RelevanceRequest,
    ) -> Result<BTreeMap<String, String>, ClassifierError> {
        self.0.clone()
    }
}

fn only(node: &str, instruction: &str) -> Arc<FixedClassifier> {
    Arc::new(FixedClassifier(Ok(BTreeMap::from([(
        node.to_string(),
        instruction.to_string(),
    )]))))
}

// ---------------------------------------------------------------------------
// Fixture: root → svc → lib
// ---------------------------------------------------------------------------

struct Harness {
    dir: tempfile::TempDir,
    ws: Workspace,
    reporter: Arc<MemoryReporter>,
    explorer: Arc<RecordingExplorer>,
    agent: Arc<RecordingAgent>,
}

fn workspace(root: &Path, state: &Path, revision: &str, reporter: Arc<MemoryReporter>) -> Workspace {
    let manifest = Manifest::new(vec![
        ManifestEntry::new("root", ".").depends_on(["svc"]),
        ManifestEntry::new("svc", "svc").depends_on(["lib"]),
        ManifestEntry::new("lib", "lib"),
    ]);
    let project = Project::from_manifest(root, &manifest).unwrap();
    Workspace::new(project, state, Arc::new(StaticRevision::new(revision)), reporter)
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("project");
    std::fs::create_dir_all(root.join("svc")).unwrap();
    std::fs::create_dir_all(root.join("lib")).unwrap();
    let reporter = Arc::new(MemoryReporter::new());
    let ws = workspace(&root, &dir.path().join("state"), "rev-1", reporter.clone());
    Harness {
        dir,
        ws,
        reporter,
        explorer: Arc::new(RecordingExplorer::default()),
        agent: Arc::new(RecordingAgent::default()),
    }
}

impl Harness {
    fn engine(&self) -> OrchestrationEngine {
        OrchestrationEngine::new(self.ws.clone(), self.explorer.clone(), self.agent.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_routed_to_svc_plans_only_svc() {
    let h = harness();
    let engine = h.engine().with_classifier(only("svc", "X for svc"));

    let state = engine.run("X").await.unwrap();

    assert_eq!(state.relevant_nodes, vec!["svc"]);
    assert_eq!(h.explorer.explored(), vec!["svc"]);
    assert!(!h.ws.is_initialized("lib"));
    assert!(!state.queried_nodes.contains(&"lib".to_string()));

    // Phase 2 looked for root's input contract about svc and found none.
    assert!(h.reporter.events().contains(&OrchestrationEvent::ContractGap {
        provider: "svc".into(),
        dependent: "root".into(),
    }));

    match state.consolidated_output.unwrap() {
        ConsolidatedOutput::Plan(report) => {
            assert_eq!(report.plans.keys().collect::<Vec<_>>(), vec!["svc"]);
            assert_eq!(report.plans["svc"], "plan for svc");
            assert_eq!(report.request, "X");
            assert_eq!(report.next_steps.len(), 5);
        }
        other => panic!("expected plans, got {other:?}"),
    }
}

#[tokio::test]
async fn second_run_skips_initialization() {
    let h = harness();
    let engine = h.engine().with_classifier(only("svc", "X"));
    engine.run("X").await.unwrap();
    engine.run("X again").await.unwrap();

    assert_eq!(h.explorer.explored(), vec!["svc"]);
    assert!(h.reporter.events().contains(&OrchestrationEvent::InitSkipped {
        node: "svc".into(),
        reason: poag_core::observer::InitSkip::AlreadyInitialized,
    }));
}

#[tokio::test]
async fn planning_resumes_exploration_session() {
    let h = harness();
    let engine = h.engine().with_classifier(only("svc", "X"));
    engine.run("X").await.unwrap();

    let requests = h.agent.requests.lock().unwrap().clone();
    let plan = requests.iter().find(|r| r.node == "svc").unwrap();
    assert_eq!(plan.resume_session.as_deref(), Some("session-svc"));
    assert!(plan.workdir.ends_with("svc"));
}

#[tokio::test]
async fn unavailable_classifier_routes_to_every_non_root_node() {
    let h = harness();
    let engine = h.engine().with_classifier(Arc::new(FixedClassifier(Err(
        ClassifierError::Unavailable("connection refused".into()),
    ))));

    let state = engine.run("Add X").await.unwrap();

    assert_eq!(state.relevant_nodes, vec!["lib", "svc"]);
    assert_eq!(state.per_node_instruction["lib"], "Add X");
    assert_eq!(state.per_node_instruction["svc"], "Add X");
    // lib initializes before svc.
    assert_eq!(h.explorer.explored(), vec!["lib", "svc"]);
}

#[tokio::test]
async fn provider_answers_consumer_when_both_are_relevant() {
    let h = harness();
    let engine = h.engine();
    engine.run("Add X").await.unwrap();

    let lib = h.ws.contracts("lib").unwrap();
    assert_eq!(lib.read_output_contract("svc").as_deref(), Some("plan for lib"));
    let svc = h.ws.contracts("svc").unwrap();
    assert_eq!(svc.read_input_contract("lib").as_deref(), Some("svc needs lib"));
    let index = svc.load_index().unwrap();
    assert_eq!(index.inputs, vec!["lib.md"]);
    assert!(h.agent.nodes().contains(&"lib".to_string()));
}

#[tokio::test]
async fn revision_change_reexplores_after_clear() {
    let h = harness();
    h.engine().with_classifier(only("svc", "X")).run("X").await.unwrap();
    assert!(h.ws.contracts("svc").unwrap().are_contracts_current());

    // A new revision makes the index stale even though every file is present.
    let reporter = Arc::new(MemoryReporter::new());
    let moved = workspace(
        h.ws.project.root(),
        &h.dir.path().join("state"),
        "rev-2",
        reporter,
    );
    assert!(!moved.contracts("svc").unwrap().are_contracts_current());

    poag_core::clear(&moved, Some("svc")).unwrap();
    let explorer = Arc::new(RecordingExplorer::default());
    OrchestrationEngine::new(moved.clone(), explorer.clone(), h.agent.clone())
        .with_classifier(only("svc", "X"))
        .run("X")
        .await
        .unwrap();
    assert_eq!(explorer.explored(), vec!["svc"]);
    let index = moved.contracts("svc").unwrap().load_index().unwrap();
    assert_eq!(index.last_revision, "rev-2");
}

#[tokio::test]
async fn revision_change_reexplores_checkpointed_nodes() {
    let h = harness();
    h.engine().run("Add X").await.unwrap();
    assert_eq!(h.explorer.explored(), vec!["lib", "svc"]);

    let reporter = Arc::new(MemoryReporter::new());
    let moved = workspace(
        h.ws.project.root(),
        &h.dir.path().join("state"),
        "rev-2",
        reporter.clone(),
    );
    assert!(moved.is_initialized("svc"));
    assert!(!moved.contracts("svc").unwrap().are_contracts_current());

    let explorer = Arc::new(RecordingExplorer::default());
    OrchestrationEngine::new(moved.clone(), explorer.clone(), h.agent.clone())
        .run("Add X")
        .await
        .unwrap();

    assert_eq!(explorer.explored(), vec!["lib", "svc"]);
    assert!(reporter.events().iter().any(|e| matches!(
        e,
        OrchestrationEvent::InitStale { node, .. } if node == "svc"
    )));
    for node in ["lib", "svc"] {
        let store = moved.contracts(node).unwrap();
        assert_eq!(store.load_index().unwrap().last_revision, "rev-2");
        assert!(store.are_contracts_current());
    }
    let lib = moved.contracts("lib").unwrap().load_index().unwrap();
    assert_eq!(lib.output_sources["svc"].revision, "rev-2");
}

#[tokio::test]
async fn empty_routing_reports_error_output() {
    let h = harness();
    let engine = h
        .engine()
        .with_classifier(Arc::new(FixedClassifier(Ok(BTreeMap::new()))));
    let state = engine.run("nothing to do").await.unwrap();

    let json = serde_json::to_value(state.consolidated_output.unwrap()).unwrap();
    assert_eq!(json["error"], "No plans generated");
    assert_eq!(json["queriedNodes"], serde_json::json!([]));
}

#[tokio::test]
async fn unwritable_state_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("project");
    std::fs::create_dir_all(root.join("svc")).unwrap();
    let blocker = dir.path().join("state");
    std::fs::write(&blocker, "not a directory").unwrap();

    let ws = workspace(&root, &blocker, "rev-1", Arc::new(MemoryReporter::new()));
    let engine = OrchestrationEngine::new(
        ws,
        Arc::new(RecordingExplorer::default()),
        Arc::new(RecordingAgent::default()),
    )
    .with_classifier(only("svc", "X"));

    assert!(engine.run("X").await.is_err());
}
