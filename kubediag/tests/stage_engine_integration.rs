//! Integration tests for the stage engines.
//!
//! These tests drive abnormals through real engines backed by the in-memory
//! store, with a scripted transport standing in for external processors:
//! - Skipping, acceptance, rejection and exhaustion in the recovering stage
//! - Catalog ordering and assignment filtering
//! - Stale, foreign and deleted work items
//! - Embedded command executors recording their results
//! - Conflicting status writes
//! - A full agent run from a fresh abnormal to a terminal phase
//!
//! Run with: `cargo test --test stage_engine_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use kubediag::agent::{Agent, AgentConfig};
use kubediag::api::{
    get_condition, Abnormal, AbnormalPhase, AbnormalSpec, ConditionStatus, ConditionType,
    NamespacedName, ObjectKey, ObjectMeta, Processor, ProcessorSpec, ProcessorType, Scheme,
};
use kubediag::context::{ContextStore, ContextView};
use kubediag::embedded::EmbeddedProcessors;
use kubediag::engine::{
    DropReason, EventType, MemoryEventSink, Stage, StageEngine, StageEngineConfig, SyncOutcome,
};
use kubediag::processor::{ProcessorError, ProcessorTransport};
use kubediag::store::{InMemoryStore, ResourceStore, StoreError, WatchEvent};

// ============================================================================
// Test Helpers
// ============================================================================

const NODE: &str = "node1";
const PROCESSOR_NAMESPACE: &str = "kubediag";

/// How a scripted processor answers.
#[derive(Debug, Clone, Copy)]
enum Reply {
    /// Echo the abnormal with an added context key.
    AddContext,
    /// Echo the abnormal with its phase forged to Succeeded.
    ForgePhase,
    /// Fail as if the processor could not be reached.
    Unreachable,
}

/// Transport answering from a fixed script and recording every call.
#[derive(Default)]
struct ScriptedTransport {
    replies: HashMap<ObjectKey, Reply>,
    calls: Mutex<Vec<ObjectKey>>,
}

impl ScriptedTransport {
    fn with(replies: &[(&str, Reply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (processor_key(name), *reply))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<ObjectKey> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessorTransport for ScriptedTransport {
    async fn dispatch(&self, processor: &Processor, abnormal: &Abnormal) -> Result<Abnormal, ProcessorError> {
        let key = processor.key();
        self.calls.lock().unwrap().push(key.clone());

        let mut result = abnormal.clone();
        match self.replies.get(&key).copied().unwrap_or(Reply::Unreachable) {
            Reply::AddContext => {
                ContextStore::of(&mut result.status)
                    .set("finding", &format!("handled by {}", key.name))
                    .unwrap();
                Ok(result)
            }
            Reply::ForgePhase => {
                result.status.phase = Some(AbnormalPhase::Succeeded);
                Ok(result)
            }
            Reply::Unreachable => Err(ProcessorError::Request {
                url: format!("http://{}", key),
                message: "connection refused".to_string(),
            }),
        }
    }
}

fn processor_key(name: &str) -> ObjectKey {
    NamespacedName::new(PROCESSOR_NAMESPACE, name)
}

fn processor(kind: ProcessorType, name: &str) -> Processor {
    Processor::new(
        kind,
        ObjectMeta::named(PROCESSOR_NAMESPACE, name),
        ProcessorSpec {
            ip: "127.0.0.1".to_string(),
            port: 9,
            path: format!("/{}", name),
            scheme: Scheme::Http,
            timeout_seconds: Some(1),
        },
    )
}

fn abnormal_in(phase: Option<AbnormalPhase>, spec: AbnormalSpec) -> Abnormal {
    let mut abnormal = Abnormal::new(ObjectMeta::named("default", "disk-pressure"), spec);
    abnormal.status.phase = phase;
    abnormal
}

fn spec_on(node: &str) -> AbnormalSpec {
    AbnormalSpec {
        node_name: node.to_string(),
        ..AbnormalSpec::default()
    }
}

fn recovering(assigned: &[&str]) -> Abnormal {
    let mut spec = spec_on(NODE);
    spec.assigned_recoverers = assigned.iter().map(|name| processor_key(name)).collect();
    abnormal_in(Some(AbnormalPhase::Recovering), spec)
}

struct Harness<S> {
    store: Arc<S>,
    transport: Arc<ScriptedTransport>,
    events: Arc<MemoryEventSink>,
    engine: StageEngine<S, ScriptedTransport>,
}

fn harness(stage: Stage, transport: ScriptedTransport) -> Harness<InMemoryStore> {
    harness_with(stage, Arc::new(InMemoryStore::new()), transport, EmbeddedProcessors::disabled())
}

fn harness_with<S: ResourceStore>(
    stage: Stage,
    store: Arc<S>,
    transport: ScriptedTransport,
    embedded: EmbeddedProcessors,
) -> Harness<S> {
    let transport = Arc::new(transport);
    let events = Arc::new(MemoryEventSink::new());
    let (engine, _queue) = StageEngine::with_events(
        stage,
        StageEngineConfig::new(NODE),
        Arc::clone(&store),
        Arc::clone(&transport),
        embedded,
        events.clone(),
    );
    Harness {
        store,
        transport,
        events,
        engine,
    }
}

fn condition_status(abnormal: &Abnormal, condition: ConditionType) -> Option<ConditionStatus> {
    get_condition(&abnormal.status, condition).map(|(_, c)| c.status)
}

// ============================================================================
// Recovering stage scenarios
// ============================================================================

#[tokio::test]
async fn test_unassigned_recovery_succeeds_without_calls() {
    // GIVEN a recovering abnormal with no assigned recoverer and one catalogued
    let h = harness(Stage::Recovering, ScriptedTransport::with(&[("r1", Reply::AddContext)]));
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    let created = h.store.create_abnormal(recovering(&[])).unwrap();

    // WHEN the engine syncs it
    let outcome = h.engine.sync(&created.key()).await;

    // THEN it succeeds without contacting any processor
    assert!(matches!(outcome, SyncOutcome::Succeeded { by: None }));
    assert!(h.transport.calls().is_empty());

    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Succeeded));
    assert!(live.status.recoverable);
    assert!(live.status.recoverer.is_none());
    assert_eq!(condition_status(&live, ConditionType::Recovered), Some(ConditionStatus::True));

    let events = h.events.events_for(&created.key());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "SkippingRecovery");
    assert_eq!(h.engine.metrics().snapshot().sync_skip, 1);
}

#[tokio::test]
async fn test_skip_recovery_flag_succeeds_even_when_assigned() {
    let h = harness(Stage::Recovering, ScriptedTransport::with(&[("r1", Reply::AddContext)]));
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    let mut abnormal = recovering(&["r1"]);
    abnormal.spec.skip_recovery = true;
    let created = h.store.create_abnormal(abnormal).unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Succeeded { by: None }));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_accepted_result_resolves_recovery() {
    // GIVEN one assigned recoverer that adds a context key
    let h = harness(Stage::Recovering, ScriptedTransport::with(&[("r1", Reply::AddContext)]));
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    let created = h.store.create_abnormal(recovering(&["r1"])).unwrap();

    // WHEN the engine syncs it
    let outcome = h.engine.sync(&created.key()).await;

    // THEN the result is accepted and the recoverer recorded
    match outcome {
        SyncOutcome::Succeeded { by } => assert_eq!(by, Some(processor_key("r1"))),
        other => panic!("expected success, got {:?}", other),
    }

    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Succeeded));
    assert_eq!(live.status.recoverer, Some(processor_key("r1")));
    assert!(live.status.recoverable);

    let finding: Option<String> = ContextView::of(&live.status).get_as("finding").unwrap();
    assert_eq!(finding.as_deref(), Some("handled by r1"));

    let events = h.events.events_for(&created.key());
    assert_eq!(events[0].reason, "RecoverySucceeded");
    assert_eq!(events[0].event_type, EventType::Normal);
}

#[tokio::test]
async fn test_forged_phase_is_rejected_and_next_candidate_used() {
    // GIVEN a recoverer that forges the phase, followed by an honest one
    let h = harness(
        Stage::Recovering,
        ScriptedTransport::with(&[("r1", Reply::ForgePhase), ("r2", Reply::AddContext)]),
    );
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    h.store.put_processor(processor(ProcessorType::Recoverer, "r2")).unwrap();
    let created = h.store.create_abnormal(recovering(&["r1", "r2"])).unwrap();

    h.engine.sync(&created.key()).await;

    // THEN the second recoverer resolves it
    assert_eq!(h.transport.calls(), vec![processor_key("r1"), processor_key("r2")]);
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Succeeded));
    assert_eq!(live.status.recoverer, Some(processor_key("r2")));
}

#[tokio::test]
async fn test_forged_phase_without_alternative_fails() {
    let h = harness(Stage::Recovering, ScriptedTransport::with(&[("r1", Reply::ForgePhase)]));
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    let created = h.store.create_abnormal(recovering(&["r1"])).unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Failed));
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Failed));
    assert!(live.status.recoverer.is_none());
}

#[tokio::test]
async fn test_unreachable_recoverers_fail_with_minimal_changes() {
    // GIVEN two assigned recoverers that cannot be reached
    let h = harness(Stage::Recovering, ScriptedTransport::default());
    h.store.put_processor(processor(ProcessorType::Recoverer, "r1")).unwrap();
    h.store.put_processor(processor(ProcessorType::Recoverer, "r2")).unwrap();
    let created = h.store.create_abnormal(recovering(&["r1", "r2"])).unwrap();

    // WHEN the engine syncs it
    let outcome = h.engine.sync(&created.key()).await;

    // THEN it fails after trying both, touching only phase, flag and conditions
    assert!(matches!(outcome, SyncOutcome::Failed));
    assert_eq!(h.transport.calls().len(), 2);

    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    let mut expected = created.status.clone();
    expected.phase = Some(AbnormalPhase::Failed);
    expected.recoverable = false;
    expected.conditions = live.status.conditions.clone();
    assert_eq!(live.status, expected);
    assert_eq!(condition_status(&live, ConditionType::Recovered), Some(ConditionStatus::False));

    let events = h.events.events_for(&created.key());
    assert_eq!(events[0].reason, "RecoveryFailed");
    assert_eq!(events[0].event_type, EventType::Warning);

    let metrics = h.engine.metrics().snapshot();
    assert_eq!(metrics.sync_fail, 1);
    assert_eq!(metrics.sync_success, 1);
}

#[tokio::test]
async fn test_catalog_order_wins_over_assignment_order() {
    // GIVEN assignments listed in reverse catalog order
    let h = harness(
        Stage::Recovering,
        ScriptedTransport::with(&[("a-recoverer", Reply::AddContext), ("b-recoverer", Reply::AddContext)]),
    );
    h.store.put_processor(processor(ProcessorType::Recoverer, "b-recoverer")).unwrap();
    h.store.put_processor(processor(ProcessorType::Recoverer, "a-recoverer")).unwrap();
    h.store.put_processor(processor(ProcessorType::Recoverer, "unassigned")).unwrap();
    let created = h
        .store
        .create_abnormal(recovering(&["b-recoverer", "a-recoverer"]))
        .unwrap();

    h.engine.sync(&created.key()).await;

    // THEN the first catalogued assigned processor is asked first and wins
    assert_eq!(h.transport.calls(), vec![processor_key("a-recoverer")]);
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.status.recoverer, Some(processor_key("a-recoverer")));
}

// ============================================================================
// Other stages
// ============================================================================

#[tokio::test]
async fn test_unassigned_diagnosis_moves_to_recovering() {
    let h = harness(Stage::Diagnosing, ScriptedTransport::default());
    let created = h
        .store
        .create_abnormal(abnormal_in(Some(AbnormalPhase::Diagnosing), spec_on(NODE)))
        .unwrap();

    h.engine.sync(&created.key()).await;

    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Recovering));
    assert!(live.status.identifiable);
    assert_eq!(condition_status(&live, ConditionType::Identified), Some(ConditionStatus::True));
}

#[tokio::test]
async fn test_failed_information_collection_still_moves_to_diagnosing() {
    // GIVEN no assignment, so every catalogued collector is eligible
    let h = harness(Stage::InformationCollecting, ScriptedTransport::default());
    h.store
        .put_processor(processor(ProcessorType::InformationCollector, "c1"))
        .unwrap();
    let created = h
        .store
        .create_abnormal(abnormal_in(Some(AbnormalPhase::InformationCollecting), spec_on("")))
        .unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Failed));
    assert_eq!(h.transport.calls(), vec![processor_key("c1")]);
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Diagnosing));
    assert_eq!(
        condition_status(&live, ConditionType::InformationCollected),
        Some(ConditionStatus::False)
    );
}

#[tokio::test]
async fn test_information_collection_without_collectors_is_skipped() {
    // GIVEN no assignment and an empty collector catalog
    let h = harness(Stage::InformationCollecting, ScriptedTransport::default());
    let created = h
        .store
        .create_abnormal(abnormal_in(Some(AbnormalPhase::InformationCollecting), spec_on(NODE)))
        .unwrap();

    // WHEN the engine syncs it
    let outcome = h.engine.sync(&created.key()).await;

    // THEN the stage succeeds without calling anything
    assert!(matches!(outcome, SyncOutcome::Succeeded { by: None }));
    assert!(h.transport.calls().is_empty());
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Diagnosing));
    assert_eq!(
        condition_status(&live, ConditionType::InformationCollected),
        Some(ConditionStatus::True)
    );

    let events = h.events.events_for(&created.key());
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason, "SkippingInformationCollection");
    assert_eq!(events[0].event_type, EventType::Normal);

    let metrics = h.engine.metrics().snapshot();
    assert_eq!(metrics.sync_skip, 1);
    assert_eq!(metrics.sync_fail, 0);
}

#[tokio::test]
async fn test_assigned_diagnoser_missing_from_catalog_is_skipped() {
    let h = harness(Stage::Diagnosing, ScriptedTransport::default());
    h.store.put_processor(processor(ProcessorType::Diagnoser, "d1")).unwrap();
    let mut spec = spec_on(NODE);
    spec.assigned_diagnosers = vec![processor_key("gone")];
    let created = h
        .store
        .create_abnormal(abnormal_in(Some(AbnormalPhase::Diagnosing), spec))
        .unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Succeeded { by: None }));
    assert!(h.transport.calls().is_empty());
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Recovering));
    assert!(live.status.identifiable);
    assert!(live.status.diagnoser.is_none());
}

// ============================================================================
// Dropped work
// ============================================================================

#[tokio::test]
async fn test_foreign_node_is_dropped() {
    let h = harness(Stage::Recovering, ScriptedTransport::default());
    let mut abnormal = recovering(&[]);
    abnormal.spec.node_name = "node2".to_string();
    let created = h.store.create_abnormal(abnormal).unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Dropped(DropReason::NodeMismatch)));
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live, created);
}

#[tokio::test]
async fn test_stale_phase_is_dropped() {
    let h = harness(Stage::Recovering, ScriptedTransport::default());
    let created = h
        .store
        .create_abnormal(abnormal_in(Some(AbnormalPhase::Diagnosing), spec_on(NODE)))
        .unwrap();

    let outcome = h.engine.sync(&created.key()).await;

    assert!(matches!(outcome, SyncOutcome::Dropped(DropReason::PhaseMismatch)));
    assert!(h.events.events().is_empty());
}

#[tokio::test]
async fn test_deleted_abnormal_is_dropped() {
    let h = harness(Stage::Recovering, ScriptedTransport::default());

    let outcome = h.engine.sync(&NamespacedName::new("default", "gone")).await;

    assert!(matches!(outcome, SyncOutcome::Dropped(DropReason::NotFound)));
    assert_eq!(h.engine.metrics().snapshot().sync_error, 0);
}

// ============================================================================
// Embedded processors
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_embedded_failure_is_recorded_and_stage_continues() {
    use kubediag::api::CommandExecutorSpec;
    use kubediag::embedded::{DisabledProfilerRunner, LocalCommandRunner};

    // GIVEN a failing and a succeeding command for the recovering stage
    let embedded = EmbeddedProcessors::new(
        Arc::new(LocalCommandRunner::new()),
        Arc::new(DisabledProfilerRunner),
    );
    let h = harness_with(
        Stage::Recovering,
        Arc::new(InMemoryStore::new()),
        ScriptedTransport::default(),
        embedded,
    );
    let mut abnormal = recovering(&[]);
    abnormal.spec.command_executors = vec![
        CommandExecutorSpec {
            command: vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()],
            processor_type: ProcessorType::Recoverer,
            timeout_seconds: Some(5),
        },
        CommandExecutorSpec {
            command: vec!["echo".to_string(), "cleaned".to_string()],
            processor_type: ProcessorType::Recoverer,
            timeout_seconds: Some(5),
        },
        CommandExecutorSpec {
            command: vec!["echo".to_string(), "not this stage".to_string()],
            processor_type: ProcessorType::Diagnoser,
            timeout_seconds: None,
        },
    ];
    let created = h.store.create_abnormal(abnormal).unwrap();

    // WHEN the engine syncs it
    let outcome = h.engine.sync(&created.key()).await;

    // THEN both results are recorded and the stage still succeeds
    assert!(matches!(outcome, SyncOutcome::Succeeded { .. }));
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.status.command_executors.len(), 2);
    assert!(!live.status.command_executors[0].error.is_empty());
    assert!(live.status.command_executors[1].error.is_empty());
    assert_eq!(live.status.command_executors[1].stdout, "cleaned\n");

    let metrics = h.engine.metrics().snapshot();
    assert_eq!(metrics.command_executor_success, 1);
    assert_eq!(metrics.command_executor_fail, 1);
}

// ============================================================================
// Conflicting writes
// ============================================================================

/// Store that rejects the first status updates as conflicting.
struct ConflictingStore {
    inner: InMemoryStore,
    conflicts_left: AtomicUsize,
}

impl ResourceStore for ConflictingStore {
    async fn get_abnormal(&self, key: &ObjectKey) -> Result<Abnormal, StoreError> {
        self.inner.get_abnormal(key).await
    }

    async fn list_abnormals(&self) -> Result<Vec<Abnormal>, StoreError> {
        self.inner.list_abnormals().await
    }

    async fn list_processors(&self, kind: ProcessorType) -> Result<Vec<Processor>, StoreError> {
        self.inner.list_processors(kind).await
    }

    async fn update_abnormal_status(&self, abnormal: &Abnormal) -> Result<Abnormal, StoreError> {
        let left = self.conflicts_left.load(Ordering::SeqCst);
        if left > 0 {
            self.conflicts_left.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict {
                key: abnormal.key(),
                given: abnormal.metadata.resource_version.clone(),
                current: "newer".to_string(),
            });
        }
        self.inner.update_abnormal_status(abnormal).await
    }

    fn watch_abnormals(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch_abnormals()
    }

    async fn wait_for_sync(&self, shutdown: &CancellationToken) -> bool {
        self.inner.wait_for_sync(shutdown).await
    }
}

#[tokio::test]
async fn test_conflict_is_requeued_immediately_then_succeeds() {
    let store = Arc::new(ConflictingStore {
        inner: InMemoryStore::new(),
        conflicts_left: AtomicUsize::new(1),
    });
    let created = store.inner.create_abnormal(recovering(&[])).unwrap();
    let h = harness_with(
        Stage::Recovering,
        Arc::clone(&store),
        ScriptedTransport::default(),
        EmbeddedProcessors::disabled(),
    );

    let first = h.engine.sync(&created.key()).await;
    assert!(matches!(first, SyncOutcome::Requeued { delayed: false, .. }));
    assert!(h.events.events().is_empty());

    let second = h.engine.sync(&created.key()).await;
    assert!(matches!(second, SyncOutcome::Succeeded { .. }));

    let metrics = h.engine.metrics().snapshot();
    assert_eq!(metrics.sync_error, 1);
    assert_eq!(metrics.sync_success, 1);
    let live = h.store.get_abnormal(&created.key()).await.unwrap();
    assert_eq!(live.phase(), Some(AbnormalPhase::Succeeded));
}

// ============================================================================
// Full agent
// ============================================================================

#[tokio::test]
async fn test_agent_drives_new_abnormal_to_success() {
    // GIVEN a fresh abnormal assigned to one diagnoser and no recoverer
    let store = Arc::new(InMemoryStore::new());
    store.put_processor(processor(ProcessorType::Diagnoser, "d1")).unwrap();
    let mut spec = spec_on(NODE);
    spec.assigned_diagnosers = vec![processor_key("d1")];
    let created = store.create_abnormal(abnormal_in(None, spec)).unwrap();

    let transport = Arc::new(ScriptedTransport::with(&[("d1", Reply::AddContext)]));
    let events = Arc::new(MemoryEventSink::new());
    let agent = Agent::with_transport(
        AgentConfig::new(NODE),
        Arc::clone(&store),
        Arc::clone(&transport),
        events.clone(),
    );
    let metrics = agent.metrics();

    // WHEN the agent runs
    let mut watch = store.watch_abnormals();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(agent.run(shutdown.clone()));

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let live = store.get_abnormal(&created.key()).await.unwrap();
            if live.is_finished() {
                return live;
            }
            let _ = watch.recv().await;
        }
    })
    .await
    .expect("abnormal did not finish");

    shutdown.cancel();
    handle.await.unwrap().unwrap();

    // THEN it passed every stage in order
    assert_eq!(finished.phase(), Some(AbnormalPhase::Succeeded));
    assert!(finished.status.start_time.is_some());
    assert_eq!(finished.status.diagnoser, Some(processor_key("d1")));
    assert!(finished.status.identifiable);
    assert!(finished.status.recoverable);

    let condition_types: Vec<ConditionType> = finished
        .status
        .conditions
        .iter()
        .map(|c| c.condition_type)
        .collect();
    assert_eq!(
        condition_types,
        vec![
            ConditionType::InformationCollected,
            ConditionType::Identified,
            ConditionType::Recovered
        ]
    );

    let reasons: Vec<String> = events
        .events_for(&created.key())
        .into_iter()
        .map(|e| e.reason)
        .collect();
    assert_eq!(
        reasons,
        vec!["SkippingInformationCollection", "DiagnosisSucceeded", "SkippingRecovery"]
    );
    assert_eq!(
        metrics.stage(Stage::Diagnosing).map(|s| s.sync_success),
        Some(1)
    );
}
