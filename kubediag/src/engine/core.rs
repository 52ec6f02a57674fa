//! The stage engine: one consumer loop per pipeline stage.
//!
//! # Sync algorithm
//!
//! ```text
//!  key ──► get_abnormal ──NotFound──► drop
//!              │ other error ──► requeue after delay
//!              ▼
//!         phase == stage? ──no──► drop (stale)
//!              ▼
//!         node matches?  ──no──► drop
//!              ▼
//!         embedded processors of the stage (best effort, results recorded)
//!              ▼
//!         skip flag / nothing assigned? ──yes──► resolve without processor
//!              ▼
//!         list catalog ──error──► requeue after delay
//!              ▼
//!         nothing eligible? ──yes──► resolve without processor
//!              ▼
//!         for each eligible processor, in catalog order:
//!             dispatch ──error──► next
//!             validate ──reject──► next
//!             accept ──► resolve by this processor
//!              ▼
//!         exhausted ──► fail the stage
//! ```
//!
//! Resolving or failing writes the status back. A conflicting write is
//! retried at once; any other store error is retried after the queue's
//! delay. Abnormals are processed strictly one at a time per stage.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{Event, EventSink, TracingEventSink};
use super::metrics::StageMetrics;
use super::stage::{Stage, StageConfig};
use crate::api::{
    update_condition, Abnormal, AbnormalCondition, ConditionStatus, NamespacedName, ObjectKey,
    Processor,
};
use crate::embedded::EmbeddedProcessors;
use crate::processor::ProcessorTransport;
use crate::queue::{StageQueue, DEFAULT_CHANNEL_CAPACITY, DEFAULT_RETRY_DELAY};
use crate::store::{ResourceStore, StoreError};
use crate::validation::validate_result;

// =============================================================================
// Configuration
// =============================================================================

/// Settings shared by every stage engine of an agent.
#[derive(Debug, Clone)]
pub struct StageEngineConfig {
    /// Node this agent runs on.
    pub node_name: String,
    /// Capacity of the stage queue.
    pub channel_capacity: usize,
    /// Delay before a delayed retry.
    pub retry_delay: Duration,
}

impl StageEngineConfig {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Returns whether an abnormal targeting `target` may be processed on `node`.
///
/// An empty target matches every node.
pub fn is_node_matched(target: &str, node: &str) -> bool {
    target.is_empty() || target == node
}

// =============================================================================
// Outcomes
// =============================================================================

/// Store failures that interrupt a sync.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to fetch abnormal: {0}")]
    Fetch(#[source] StoreError),

    #[error("failed to list processors: {0}")]
    ListProcessors(#[source] StoreError),

    #[error("failed to update abnormal status: {0}")]
    UpdateStatus(#[source] StoreError),
}

/// Why a queued key was not acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The abnormal no longer exists.
    NotFound,
    /// The abnormal is in another stage's phase.
    PhaseMismatch,
    /// The abnormal targets another node.
    NodeMismatch,
}

/// Result of syncing one queued key.
#[derive(Debug)]
pub enum SyncOutcome {
    Dropped(DropReason),
    /// The stage was resolved; `by` is the accepting processor, or `None`
    /// when no processor was needed.
    Succeeded { by: Option<NamespacedName> },
    /// No processor produced an acceptable result.
    Failed,
    /// A store error interrupted the sync and the key was queued again.
    Requeued { error: EngineError, delayed: bool },
}

enum Resolution {
    Skipped,
    Resolved(NamespacedName),
    Exhausted,
}

// =============================================================================
// Stage Engine
// =============================================================================

/// Drives abnormals in one stage's phase to the next phase.
pub struct StageEngine<S, T> {
    worker: StageWorker<S, T>,
    rx: mpsc::Receiver<ObjectKey>,
}

struct StageWorker<S, T> {
    config: &'static StageConfig,
    node_name: String,
    store: Arc<S>,
    transport: Arc<T>,
    embedded: EmbeddedProcessors,
    events: Arc<dyn EventSink>,
    metrics: Arc<StageMetrics>,
    queue: StageQueue,
}

impl<S, T> StageEngine<S, T>
where
    S: ResourceStore,
    T: ProcessorTransport,
{
    /// Creates an engine and the queue feeding it, logging events via `tracing`.
    pub fn new(
        stage: Stage,
        config: StageEngineConfig,
        store: Arc<S>,
        transport: Arc<T>,
        embedded: EmbeddedProcessors,
    ) -> (Self, StageQueue) {
        Self::with_events(stage, config, store, transport, embedded, Arc::new(TracingEventSink))
    }

    /// Creates an engine with a custom event sink.
    pub fn with_events(
        stage: Stage,
        config: StageEngineConfig,
        store: Arc<S>,
        transport: Arc<T>,
        embedded: EmbeddedProcessors,
        events: Arc<dyn EventSink>,
    ) -> (Self, StageQueue) {
        let stage_config = stage.config();
        let (queue, rx) = StageQueue::new(stage_config.name, config.channel_capacity, config.retry_delay);

        let worker = StageWorker {
            config: stage_config,
            node_name: config.node_name,
            store,
            transport,
            embedded,
            events,
            metrics: Arc::new(StageMetrics::new()),
            queue: queue.clone(),
        };

        (Self { worker, rx }, queue)
    }

    pub fn stage(&self) -> Stage {
        self.worker.config.stage
    }

    /// Shared handle to the engine's counters.
    pub fn metrics(&self) -> Arc<StageMetrics> {
        Arc::clone(&self.worker.metrics)
    }

    /// Syncs one key. The run loop calls this for every dequeued key.
    pub async fn sync(&self, key: &ObjectKey) -> SyncOutcome {
        self.worker.sync(key).await
    }

    /// Runs until `shutdown` fires.
    ///
    /// Nothing is processed before the store reports itself synced. A sync
    /// in progress when shutdown fires runs to completion.
    pub async fn run(self, shutdown: CancellationToken) {
        let Self { worker, mut rx } = self;
        let stage = worker.config.name;

        info!(stage, node = %worker.node_name, "Stage engine starting");

        if !worker.store.wait_for_sync(&shutdown).await {
            info!(stage, "Stage engine stopped before store sync");
            return;
        }

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(stage, "Stage engine shutting down");
                    break;
                }

                key = rx.recv() => {
                    let Some(key) = key else { break };
                    let outcome = worker.sync(&key).await;
                    debug!(stage, abnormal = %key, outcome = ?outcome, "Sync finished");
                }
            }
        }

        info!(stage, "Stage engine stopped");
    }
}

impl<S, T> StageWorker<S, T>
where
    S: ResourceStore,
    T: ProcessorTransport,
{
    async fn sync(&self, key: &ObjectKey) -> SyncOutcome {
        let stage = self.config.name;

        let abnormal = match self.store.get_abnormal(key).await {
            Ok(abnormal) => abnormal,
            Err(e) if e.is_not_found() => return SyncOutcome::Dropped(DropReason::NotFound),
            Err(e) => return self.requeue(key, EngineError::Fetch(e), true),
        };

        if abnormal.phase() != Some(self.config.phase) {
            return SyncOutcome::Dropped(DropReason::PhaseMismatch);
        }
        if !is_node_matched(&abnormal.spec.node_name, &self.node_name) {
            return SyncOutcome::Dropped(DropReason::NodeMismatch);
        }

        info!(stage, abnormal = %key, "Starting to sync abnormal");
        self.process(abnormal).await
    }

    async fn process(&self, mut abnormal: Abnormal) -> SyncOutcome {
        let key = abnormal.key();
        let stage = self.config.name;

        let embedded = self
            .embedded
            .run_stage(self.config.processor_type, &mut abnormal)
            .await;
        self.metrics.record_embedded(&embedded);

        let assigned = abnormal.spec.assigned(self.config.processor_type);
        let skip_flag = self.config.honors_skip_recovery && abnormal.spec.skip_recovery;
        if skip_flag || (self.config.skip_when_unassigned && assigned.is_empty()) {
            info!(stage, abnormal = %key, skip_flag, "No processor needed, resolving stage");
            return self.finish(abnormal, Resolution::Skipped).await;
        }

        let catalog = match self.store.list_processors(self.config.processor_type).await {
            Ok(catalog) => catalog,
            Err(e) => return self.requeue(&key, EngineError::ListProcessors(e), true),
        };

        let assigned = assigned.to_vec();
        let eligible: Vec<&Processor> = catalog
            .iter()
            .filter(|p| is_eligible(p, &assigned))
            .collect();
        if eligible.is_empty() {
            info!(stage, abnormal = %key, "No eligible processor, resolving stage");
            return self.finish(abnormal, Resolution::Skipped).await;
        }

        for processor in eligible {
            let processor_key = processor.key();
            debug!(stage, abnormal = %key, processor = %processor_key, "Running processor");

            let result = match self.transport.dispatch(processor, &abnormal).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(stage, abnormal = %key, processor = %processor_key, error = %e, "Processor call failed");
                    continue;
                }
            };

            if let Err(e) = validate_result(&result, &abnormal) {
                warn!(stage, abnormal = %key, processor = %processor_key, error = %e, "Invalid result from processor");
                continue;
            }

            abnormal.status = result.status;
            return self.finish(abnormal, Resolution::Resolved(processor_key)).await;
        }

        self.finish(abnormal, Resolution::Exhausted).await
    }

    /// Applies the stage transition and writes the status back.
    async fn finish(&self, mut abnormal: Abnormal, resolution: Resolution) -> SyncOutcome {
        let config = self.config;
        let key = abnormal.key();

        let succeeded = !matches!(resolution, Resolution::Exhausted);
        let by = match &resolution {
            Resolution::Resolved(by) => Some(by.clone()),
            _ => None,
        };

        let status = &mut abnormal.status;
        status.phase = Some(if succeeded {
            config.success_phase
        } else {
            config.failure_phase
        });
        if let Some(resolver) = config.resolver {
            resolver.apply(status, succeeded, by.clone());
        }
        let condition_status = if succeeded {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        update_condition(status, AbnormalCondition::new(config.condition, condition_status));

        if let Err(e) = self.store.update_abnormal_status(&abnormal).await {
            let delayed = !e.is_conflict();
            return self.requeue(&key, EngineError::UpdateStatus(e), delayed);
        }

        info!(
            stage = config.name,
            abnormal = %key,
            phase = ?abnormal.status.phase,
            "Stage finished"
        );

        let event = match resolution {
            Resolution::Skipped => {
                self.metrics.sync_skipped();
                Event::normal(
                    key.clone(),
                    config.skipped_reason(),
                    format!("Skipping {} stage, no eligible processor", config.name),
                )
            }
            Resolution::Resolved(ref by) => Event::normal(
                key.clone(),
                config.succeeded_reason(),
                format!("Abnormal processed by {}", by),
            ),
            Resolution::Exhausted => {
                self.metrics.sync_failed();
                Event::warning(
                    key.clone(),
                    config.failed_reason(),
                    format!("No {} processed abnormal {}", config.processor_type, key),
                )
            }
        };
        self.events.emit(event);
        self.metrics.sync_succeeded();

        if succeeded {
            SyncOutcome::Succeeded { by }
        } else {
            SyncOutcome::Failed
        }
    }

    fn requeue(&self, key: &ObjectKey, error: EngineError, delayed: bool) -> SyncOutcome {
        self.metrics.sync_errored();
        warn!(stage = self.config.name, abnormal = %key, error = %error, delayed, "Requeuing abnormal");

        if delayed {
            self.queue.requeue_after_delay(key.clone());
        } else {
            self.queue.requeue(key.clone());
        }
        SyncOutcome::Requeued { error, delayed }
    }
}

/// A processor is eligible when nothing is assigned or it is assigned.
fn is_eligible(processor: &Processor, assigned: &[NamespacedName]) -> bool {
    assigned.is_empty() || assigned.contains(&processor.key())
}
