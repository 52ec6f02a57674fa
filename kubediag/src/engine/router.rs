//! Routes abnormals to the stage matching their phase.
//!
//! The router lists every abnormal once the store is synced, then follows the
//! watch stream. Each observed abnormal is either initialized (no phase yet)
//! or enqueued to the queue of the stage that owns its phase. Abnormals in a
//! terminal phase are left alone.
//!
//! ```text
//!   list + watch ──► phase? ── none ──► target valid? ── yes ──► InformationCollecting
//!                      │                      └─ no ──► Unknown (InvalidTarget)
//!                      ├─ InformationCollecting ──► queue[information-collecting]
//!                      ├─ Diagnosing            ──► queue[diagnosing]
//!                      ├─ Recovering            ──► queue[recovering]
//!                      └─ terminal              ──► ignored
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{Event, EventSink, TracingEventSink};
use super::stage::Stage;
use crate::api::{now, Abnormal, AbnormalPhase};
use crate::queue::StageQueue;
use crate::store::{ResourceStore, WatchEvent};

/// Reason recorded on abnormals whose target is invalid.
pub const INVALID_TARGET_REASON: &str = "InvalidTarget";

/// Feeds the stage queues from the store.
pub struct PhaseRouter<S> {
    store: Arc<S>,
    queues: HashMap<Stage, StageQueue>,
    events: Arc<dyn EventSink>,
}

impl<S: ResourceStore> PhaseRouter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_events(store, Arc::new(TracingEventSink))
    }

    pub fn with_events(store: Arc<S>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            queues: HashMap::new(),
            events,
        }
    }

    /// Registers the queue of a stage.
    pub fn register(&mut self, stage: Stage, queue: StageQueue) {
        self.queues.insert(stage, queue);
    }

    /// Initializes or enqueues one abnormal.
    pub async fn route(&self, abnormal: &Abnormal) {
        let key = abnormal.key();
        let Some(phase) = abnormal.phase() else {
            self.initialize(abnormal).await;
            return;
        };

        let Some(stage) = Stage::for_phase(phase) else {
            debug!(abnormal = %key, phase = %phase, "Abnormal in terminal phase");
            return;
        };

        match self.queues.get(&stage) {
            Some(queue) => {
                if let Err(e) = queue.enqueue(key.clone()) {
                    warn!(abnormal = %key, error = %e, "Failed to enqueue abnormal");
                }
            }
            None => debug!(abnormal = %key, stage = %stage, "No engine registered for stage"),
        }
    }

    /// Sets the starting phase of a new abnormal.
    ///
    /// The resulting watch event routes it to its first stage.
    async fn initialize(&self, abnormal: &Abnormal) {
        let key = abnormal.key();
        let mut abnormal = abnormal.clone();

        let event = match abnormal.spec.validate_target() {
            Ok(()) => {
                abnormal.status.phase = Some(AbnormalPhase::InformationCollecting);
                abnormal.status.start_time = Some(now());
                None
            }
            Err(e) => {
                abnormal.status.phase = Some(AbnormalPhase::Unknown);
                abnormal.status.reason = INVALID_TARGET_REASON.to_string();
                abnormal.status.message = e.to_string();
                Some(Event::warning(key.clone(), INVALID_TARGET_REASON, e.to_string()))
            }
        };

        match self.store.update_abnormal_status(&abnormal).await {
            Ok(updated) => {
                debug!(abnormal = %key, phase = ?updated.status.phase, "Abnormal initialized");
                if let Some(event) = event {
                    self.events.emit(event);
                }
            }
            // A newer version is on its way through the watch.
            Err(e) if e.is_conflict() => debug!(abnormal = %key, "Abnormal changed during initialization"),
            Err(e) => warn!(abnormal = %key, error = %e, "Failed to initialize abnormal"),
        }
    }

    async fn route_all(&self) {
        match self.store.list_abnormals().await {
            Ok(abnormals) => {
                debug!(count = abnormals.len(), "Routing listed abnormals");
                for abnormal in &abnormals {
                    self.route(abnormal).await;
                }
            }
            Err(e) => warn!(error = %e, "Failed to list abnormals"),
        }
    }

    /// Runs until `shutdown` fires or the watch stream closes.
    pub async fn run(self, shutdown: CancellationToken) {
        // Subscribe before listing so no change falls between the two.
        let mut watch = self.store.watch_abnormals();

        if !self.store.wait_for_sync(&shutdown).await {
            return;
        }

        info!(stages = self.queues.len(), "Phase router starting");
        self.route_all().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Phase router shutting down");
                    break;
                }

                event = watch.recv() => match event {
                    Ok(WatchEvent::Added(abnormal)) | Ok(WatchEvent::Modified(abnormal)) => {
                        self.route(&abnormal).await;
                    }
                    Ok(WatchEvent::Deleted(abnormal)) => {
                        debug!(abnormal = %abnormal.key(), "Abnormal deleted");
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Watch stream lagged, relisting abnormals");
                        self.route_all().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Watch stream closed");
                        break;
                    }
                }
            }
        }
    }
}
