//! In-process resource store.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ResourceStore, StoreError, WatchEvent};
use crate::api::{now, Abnormal, ObjectKey, Processor, ProcessorType, ABNORMAL_KIND};

/// Default capacity of the watch broadcast channel.
pub const DEFAULT_WATCH_CAPACITY: usize = 1024;

/// Thread-safe store backed by concurrent maps.
///
/// Every write bumps a store-wide resource version, so versions are unique
/// across objects and strictly increasing. Watchers that fall more than
/// [`DEFAULT_WATCH_CAPACITY`] events behind observe a lagged receiver and are
/// expected to relist.
pub struct InMemoryStore {
    abnormals: DashMap<ObjectKey, Abnormal>,
    processors: DashMap<(ProcessorType, ObjectKey), Processor>,
    resource_version: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
    synced: watch::Sender<bool>,
}

impl InMemoryStore {
    /// Creates an empty store that reports itself as synced.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Creates an empty store that stays unsynced until [`mark_synced`](Self::mark_synced).
    pub fn with_sync_pending() -> Self {
        Self::build(false)
    }

    fn build(synced: bool) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_WATCH_CAPACITY);
        let (synced, _) = watch::channel(synced);
        Self {
            abnormals: DashMap::new(),
            processors: DashMap::new(),
            resource_version: AtomicU64::new(0),
            events,
            synced,
        }
    }

    /// Releases everyone blocked in [`ResourceStore::wait_for_sync`].
    pub fn mark_synced(&self) {
        self.synced.send_replace(true);
        debug!("Store marked as synced");
    }

    fn next_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn publish(&self, event: WatchEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Inserts a new abnormal, assigning its resource version and creation time.
    pub fn create_abnormal(&self, mut abnormal: Abnormal) -> Result<Abnormal, StoreError> {
        let key = abnormal.key();
        if key.name.is_empty() {
            return Err(StoreError::Invalid {
                key,
                reason: "metadata.name must not be empty".to_string(),
            });
        }

        let entry = match self.abnormals.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StoreError::AlreadyExists {
                    kind: ABNORMAL_KIND,
                    key,
                })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => entry,
        };

        abnormal.metadata.resource_version = self.next_version();
        if abnormal.metadata.creation_timestamp.is_none() {
            abnormal.metadata.creation_timestamp = Some(now());
        }
        entry.insert(abnormal.clone());

        trace!(abnormal = %key, "Abnormal created");
        self.publish(WatchEvent::Added(abnormal.clone()));
        Ok(abnormal)
    }

    /// Removes an abnormal and notifies watchers.
    pub fn delete_abnormal(&self, key: &ObjectKey) -> Result<Abnormal, StoreError> {
        let (_, abnormal) = self.abnormals.remove(key).ok_or_else(|| StoreError::NotFound {
            kind: ABNORMAL_KIND,
            key: key.clone(),
        })?;

        trace!(abnormal = %key, "Abnormal deleted");
        self.publish(WatchEvent::Deleted(abnormal.clone()));
        Ok(abnormal)
    }

    /// Inserts or replaces a processor catalog entry.
    pub fn put_processor(&self, mut processor: Processor) -> Result<Processor, StoreError> {
        let key = processor.key();
        let kind = processor.processor_type().ok_or_else(|| StoreError::Invalid {
            key: key.clone(),
            reason: format!("unsupported processor kind {:?}", processor.type_meta.kind),
        })?;

        processor.metadata.resource_version = self.next_version();
        if processor.metadata.creation_timestamp.is_none() {
            processor.metadata.creation_timestamp = Some(now());
        }
        self.processors.insert((kind, key), processor.clone());
        Ok(processor)
    }

    /// Number of stored abnormals.
    pub fn abnormal_count(&self) -> usize {
        self.abnormals.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore for InMemoryStore {
    async fn get_abnormal(&self, key: &ObjectKey) -> Result<Abnormal, StoreError> {
        self.abnormals
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                kind: ABNORMAL_KIND,
                key: key.clone(),
            })
    }

    async fn list_abnormals(&self) -> Result<Vec<Abnormal>, StoreError> {
        let mut abnormals: Vec<Abnormal> = self
            .abnormals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        abnormals.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(abnormals)
    }

    async fn list_processors(&self, kind: ProcessorType) -> Result<Vec<Processor>, StoreError> {
        let mut processors: Vec<Processor> = self
            .processors
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .map(|entry| entry.value().clone())
            .collect();
        processors.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(processors)
    }

    async fn update_abnormal_status(&self, abnormal: &Abnormal) -> Result<Abnormal, StoreError> {
        let key = abnormal.key();
        let updated = {
            let mut stored = self.abnormals.get_mut(&key).ok_or_else(|| StoreError::NotFound {
                kind: ABNORMAL_KIND,
                key: key.clone(),
            })?;

            let given = &abnormal.metadata.resource_version;
            if !given.is_empty() && *given != stored.metadata.resource_version {
                return Err(StoreError::Conflict {
                    key,
                    given: given.clone(),
                    current: stored.metadata.resource_version.clone(),
                });
            }

            stored.status = abnormal.status.clone();
            stored.metadata.resource_version = self.next_version();
            stored.clone()
        };

        trace!(
            abnormal = %key,
            resource_version = %updated.metadata.resource_version,
            "Abnormal status updated"
        );
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    fn watch_abnormals(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    async fn wait_for_sync(&self, shutdown: &CancellationToken) -> bool {
        let mut synced = self.synced.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => false,
            result = synced.wait_for(|synced| *synced) => result.is_ok(),
        }
    }
}
