//! The versioned resource store the engines observe and update.
//!
//! The store is authoritative for every abnormal and processor. Engines hold
//! only working copies and write back through
//! [`ResourceStore::update_abnormal_status`], which rejects stale writes:
//!
//! ```text
//!   get_abnormal ──► working copy (resourceVersion = N)
//!        │
//!        ▼
//!   mutate status
//!        │
//!        ▼
//!   update_abnormal_status ──► N == current ? store, bump to N+1
//!                                          : StoreError::Conflict
//! ```
//!
//! [`InMemoryStore`] is the in-process implementation used by the CLI agent
//! and the tests. [`manifest`] loads seed objects from JSON files.

mod error;
pub mod manifest;
mod memory;

use std::future::Future;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::{Abnormal, ObjectKey, Processor, ProcessorType};

pub use error::StoreError;
pub use memory::{InMemoryStore, DEFAULT_WATCH_CAPACITY};

/// A change to an abnormal observed through [`ResourceStore::watch_abnormals`].
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(Abnormal),
    Modified(Abnormal),
    Deleted(Abnormal),
}

impl WatchEvent {
    /// The object the event refers to.
    pub fn abnormal(&self) -> &Abnormal {
        match self {
            Self::Added(a) | Self::Modified(a) | Self::Deleted(a) => a,
        }
    }
}

/// Versioned get/list/watch/update-status access to abnormals and processors.
pub trait ResourceStore: Send + Sync + 'static {
    /// Fetches the live abnormal. Deleted objects yield [`StoreError::NotFound`].
    fn get_abnormal(
        &self,
        key: &ObjectKey,
    ) -> impl Future<Output = Result<Abnormal, StoreError>> + Send;

    /// Lists every abnormal ordered by namespace and name.
    fn list_abnormals(&self) -> impl Future<Output = Result<Vec<Abnormal>, StoreError>> + Send;

    /// Lists the processor catalog of one kind, ordered by namespace and name.
    fn list_processors(
        &self,
        kind: ProcessorType,
    ) -> impl Future<Output = Result<Vec<Processor>, StoreError>> + Send;

    /// Replaces the status of the stored abnormal.
    ///
    /// Fails with [`StoreError::Conflict`] when the resource version of
    /// `abnormal` is not the stored one. Returns the stored object with its
    /// new version.
    fn update_abnormal_status(
        &self,
        abnormal: &Abnormal,
    ) -> impl Future<Output = Result<Abnormal, StoreError>> + Send;

    /// Subscribes to abnormal changes made after this call.
    fn watch_abnormals(&self) -> broadcast::Receiver<WatchEvent>;

    /// Waits until the store's cache is populated.
    ///
    /// Returns false if `shutdown` fires first.
    fn wait_for_sync(&self, shutdown: &CancellationToken) -> impl Future<Output = bool> + Send;
}
