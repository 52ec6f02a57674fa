//! Error types for resource store operations.

use thiserror::Error;

use crate::api::ObjectKey;

/// Errors returned by a [`ResourceStore`](super::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The object does not exist (never created or already deleted).
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// An object with the same key already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// The update carried a stale resource version.
    #[error("conflict updating {key}: resource version {given} is stale (current {current})")]
    Conflict {
        key: ObjectKey,
        given: String,
        current: String,
    },

    /// The object was rejected as malformed.
    #[error("invalid object {key}: {reason}")]
    Invalid { key: ObjectKey, reason: String },

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
