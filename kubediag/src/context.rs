//! Key/value access to the context blob of an abnormal status.
//!
//! The blob is a JSON object stored as opaque bytes so that stages and
//! processors can hand arbitrary findings to each other. It is decoded on
//! every access; nothing is cached.
//!
//! ```text
//!   status.context ──► None          get → Nil,   set → {k: v},  remove → Ok(true)
//!                 ├─► Some([])       get → Empty, set → {k: v},  remove → Ok(true)
//!                 ├─► Some(garbage)  get/set/remove → Decode, blob untouched
//!                 └─► Some({...})    get → Ok(Some|None), set upserts, remove → Ok(present)
//! ```
//!
//! Re-encoding writes keys in sorted order, so two equal maps always produce
//! identical bytes.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::api::{AbnormalStatus, RawExtension};

type ContextMap = BTreeMap<String, Box<RawValue>>;

/// Errors returned by the context accessors.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The status carries no context at all.
    #[error("abnormal context nil")]
    Nil,

    /// The status carries a context with no bytes.
    #[error("abnormal context empty")]
    Empty,

    /// The stored bytes are not a JSON object.
    #[error("{0}")]
    Decode(serde_json::Error),

    /// A value could not be encoded or re-encoded.
    #[error("failed to encode abnormal context: {0}")]
    Encode(serde_json::Error),

    /// A required key is absent.
    #[error("key {0} not found in abnormal context")]
    KeyNotFound(String),
}

fn decode(raw: &[u8]) -> Result<ContextMap, ContextError> {
    serde_json::from_slice(raw).map_err(ContextError::Decode)
}

// =============================================================================
// Read access
// =============================================================================

/// Read-only view over a context blob.
#[derive(Debug, Clone, Copy)]
pub struct ContextView<'a> {
    blob: Option<&'a RawExtension>,
}

impl<'a> ContextView<'a> {
    pub fn new(blob: Option<&'a RawExtension>) -> Self {
        Self { blob }
    }

    /// View over the context of a status.
    pub fn of(status: &'a AbnormalStatus) -> Self {
        Self::new(status.context.as_ref())
    }

    fn map(&self) -> Result<ContextMap, ContextError> {
        match self.blob {
            None => Err(ContextError::Nil),
            Some(ext) if ext.is_empty() => Err(ContextError::Empty),
            Some(ext) => decode(&ext.raw),
        }
    }

    /// Returns the JSON encoding of the value stored under `key`.
    ///
    /// An absent key is `Ok(None)`; a missing or empty blob is an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ContextError> {
        let map = self.map()?;
        Ok(map.get(key).map(|v| v.get().as_bytes().to_vec()))
    }

    /// Decodes the value stored under `key` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContextError> {
        let map = self.map()?;
        map.get(key)
            .map(|v| serde_json::from_str(v.get()).map_err(ContextError::Decode))
            .transpose()
    }

    /// Like [`get`](Self::get) but an absent key is an error.
    pub fn require(&self, key: &str) -> Result<Vec<u8>, ContextError> {
        self.get(key)?
            .ok_or_else(|| ContextError::KeyNotFound(key.to_string()))
    }

    /// Returns whether `key` is present. Missing or empty blobs hold no keys.
    pub fn contains(&self, key: &str) -> Result<bool, ContextError> {
        match self.map() {
            Ok(map) => Ok(map.contains_key(key)),
            Err(ContextError::Nil | ContextError::Empty) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Sorted list of keys. Missing or empty blobs hold no keys.
    pub fn keys(&self) -> Result<Vec<String>, ContextError> {
        match self.map() {
            Ok(map) => Ok(map.into_keys().collect()),
            Err(ContextError::Nil | ContextError::Empty) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Write access
// =============================================================================

/// Mutable accessor over a context blob.
#[derive(Debug)]
pub struct ContextStore<'a> {
    blob: &'a mut Option<RawExtension>,
}

impl<'a> ContextStore<'a> {
    pub fn new(blob: &'a mut Option<RawExtension>) -> Self {
        Self { blob }
    }

    /// Accessor over the context of a status.
    pub fn of(status: &'a mut AbnormalStatus) -> Self {
        Self::new(&mut status.context)
    }

    pub fn view(&self) -> ContextView<'_> {
        ContextView::new(self.blob.as_ref())
    }

    /// Decoded map, treating a missing or empty blob as an empty map.
    fn map_or_empty(&self) -> Result<ContextMap, ContextError> {
        match self.blob.as_ref() {
            Some(ext) if !ext.is_empty() => decode(&ext.raw),
            _ => Ok(ContextMap::new()),
        }
    }

    fn store(&mut self, map: &ContextMap) -> Result<(), ContextError> {
        let raw = serde_json::to_vec(map).map_err(ContextError::Encode)?;
        *self.blob = Some(RawExtension::new(raw));
        Ok(())
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// Fails without touching the blob when it holds invalid JSON.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), ContextError> {
        let mut map = self.map_or_empty()?;
        let encoded = serde_json::value::to_raw_value(value).map_err(ContextError::Encode)?;
        map.insert(key.to_string(), encoded);
        self.store(&map)
    }

    /// Removes `key` and returns whether it was present.
    ///
    /// A missing or empty blob is left as is and reported as removed. Fails
    /// without touching the blob when it holds invalid JSON.
    pub fn remove(&mut self, key: &str) -> Result<bool, ContextError> {
        let raw = match self.blob.as_ref() {
            Some(ext) if !ext.is_empty() => &ext.raw,
            _ => return Ok(true),
        };
        let mut map = decode(raw)?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.store(&map)?;
        Ok(true)
    }
}
