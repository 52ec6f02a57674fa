//! User-visible audit trail of stage outcomes.
//!
//! Engines emit one [`Event`] per terminal outcome of a sync. How events are
//! presented is up to the sink: logged, kept in memory for the CLI report,
//! or dropped.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{now, ObjectKey};

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    Normal,
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

/// An event recorded against an abnormal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub involved_object: ObjectKey,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        involved_object: ObjectKey,
        event_type: EventType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            involved_object,
            event_type,
            reason: reason.into(),
            message: message.into(),
            timestamp: now(),
        }
    }

    pub fn normal(key: ObjectKey, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventType::Normal, reason, message)
    }

    pub fn warning(key: ObjectKey, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventType::Warning, reason, message)
    }
}

/// Receives events. Must be fast and non-blocking.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

// =============================================================================
// Built-in Sinks
// =============================================================================

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: Event) {}
}

/// Logs events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: Event) {
        match event.event_type {
            EventType::Normal => tracing::info!(
                abnormal = %event.involved_object,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                abnormal = %event.involved_object,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events recorded for one abnormal.
    pub fn events_for(&self, key: &ObjectKey) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| &e.involved_object == key)
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: Event) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards every event to several sinks.
pub struct MultiplexEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiplexEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiplexEventSink {
    fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl fmt::Debug for MultiplexEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexEventSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}
