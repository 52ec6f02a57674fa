//! Guards the fields a processor may not touch.
//!
//! Processors get the whole abnormal and send back a whole abnormal. They may
//! report findings through the context blob and the embedded result arrays,
//! but the `spec` and every field the engine uses for bookkeeping must come
//! back exactly as sent.

use std::fmt;

use thiserror::Error;

use serde_json::Value;

use crate::api::{Abnormal, AbnormalSpec, RawExtension};

/// A field a processor result must leave unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedField {
    Spec,
    Identifiable,
    Recoverable,
    Phase,
    Conditions,
    Message,
    Reason,
    StartTime,
    Diagnoser,
    Recoverer,
}

impl ProtectedField {
    /// All protected fields, in the order they are checked.
    pub const ALL: [ProtectedField; 10] = [
        Self::Spec,
        Self::Identifiable,
        Self::Recoverable,
        Self::Phase,
        Self::Conditions,
        Self::Message,
        Self::Reason,
        Self::StartTime,
        Self::Diagnoser,
        Self::Recoverer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Identifiable => "identifiable",
            Self::Recoverable => "recoverable",
            Self::Phase => "phase",
            Self::Conditions => "conditions",
            Self::Message => "message",
            Self::Reason => "reason",
            Self::StartTime => "startTime",
            Self::Diagnoser => "diagnoser",
            Self::Recoverer => "recoverer",
        }
    }

    fn unchanged(self, result: &Abnormal, current: &Abnormal) -> bool {
        let (r, c) = (&result.status, &current.status);
        match self {
            Self::Spec => same_spec(&result.spec, &current.spec),
            Self::Identifiable => r.identifiable == c.identifiable,
            Self::Recoverable => r.recoverable == c.recoverable,
            Self::Phase => r.phase == c.phase,
            Self::Conditions => r.conditions == c.conditions,
            Self::Message => r.message == c.message,
            Self::Reason => r.reason == c.reason,
            Self::StartTime => r.start_time == c.start_time,
            Self::Diagnoser => r.diagnoser == c.diagnoser,
            Self::Recoverer => r.recoverer == c.recoverer,
        }
    }
}

/// Specs compare field by field, except that the context blob compares by
/// its JSON content. Encoding may reorder or reformat the blob on the way
/// through a processor.
fn same_spec(result: &AbnormalSpec, current: &AbnormalSpec) -> bool {
    let without_context = |spec: &AbnormalSpec| AbnormalSpec {
        context: None,
        ..spec.clone()
    };
    without_context(result) == without_context(current)
        && context_content(result.context.as_ref()) == context_content(current.context.as_ref())
}

/// An empty or `null` blob is the same as no blob. Undecodable bytes compare
/// as they are.
fn context_content(context: Option<&RawExtension>) -> Option<Result<Value, &[u8]>> {
    let raw = context?.raw.as_slice();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(Ok(value)),
        Err(_) => Some(Err(raw)),
    }
}

impl fmt::Display for ProtectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A processor result modified a protected field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} of Abnormal must not be modified")]
pub struct ValidationError {
    pub field: ProtectedField,
}

/// Checks `result` against the object that was sent to the processor.
///
/// Returns the first protected field that differs.
pub fn validate_result(result: &Abnormal, current: &Abnormal) -> Result<(), ValidationError> {
    match ProtectedField::ALL
        .into_iter()
        .find(|field| !field.unchanged(result, current))
    {
        Some(field) => Err(ValidationError { field }),
        None => Ok(()),
    }
}
