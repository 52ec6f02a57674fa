//! External processor catalog entries.
//!
//! A [`Processor`] describes an HTTP endpoint that accepts an abnormal and
//! returns it with an updated status. The same resource shape is used for
//! information collectors, diagnosers and recoverers; `kind` tells them apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::abnormal::ProcessorType;
use super::meta::{ObjectKey, ObjectMeta, TypeMeta};

/// URL scheme used to reach a processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint of an external processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSpec {
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub scheme: Scheme,
    /// Defaults to 30 seconds. Minimum value is 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
}

/// A registered external processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: ProcessorSpec,
}

impl Processor {
    pub fn new(kind: ProcessorType, metadata: ObjectMeta, spec: ProcessorSpec) -> Self {
        Self {
            type_meta: TypeMeta::new(kind.as_str()),
            metadata,
            spec,
        }
    }

    /// The processor type derived from the kind string.
    pub fn processor_type(&self) -> Option<ProcessorType> {
        ProcessorType::from_kind(&self.type_meta.kind)
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}
