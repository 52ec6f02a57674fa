//! The Abnormal resource: the unit of work driven through the pipeline.
//!
//! An [`Abnormal`] pairs an immutable [`AbnormalSpec`] (what was detected and
//! which processors may act on it) with a mutable [`AbnormalStatus`] (how far
//! the pipeline has progressed). The status is written by the stage engines
//! and, within the limits enforced by [`crate::validation`], by processors.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

use super::meta::{NamespacedName, ObjectKey, ObjectMeta, TypeMeta};

/// Kind string of the Abnormal resource.
pub const ABNORMAL_KIND: &str = "Abnormal";

// =============================================================================
// Enumerations
// =============================================================================

/// Where an abnormal was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbnormalSourceType {
    PrometheusAlert,
    KubernetesEvent,
    Custom,
}

/// High-level summary of where an abnormal is in its lifecycle.
///
/// Transitions run `InformationCollecting → Diagnosing → Recovering →
/// {Succeeded | Failed}`. `Unknown` may be entered from any phase when the
/// status cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbnormalPhase {
    InformationCollecting,
    Diagnosing,
    Recovering,
    Succeeded,
    Failed,
    Unknown,
}

impl AbnormalPhase {
    /// Returns true for phases no stage engine acts on.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InformationCollecting => "InformationCollecting",
            Self::Diagnosing => "Diagnosing",
            Self::Recovering => "Recovering",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AbnormalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processor-type tag shared by embedded and external processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProcessorType {
    InformationCollector,
    Diagnoser,
    Recoverer,
}

impl ProcessorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InformationCollector => "InformationCollector",
            Self::Diagnoser => "Diagnoser",
            Self::Recoverer => "Recoverer",
        }
    }

    /// Parses the kind string of a processor manifest.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "InformationCollector" => Some(Self::InformationCollector),
            "Diagnoser" => Some(Self::Diagnoser),
            "Recoverer" => Some(Self::Recoverer),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Milestones recorded as conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    InformationCollected,
    Identified,
    Recovered,
}

/// Status of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Backend used to profile a java program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JavaProfilerType {
    Arthas,
    MemoryAnalyzer,
}

// =============================================================================
// Raw context blob
// =============================================================================

/// Opaque JSON payload embedded in a spec or status.
///
/// The bytes are written out verbatim. Decoding normalizes them to compact
/// JSON. An empty buffer serializes as `null`. Interpretation of the content is left
/// to [`crate::context`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtension {
    pub raw: Vec<u8>,
}

impl RawExtension {
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

impl Serialize for RawExtension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.raw.is_empty() {
            return serializer.serialize_none();
        }
        let text = std::str::from_utf8(&self.raw).map_err(S::Error::custom)?;
        let value = RawValue::from_string(text.to_string()).map_err(S::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawExtension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let raw = serde_json::to_vec(&value).map_err(serde::de::Error::custom)?;
        Ok(Self::new(raw))
    }
}

// =============================================================================
// Spec
// =============================================================================

/// Alert payload for abnormals raised from a Prometheus alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusAlert {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
}

/// Target pod of an abnormal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodReference {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_name: String,
}

/// A command run locally by the stage whose tag matches `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutorSpec {
    pub command: Vec<String>,
    #[serde(rename = "type")]
    pub processor_type: ProcessorType,
    /// Defaults to 30 seconds. Minimum value is 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
}

/// Source of a go profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoProfilerSpec {
    pub source: String,
}

/// Java profiling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaProfilerSpec {
    #[serde(rename = "type")]
    pub profiler_type: JavaProfilerType,
    #[serde(default, rename = "hprofFilePath", skip_serializing_if = "String::is_empty")]
    pub hprof_file_path: String,
}

/// A profiler run locally by the stage whose tag matches `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilerSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub processor_type: ProcessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go: Option<GoProfilerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java: Option<JavaProfilerSpec>,
    /// Defaults to 30 seconds. Minimum value is 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    /// Defaults to 7200 seconds. Minimum value is 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_seconds: Option<i32>,
}

/// Immutable description of an abnormal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbnormalSpec {
    pub source: AbnormalSourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_alert: Option<PrometheusAlert>,
    /// Kubernetes event kept as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_event: Option<serde_json::Value>,
    /// Node the abnormal is on. Empty means any node may process it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_reference: Option<PodReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_information_collectors: Vec<NamespacedName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_diagnosers: Vec<NamespacedName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_recoverers: Vec<NamespacedName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_executors: Vec<CommandExecutorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profilers: Vec<ProfilerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RawExtension>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_recovery: bool,
}

impl Default for AbnormalSpec {
    fn default() -> Self {
        Self {
            source: AbnormalSourceType::Custom,
            prometheus_alert: None,
            kubernetes_event: None,
            node_name: String::new(),
            pod_reference: None,
            assigned_information_collectors: Vec::new(),
            assigned_diagnosers: Vec::new(),
            assigned_recoverers: Vec::new(),
            command_executors: Vec::new(),
            profilers: Vec::new(),
            context: None,
            skip_recovery: false,
        }
    }
}

/// Violations of the target rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("one of nodeName and podReference must be specified")]
    Missing,
    #[error("only one of nodeName and podReference may be specified")]
    Ambiguous,
}

impl AbnormalSpec {
    /// Checks that exactly one of node name and pod reference is set.
    pub fn validate_target(&self) -> Result<(), TargetError> {
        match (!self.node_name.is_empty(), self.pod_reference.is_some()) {
            (true, true) => Err(TargetError::Ambiguous),
            (false, false) => Err(TargetError::Missing),
            _ => Ok(()),
        }
    }

    /// The assigned processors for a processor type, in assignment order.
    pub fn assigned(&self, processor_type: ProcessorType) -> &[NamespacedName] {
        match processor_type {
            ProcessorType::InformationCollector => &self.assigned_information_collectors,
            ProcessorType::Diagnoser => &self.assigned_diagnosers,
            ProcessorType::Recoverer => &self.assigned_recoverers,
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// One entry of the condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbnormalCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl AbnormalCondition {
    pub fn new(condition_type: ConditionType, status: ConditionStatus) -> Self {
        Self {
            condition_type,
            status,
            last_transition_time: None,
            reason: String::new(),
            message: String::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>, message: impl Into<String>) -> Self {
        self.reason = reason.into();
        self.message = message.into();
        self
    }
}

/// Result of one command executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandExecutorStatus {
    pub command: Vec<String>,
    #[serde(rename = "type")]
    pub processor_type: ProcessorType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoProfilerStatus {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerEndpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaProfilerStatus {
    #[serde(rename = "type")]
    pub profiler_type: JavaProfilerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arthas: Option<ProfilerEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_analyzer: Option<ProfilerEndpoint>,
}

/// Result of one profiler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilerStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub processor_type: ProcessorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go: Option<GoProfilerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java: Option<JavaProfilerStatus>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Observed state of an abnormal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbnormalStatus {
    #[serde(default)]
    pub identifiable: bool,
    #[serde(default)]
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<AbnormalPhase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<AbnormalCondition>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// Set by the engine to the diagnoser that identified the abnormal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnoser: Option<NamespacedName>,
    /// Set by the engine to the recoverer that recovered the abnormal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverer: Option<NamespacedName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_executors: Vec<CommandExecutorStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profilers: Vec<ProfilerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RawExtension>,
}

// =============================================================================
// Abnormal
// =============================================================================

/// An abnormal condition detected on a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abnormal {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AbnormalSpec,
    #[serde(default)]
    pub status: AbnormalStatus,
}

impl Abnormal {
    /// Creates an abnormal with an empty status.
    pub fn new(metadata: ObjectMeta, spec: AbnormalSpec) -> Self {
        Self {
            type_meta: TypeMeta::new(ABNORMAL_KIND),
            metadata,
            spec,
            status: AbnormalStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn phase(&self) -> Option<AbnormalPhase> {
        self.status.phase
    }

    /// Returns true once the abnormal has reached a phase no engine acts on.
    pub fn is_finished(&self) -> bool {
        self.status.phase.is_some_and(AbnormalPhase::is_terminal)
    }
}
