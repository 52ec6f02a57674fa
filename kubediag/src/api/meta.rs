//! Object identity and metadata shared by every persisted resource.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// API group/version written into every persisted object.
pub const API_VERSION: &str = "diagnosis.kubediag.io/v1";

/// Returns the current time truncated to whole seconds.
///
/// Persisted timestamps are RFC 3339 with second precision. Truncating at the
/// source keeps a value identical after it has travelled through a processor
/// and back, which the result validator relies on.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Type information carried by every persisted object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl TypeMeta {
    /// Type information for the given kind in the current API version.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
        }
    }
}

/// Metadata every stored object carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Opaque version assigned by the store; updates carrying a stale
    /// version are rejected.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata with only a namespace and name set.
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// The identity of the object this metadata belongs to.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Namespace/name pair identifying a resource.
///
/// Used both as the work-queue item and as the reference type for assigned
/// processors and for the processor that resolved an abnormal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

/// Reference to a namespaced resource as it appears in specs and statuses.
pub type NamespacedName = ObjectKey;

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_has_no_subsecond_component() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(ObjectKey::new("default", "disk-full").to_string(), "default/disk-full");
        assert_eq!(ObjectKey::new("", "cluster-wide").to_string(), "cluster-wide");
    }

    #[test]
    fn test_meta_key() {
        let meta = ObjectMeta::named("kube-system", "abnormal-1");
        assert_eq!(meta.key(), ObjectKey::new("kube-system", "abnormal-1"));
    }

    #[test]
    fn test_timestamp_round_trips_through_json() {
        let meta = ObjectMeta {
            creation_timestamp: Some(now()),
            ..ObjectMeta::named("default", "a")
        };
        let json = serde_json::to_string(&meta).unwrap();
        let decoded: ObjectMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, meta);
    }
}
