//! Loading seed objects from JSON manifest files.
//!
//! Every `*.json` file in a directory holds either one object or an array of
//! objects. Objects are dispatched on their `kind`: `Abnormal` or one of the
//! processor kinds. Files are read in name order so seeding is reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{InMemoryStore, StoreError};
use crate::api::{Abnormal, Processor, ProcessorType, ABNORMAL_KIND};

/// Errors that can occur while loading manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: unsupported kind {kind:?}")]
    UnknownKind { path: PathBuf, kind: String },

    #[error("failed to seed store: {0}")]
    Store(#[from] StoreError),
}

/// Objects read from a manifest directory.
#[derive(Debug, Default)]
pub struct Manifests {
    pub abnormals: Vec<Abnormal>,
    pub processors: Vec<Processor>,
}

impl Manifests {
    pub fn is_empty(&self) -> bool {
        self.abnormals.is_empty() && self.processors.is_empty()
    }

    /// Inserts every object into `store`, processors first.
    pub fn seed(self, store: &InMemoryStore) -> Result<(), ManifestError> {
        for processor in self.processors {
            store.put_processor(processor)?;
        }
        for abnormal in self.abnormals {
            store.create_abnormal(abnormal)?;
        }
        Ok(())
    }
}

/// Reads every `*.json` file in `dir`.
pub fn load_dir(dir: &Path) -> Result<Manifests, ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut abnormals = Vec::new();
    let mut processors = Vec::new();
    for path in paths {
        for (kind, value) in read_objects(&path)? {
            let decode = |source| ManifestError::Decode {
                path: path.clone(),
                source,
            };
            if kind == ABNORMAL_KIND {
                let abnormal: Abnormal = serde_json::from_value(value).map_err(decode)?;
                abnormals.push(abnormal);
            } else if ProcessorType::from_kind(&kind).is_some() {
                let processor: Processor = serde_json::from_value(value).map_err(decode)?;
                processors.push(processor);
            } else {
                return Err(ManifestError::UnknownKind { path, kind });
            }
        }
    }

    debug!(
        dir = %dir.display(),
        abnormals = abnormals.len(),
        processors = processors.len(),
        "Loaded manifests"
    );

    Ok(Manifests {
        abnormals,
        processors,
    })
}

fn read_objects(path: &Path) -> Result<Vec<(String, Value)>, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| ManifestError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let kind = item
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            (kind, item)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResourceStore;
    use std::fs;
    use tempfile::TempDir;

    const ABNORMAL: &str = r#"{
        "apiVersion": "diagnosis.kubediag.io/v1",
        "kind": "Abnormal",
        "metadata": {"name": "disk-full", "namespace": "default"},
        "spec": {"source": "Custom", "nodeName": "node1"}
    }"#;

    const RECOVERERS: &str = r#"[
        {"kind": "Recoverer", "metadata": {"name": "r1", "namespace": "kubediag"},
         "spec": {"ip": "127.0.0.1", "port": 9001, "path": "/recover"}},
        {"kind": "Diagnoser", "metadata": {"name": "d1", "namespace": "kubediag"},
         "spec": {"ip": "127.0.0.1", "port": 9002}}
    ]"#;

    #[test]
    fn test_load_dir_dispatches_on_kind() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("01-abnormal.json"), ABNORMAL).unwrap();
        fs::write(dir.path().join("02-processors.json"), RECOVERERS).unwrap();
        fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let manifests = load_dir(dir.path()).unwrap();

        assert_eq!(manifests.abnormals.len(), 1);
        assert_eq!(manifests.abnormals[0].metadata.name, "disk-full");
        assert_eq!(manifests.processors.len(), 2);
        assert_eq!(
            manifests.processors[1].processor_type(),
            Some(ProcessorType::Diagnoser)
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pod.json"), r#"{"kind": "Pod", "metadata": {"name": "p"}}"#)
            .unwrap();

        let err = load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownKind { ref kind, .. } if kind == "Pod"));
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let err = load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Decode { .. }));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[tokio::test]
    async fn test_seed_populates_store() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), ABNORMAL).unwrap();
        fs::write(dir.path().join("b.json"), RECOVERERS).unwrap();

        let store = InMemoryStore::new();
        load_dir(dir.path()).unwrap().seed(&store).unwrap();

        assert_eq!(store.abnormal_count(), 1);
        let recoverers = store.list_processors(ProcessorType::Recoverer).await.unwrap();
        assert_eq!(recoverers.len(), 1);
    }
}
