//! Persisted document store for cues, presets and trigger pages.
//!
//! One JSON document per namespace, replaced whole on every save. Callers
//! serialize their own read-modify-write cycles; each save writes its own temp
//! file before renaming it over the document.

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Current time as an RFC 3339 timestamp, used for `created`/`modified`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug)]
enum Backend {
    Dir(PathBuf),
    Memory(RwLock<HashMap<String, serde_json::Value>>),
}

/// Namespaced JSON documents that survive restarts (directory backend) or
/// live for the process (memory backend).
#[derive(Debug, Clone)]
pub struct DocumentStore {
    backend: Arc<Backend>,
}

impl DocumentStore {
    /// Store documents as `<dir>/<namespace>.json`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        log::info!("Persisting state in {}", dir.display());
        Ok(Self {
            backend: Arc::new(Backend::Dir(dir)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory(RwLock::default())),
        }
    }

    fn check_namespace(namespace: &str) -> Result<()> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(Error::validation(format!("Invalid namespace: {:?}", namespace)))
        }
    }

    /// Load a namespace, or its default if it was never saved.
    pub fn load<T: DeserializeOwned + Default>(&self, namespace: &str) -> Result<T> {
        Self::check_namespace(namespace)?;
        match &*self.backend {
            Backend::Dir(dir) => {
                let path = dir.join(format!("{}.json", namespace));
                match fs::read_to_string(&path) {
                    Ok(content) => Ok(serde_json::from_str(&content)?),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
                    Err(e) => Err(e.into()),
                }
            }
            Backend::Memory(docs) => {
                let docs = docs.read().expect("Document lock poisoned");
                match docs.get(namespace) {
                    Some(value) => Ok(serde_json::from_value(value.clone())?),
                    None => Ok(T::default()),
                }
            }
        }
    }

    /// Replace a namespace's document.
    pub fn save<T: Serialize>(&self, namespace: &str, document: &T) -> Result<()> {
        Self::check_namespace(namespace)?;
        match &*self.backend {
            Backend::Dir(dir) => {
                let bytes = serde_json::to_vec_pretty(document)?;
                write_atomic(&dir.join(format!("{}.json", namespace)), &bytes)?;
            }
            Backend::Memory(docs) => {
                let value = serde_json::to_value(document)?;
                docs.write()
                    .expect("Document lock poisoned")
                    .insert(namespace.to_string(), value);
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;

    let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
