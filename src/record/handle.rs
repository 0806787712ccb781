//! Record Handle
//!
//! The cached association between a key, its current value and its document.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::Result;
use crate::storage::{write_atomic, write_atomic_async, CollectionDir};

use super::{decode, empty, encode, normalize};

/// A key's current value plus what is needed to write it back
#[derive(Debug, Clone)]
pub struct RecordHandle {
    key: String,

    /// `{dir}/{key}.json`
    path: PathBuf,

    /// `{dir}/.{key}.json.tmp`
    temp_path: PathBuf,

    /// Never `Value::Null`
    value: Value,
}

impl RecordHandle {
    /// Create a handle without touching disk
    pub fn new(dir: &CollectionDir, key: &str, value: Value) -> Self {
        Self {
            key: key.to_string(),
            path: dir.record_path(key),
            temp_path: dir.temp_path(key),
            value: normalize(value),
        }
    }

    /// Load a key's document
    ///
    /// Never fails: a missing, unreadable or malformed document yields `{}`.
    pub fn load(dir: &CollectionDir, key: &str) -> Self {
        let mut handle = Self::new(dir, key, empty());
        handle.value = handle.interpret(std::fs::read(&handle.path));
        handle
    }

    /// Async form of [`RecordHandle::load`]
    pub async fn load_async(dir: &CollectionDir, key: &str) -> Self {
        let mut handle = Self::new(dir, key, empty());
        handle.value = handle.interpret(tokio::fs::read(&handle.path).await);
        handle
    }

    fn interpret(&self, read: io::Result<Vec<u8>>) -> Value {
        match read {
            Ok(bytes) => match decode(&bytes) {
                Some(value) => {
                    tracing::debug!(key = %self.key, bytes = bytes.len(), "loaded record");
                    value
                }
                None => {
                    tracing::warn!(path = %self.path.display(), "malformed document, using {{}}");
                    empty()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(key = %self.key, "no document yet, using {{}}");
                empty()
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable document, using {{}}");
                empty()
            }
        }
    }

    // =========================================================================
    // Value Access
    // =========================================================================

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The document path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Replace the value; returns whether it changed (deep equality)
    pub fn replace(&mut self, value: Value) -> bool {
        let value = normalize(value);
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the current value to the document, creating or overwriting it
    pub fn persist(&self, pretty: bool, durable: bool) -> Result<()> {
        let bytes = encode(&self.value, pretty)?;
        write_atomic(&self.path, &self.temp_path, &bytes, durable)?;
        tracing::debug!(key = %self.key, bytes = bytes.len(), "persisted record");
        Ok(())
    }

    /// Async form of [`RecordHandle::persist`]
    pub async fn persist_async(&self, pretty: bool, durable: bool) -> Result<()> {
        let bytes = encode(&self.value, pretty)?;
        write_atomic_async(&self.path, &self.temp_path, &bytes, durable).await?;
        tracing::debug!(key = %self.key, bytes = bytes.len(), "persisted record");
        Ok(())
    }
}
