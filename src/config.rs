//! Configuration for SplitStore
//!
//! Centralized collection options with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::storage::validate_segment;

/// Options for one collection of JSON documents
#[derive(Debug, Clone)]
pub struct StoreOptions {
    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------
    /// Collection name; a single path segment
    pub name: String,

    /// Directory the collection lives under
    /// Internal structure:
    ///   {base_dir}/
    ///     └── {name}/
    ///           ├── alice.json
    ///           └── bob.json
    pub base_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------
    /// When `set` reaches the disk
    pub write_policy: WritePolicy,

    /// Indent documents with two spaces
    pub pretty: bool,

    /// fsync each document before it replaces the previous version
    pub durable_writes: bool,
}

/// When a `set` is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Persist immediately, but only when the new value differs from the
    /// current one (deep equality). Unchanged values cause no disk write.
    #[default]
    OnChange,

    /// Only update memory; the caller flushes with `write(key)` or
    /// `flush_all()`. The in-memory snapshot still reflects the new value.
    Deferred,
}

impl StoreOptions {
    /// Options for `name` under the current working directory
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::builder().name(name).build()
    }

    /// Create a new options builder
    pub fn builder() -> StoreOptionsBuilder {
        StoreOptionsBuilder::default()
    }

    /// `{base_dir}/{name}`
    pub fn collection_dir(&self) -> PathBuf {
        self.base_dir.join(&self.name)
    }
}

/// Builder for StoreOptions
#[derive(Debug, Default)]
pub struct StoreOptionsBuilder {
    name: Option<String>,
    base_dir: Option<PathBuf>,
    write_policy: WritePolicy,
    pretty: Option<bool>,
    durable_writes: bool,
}

impl StoreOptionsBuilder {
    /// Set the collection name (required)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the base directory (defaults to the current working directory)
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(path.into());
        self
    }

    /// Set the write policy
    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    /// Toggle pretty-printed output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = Some(pretty);
        self
    }

    /// Toggle fsync before rename
    pub fn durable_writes(mut self, durable: bool) -> Self {
        self.durable_writes = durable;
        self
    }

    pub fn build(self) -> Result<StoreOptions> {
        let name = self
            .name
            .ok_or_else(|| StoreError::Config("collection name is required".to_string()))?;
        validate_segment(&name)
            .map_err(|reason| StoreError::Config(format!("collection name {:?} {}", name, reason)))?;

        let base_dir = match self.base_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        Ok(StoreOptions {
            name,
            base_dir,
            write_policy: self.write_policy,
            pretty: self.pretty.unwrap_or(true),
            durable_writes: self.durable_writes,
        })
    }
}
