//! Collection Directory
//!
//! Path layout, directory scans and file removal for one collection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::error::{Result, StoreError};

/// Check that `segment` names exactly one entry inside a directory
///
/// Returns a short reason on failure so callers can wrap it in their own
/// error variant.
pub fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("must not be empty");
    }
    if segment == "." || segment == ".." {
        return Err("must not be a relative directory reference");
    }
    if segment.contains(['/', '\\']) {
        return Err("must not contain a path separator");
    }
    if segment.contains('\0') {
        return Err("must not contain NUL");
    }
    Ok(())
}

/// The directory backing one collection
#[derive(Debug, Clone)]
pub struct CollectionDir {
    /// `{base_dir}/{name}`
    path: PathBuf,
}

impl CollectionDir {
    /// Extension of record documents
    pub const EXTENSION: &'static str = "json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The collection directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate a record key
    pub fn check_key(key: &str) -> Result<()> {
        validate_segment(key).map_err(|reason| StoreError::InvalidKey(format!("{:?} {}", key, reason)))
    }

    /// Document path for a key
    /// "alice" → "{dir}/alice.json"
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}.{}", key, Self::EXTENSION))
    }

    /// Temp path used while replacing a key's document
    /// "alice" → "{dir}/.alice.json.tmp"
    pub fn temp_path(&self, key: &str) -> PathBuf {
        self.path.join(format!(".{}.{}.tmp", key, Self::EXTENSION))
    }

    /// Parse a record key from a document path
    /// "{dir}/alice.json" → Some("alice"), "{dir}/notes.txt" → None
    pub fn parse_key(path: &Path) -> Option<String> {
        if path.extension()? != Self::EXTENSION {
            return None;
        }
        let key = path.file_stem()?.to_str()?;
        validate_segment(key).ok()?;
        Some(key.to_string())
    }

    // =========================================================================
    // Blocking I/O
    // =========================================================================

    /// Create the directory (and parents) if absent
    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// List record keys, sorted. A missing directory has no keys.
    pub fn scan_keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = Self::parse_key(&entry.path()) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Remove a key's document
    ///
    /// Returns whether a file was removed; an absent file is not an error.
    pub fn remove_record(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every regular file in the directory
    ///
    /// Subdirectories are left alone. A missing directory counts as already
    /// empty. If the directory cannot be listed nothing is removed and the
    /// error is returned. Otherwise every removal is attempted and the
    /// returned [`Removal`] says which files went and which did not.
    pub fn remove_all(&self) -> Result<Removal> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::default()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                files.push(entry.path());
            }
        }

        let mut removal = Removal::default();
        for file in files {
            let outcome = fs::remove_file(&file);
            removal.record(file, outcome);
        }
        Ok(removal)
    }

    // =========================================================================
    // Async I/O
    // =========================================================================

    /// Async form of [`CollectionDir::ensure_exists`]
    pub async fn ensure_exists_async(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Async form of [`CollectionDir::scan_keys`]
    pub async fn scan_keys_async(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(key) = Self::parse_key(&entry.path()) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// Async form of [`CollectionDir::remove_record`]
    pub async fn remove_record_async(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Async form of [`CollectionDir::remove_all`]
    ///
    /// The directory is listed completely before any removal starts. Removals
    /// then run concurrently; this waits for every one of them before
    /// reporting.
    pub async fn remove_all_async(&self) -> Result<Removal> {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::default()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                files.push(entry.path());
            }
        }

        let mut removals = JoinSet::new();
        for file in files {
            removals.spawn(async move {
                let outcome = tokio::fs::remove_file(&file).await;
                (file, outcome)
            });
        }

        let mut removal = Removal::default();
        while let Some(joined) = removals.join_next().await {
            match joined {
                Ok((file, outcome)) => removal.record(file, outcome),
                Err(e) => removal.fail(io::Error::new(io::ErrorKind::Other, e)),
            }
        }
        Ok(removal)
    }
}

/// Outcome of a bulk removal
///
/// A file that had already disappeared counts as removed.
#[derive(Debug, Default)]
pub struct Removal {
    removed: Vec<PathBuf>,
    failed: usize,
    first_error: Option<io::Error>,
}

impl Removal {
    /// Number of files removed
    pub fn removed(&self) -> usize {
        self.removed.len()
    }

    /// Number of files that could not be removed
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// True when nothing failed
    pub fn is_complete(&self) -> bool {
        self.first_error.is_none()
    }

    /// Keys whose documents were removed
    pub fn removed_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.removed.iter().filter_map(|path| CollectionDir::parse_key(path))
    }

    /// The removed count, or `ClearFailed` carrying the first error
    pub fn into_result(self) -> Result<usize> {
        match self.first_error {
            None => Ok(self.removed.len()),
            Some(source) => Err(StoreError::ClearFailed {
                removed: self.removed.len(),
                failed: self.failed,
                source,
            }),
        }
    }

    fn record(&mut self, path: PathBuf, outcome: io::Result<()>) {
        match outcome {
            Ok(()) => self.removed.push(path),
            // Already gone
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.removed.push(path),
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: io::Error) {
        self.failed += 1;
        self.first_error.get_or_insert(error);
    }
}
