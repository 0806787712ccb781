//! # SplitStore
//!
//! A collection of named JSON documents, one file per key, with an
//! in-memory mirror kept in sync:
//! - Lazy per-key Record Handles (each document read at most once)
//! - Explicit write policy: persist-on-change or deferred with `write`
//! - Atomic document replacement (temp file + rename)
//! - Blocking and tokio variants with identical semantics
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              SplitStore / AsyncSplitStore                    │
//! │   get · set · write · delete · clear · get_all · size        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Snapshot   │          │   Record    │
//!   │ key → value │          │   Handles   │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌──────────────────┐
//!                           │  CollectionDir   │
//!                           │ {base}/{name}/   │
//!                           │   {key}.json     │
//!                           └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use serde_json::json;
//! use splitstore::{SplitStore, StoreOptions};
//!
//! # fn main() -> splitstore::Result<()> {
//! let options = StoreOptions::builder().name("users").base_dir("./data").build()?;
//! let store = SplitStore::open(options)?;
//!
//! store.set("alice", json!({ "age": 30 }))?;
//! assert_eq!(store.get("alice")?, json!({ "age": 30 }));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{StoreOptions, StoreOptionsBuilder, WritePolicy};
pub use record::RecordHandle;
pub use store::{AsyncSplitStore, SplitStore};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SplitStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
