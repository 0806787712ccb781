//! Storage Module
//!
//! File-level layer underneath the stores: one directory per collection,
//! one JSON document per key.
//!
//! ## Responsibilities
//! - Map keys to document paths and back (basename without `.json`)
//! - Reject keys that would not map to exactly one file in the directory
//! - Scan the directory for existing documents
//! - Remove single documents and whole collections
//! - Replace documents atomically (temp file + rename)
//!
//! ## Layout
//! ```text
//! {base_dir}/{name}/
//!   ├── alice.json          (record "alice")
//!   ├── bob.json            (record "bob")
//!   └── .bob.json.tmp       (in-flight write, never a record)
//! ```
//!
//! Every operation has a blocking form (used by `SplitStore`) and a tokio
//! form suffixed `_async` (used by `AsyncSplitStore`).

mod dir;
mod writer;

pub use dir::{validate_segment, CollectionDir, Removal};
pub use writer::{write_atomic, write_atomic_async};
