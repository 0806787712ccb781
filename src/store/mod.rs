//! Store Module
//!
//! The Store Managers: key-addressed operations over one collection.
//!
//! ## Variants
//! - [`SplitStore`]: blocking. Every operation runs to completion under the
//!   handle lock before the next begins; this is the reference semantics.
//! - [`AsyncSplitStore`]: tokio. Initialization runs once behind a guard that
//!   every entry point awaits. Each key has its own async lock, so
//!   overlapping calls on the same key are serialized and an uncached key is
//!   read from disk at most once.
//!
//! Both behave identically under non-overlapping call patterns.
//!
//! ## Snapshot
//! Each store keeps a key → value snapshot of the in-memory state. It is
//! seeded from a directory scan at initialization and updated by `set`,
//! `write`, `delete`, `clear` and `get_all`. `size` is its cardinality.
//!
//! ## Constraints
//! Single writer process: nothing coordinates two processes (or two store
//! instances) pointed at the same directory.

mod async_store;
mod sync_store;

pub use async_store::AsyncSplitStore;
pub use sync_store::SplitStore;
