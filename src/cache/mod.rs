//! Recency Cache Module
//!
//! Bounded in-memory key → offset accelerator in front of the key index.
//!
//! ## Responsibilities
//! - Answer hot lookups without touching the index
//! - Evict the least recently used key at capacity
//! - Stay safe under concurrent readers and the writer
//!
//! Contents are lost on restart and repopulated lazily by reads or eagerly
//! during bootstrap.

mod lru;
mod stats;

pub use lru::RecencyCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
