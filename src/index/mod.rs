//! Key Index Module
//!
//! Durable key → log offset mapping.
//!
//! ## Responsibilities
//! - Point lookups for the read path
//! - Crash-safe updates via write-to-temp-then-rename
//! - Rebuild from the record log (last write wins)
//!
//! ## File Format
//! ```text
//! ┌──────────────────────┐
//! │ a=0\n                │
//! │ b=12\n               │
//! │ key=1024\n           │
//! └──────────────────────┘
//! ```
//! One line per key, sorted by key, using the record log's escaping.

mod key_index;
mod snapshot;

pub use key_index::{mapping_from_log, KeyIndex};
