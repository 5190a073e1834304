//! Record Log Module
//!
//! Durable, append-only storage for key/value records.
//!
//! ## Responsibilities
//! - Append records and fsync before acknowledging
//! - Read a record back given its offset
//! - Roll back the last append when its transaction fails downstream
//! - Sequential replay for index rebuilds and verification
//!
//! ## File Format
//! ```text
//! offset 0  ┌──────────────────────────────┐
//!           │ key1=value1\n                │
//! offset 12 ├──────────────────────────────┤
//!           │ key2=value2\n                │
//!           ├──────────────────────────────┤
//!           │ key1=value3\n     (newer)    │
//!           └──────────────────────────────┘
//! ```
//! Reserved bytes inside keys and values are backslash-escaped, see
//! [`record`].

pub mod record;
mod record_log;
mod replay;

pub use record::{Record, DELIMITER, SEPARATOR};
pub use record_log::RecordLog;
pub use replay::{LogReplayer, ReplayEntry, ReplayStats};
