//! # logcask
//!
//! An embedded, single-node key-value store in the Bitcask mould:
//! - Append-only record log as the source of truth
//! - Durable key → offset index, replaced atomically on every update
//! - Bounded LRU cache of key → offset in front of the index
//! - Serialized write transactions with rollback on index failure
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │              get (lock-free) / put (serialized)              │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ read                             │ write
//!            ▼                                  ▼
//!   ┌─────────────────┐              ┌─────────────────────┐
//!   │  RecencyCache   │◀─────────────│  WriteCoordinator   │
//!   │   (LRU, Mutex)  │              │  (lock file + mutex)│
//!   └────────┬────────┘              └──────┬───────┬──────┘
//!            │ miss                         │       │
//!            ▼                              ▼       │
//!   ┌─────────────────┐   upsert   ┌──────────────┐ │ append /
//!   │    KeyIndex     │◀───────────│   rollback   │ │ rollback
//!   │ (temp + rename) │            └──────────────┘ │
//!   └────────┬────────┘                             ▼
//!            │ offset                      ┌─────────────────┐
//!            └────────────────────────────▶│    RecordLog    │
//!                         read_at          │  (append-only)  │
//!                                          └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use logcask::{Config, Store};
//!
//! # fn main() -> logcask::Result<()> {
//! let store = Store::open(Config::builder().data_dir("./data").build())?;
//! store.put("a", "1")?;
//! assert_eq!(store.get("a")?, "1");
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod fault;

pub mod log;
pub mod index;
pub mod cache;
pub mod write;
pub mod bootstrap;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use bootstrap::{BootstrapReport, VerifyReport};
pub use config::Config;
pub use engine::Store;
pub use error::{CaskError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of logcask
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
