//! Write Module
//!
//! Serialized write transactions.
//!
//! ## Responsibilities
//! - Hold one process-wide exclusive lock per transaction
//! - Append → index update → cache update, in that order
//! - Roll the append back when the index update fails
//! - Refuse writes after an unrecoverable rollback failure

mod coordinator;
mod lock;

pub use coordinator::{TxnState, WriteCoordinator};
pub use lock::{WriteGuard, WriteLock};
