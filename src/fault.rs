//! Fault Injection
//!
//! Lets tests force failures at specific points of the write transaction
//! so the rollback and corruption paths can be exercised deterministically.
//!
//! ```text
//! append → [AppendSync] → index rewrite → [IndexRename] → rename → [DirSync] → cache
//!    │                           │
//!    │ on failure                └─ on failure: rollback → [Rollback]
//!    └─ discard partial record → [DiscardPartial]
//! ```
//!
//! An injector starts disarmed. Arming a point makes the next operation that
//! reaches it fail once with an `io::Error`, after which the point disarms
//! itself.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Points in the write path where a failure can be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// After the record bytes are written, before fsync of the log
    AppendSync,

    /// After the new index has been written to the temp file, before rename
    IndexRename,

    /// When truncating the log back to its pre-append length
    Rollback,

    /// When cutting off the bytes of an append that failed part way
    DiscardPartial,

    /// When syncing the data directory after the index rename
    DirSync,
}

impl FaultPoint {
    const ALL: [FaultPoint; 5] = [
        FaultPoint::AppendSync,
        FaultPoint::IndexRename,
        FaultPoint::Rollback,
        FaultPoint::DiscardPartial,
        FaultPoint::DirSync,
    ];

    fn slot(self) -> usize {
        match self {
            FaultPoint::AppendSync => 0,
            FaultPoint::IndexRename => 1,
            FaultPoint::Rollback => 2,
            FaultPoint::DiscardPartial => 3,
            FaultPoint::DirSync => 4,
        }
    }
}

/// One-shot failure switches shared between the test and the store
#[derive(Debug, Default)]
pub struct FaultInjector {
    armed: [AtomicBool; 5],
    /// Number of faults actually fired
    fired: AtomicU32,
}

impl FaultInjector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next operation that reaches `point`
    pub fn arm(&self, point: FaultPoint) {
        self.armed[point.slot()].store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self, point: FaultPoint) {
        self.armed[point.slot()].store(false, Ordering::SeqCst);
    }

    pub fn disarm_all(&self) {
        for point in FaultPoint::ALL {
            self.disarm(point);
        }
    }

    pub fn is_armed(&self, point: FaultPoint) -> bool {
        self.armed[point.slot()].load(Ordering::SeqCst)
    }

    /// How many injected failures have fired so far
    pub fn fired(&self) -> u32 {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns an error if `point` is armed, disarming it
    pub(crate) fn check(&self, point: FaultPoint) -> io::Result<()> {
        if self.armed[point.slot()].swap(false, Ordering::SeqCst) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(?point, "Injected fault fired");
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected fault at {:?}", point),
            ));
        }
        Ok(())
    }
}

/// Check an optional injector; no-op when none is installed
pub(crate) fn check(injector: Option<&Arc<FaultInjector>>, point: FaultPoint) -> io::Result<()> {
    match injector {
        Some(injector) => injector.check(point),
        None => Ok(()),
    }
}
