//! Cooperative cancellation (spec §5): the tracer, optimizer and content
//! processor all run potentially-long loops over a single document and are
//! expected to notice a cancellation request between operations rather than
//! mid-operation. A [`CancelToken`] is just a shared flag; nothing here
//! spawns threads or owns a runtime, matching §5's single-threaded-per-
//! document model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PdfError, Result};

#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Called at natural suspension points (between page operations, between
    /// content-stream operators, between optimizer passes).
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(PdfError::Canceled);
        }
        Ok(())
    }
}

/// A token that never cancels, for call sites that don't expose one (unit
/// tests, one-shot CLI invocations).
pub fn never() -> CancelToken {
    CancelToken::new()
}
