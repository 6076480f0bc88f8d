//! Request Context
//!
//! Carried through every facade call. Holds the request id for log
//! correlation plus the caller's cancellation state: an explicit flag and an
//! optional deadline. Once either trips, pending work is abandoned and no
//! write is committed on the caller's behalf.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::errors::{RecordError, RecordResult};

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    started_at: Instant,
}

impl RequestContext {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut ctx = Self::new();
        ctx.deadline = Some(ctx.started_at + timeout);
        ctx
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Marks the context cancelled. Visible to every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with `Cancelled` if the caller has gone away.
    pub fn check(&self) -> RecordResult<()> {
        if self.is_cancelled() {
            Err(RecordError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Returns a guard that cancels this context when dropped while armed.
    ///
    /// Hold it across the awaited facade call and disarm it on completion;
    /// if the surrounding future is dropped first, the context is cancelled.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            cancelled: Arc::clone(&self.cancelled),
            armed: true,
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// See [`RequestContext::cancel_on_drop`].
#[derive(Debug)]
pub struct CancelOnDrop {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}
