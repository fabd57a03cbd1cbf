//! Worker pool bookkeeping: which jobs hold a processing slot.
//!
//! The pool does no locking of its own. It lives inside the scheduler
//! state and is only touched while that state's lock is held, which is
//! what makes claim, release and cancel mutually exclusive.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use reporthub_core::types::id::JobId;

use crate::queue::PriorityQueue;

/// A job that was just moved out of the queue into a processing slot.
#[derive(Debug, Clone)]
pub struct Claim {
    /// Claimed job.
    pub id: JobId,
    /// Fired when the job is cancelled or the scheduler is interrupted.
    pub token: CancellationToken,
}

/// Bounded set of processing jobs.
#[derive(Debug)]
pub struct WorkerPool {
    max_concurrent: usize,
    processing: HashMap<JobId, CancellationToken>,
}

impl WorkerPool {
    /// Create a pool with `max_concurrent` slots (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            processing: HashMap::new(),
        }
    }

    /// Slot count.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.processing.len()
    }

    /// Whether a slot is free.
    pub fn has_capacity(&self) -> bool {
        self.processing.len() < self.max_concurrent
    }

    /// Whether `id` holds a slot.
    pub fn is_processing(&self, id: &JobId) -> bool {
        self.processing.contains_key(id)
    }

    /// Pop the next eligible job into a free slot.
    ///
    /// Returns `None` and leaves the queue untouched when the pool is full
    /// or nothing is eligible.
    pub fn try_claim(&mut self, queue: &mut PriorityQueue, now: DateTime<Utc>) -> Option<Claim> {
        if !self.has_capacity() {
            return None;
        }
        let id = queue.pop_next(now)?;
        let token = CancellationToken::new();
        self.processing.insert(id, token.clone());
        Some(Claim { id, token })
    }

    /// Free the slot held by `id`. Returns whether it held one.
    pub fn release(&mut self, id: &JobId) -> bool {
        self.processing.remove(id).is_some()
    }

    /// Fire the job's token and free its slot.
    pub fn cancel(&mut self, id: &JobId) -> bool {
        match self.processing.remove(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Fire every token without freeing any slot. Each routine releases its
    /// own slot once it has observed the signal.
    pub fn interrupt_all(&self) -> usize {
        for token in self.processing.values() {
            token.cancel();
        }
        self.processing.len()
    }
}
