//! In-memory priority queue of `queued` report jobs.
//!
//! Jobs are ordered by `(priority rank, not-before time, enqueue sequence)`.
//! A job without a not-before time sorts as if it were due at the Unix
//! epoch. Ordering only applies among jobs that are eligible at the moment
//! of the dequeue; a high priority job that is not yet due never blocks a
//! due low priority one.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use reporthub_core::types::id::JobId;
use reporthub_entity::job::JobRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rank: u8,
    not_before: DateTime<Utc>,
    seq: u64,
}

/// Priority queue holding the ids of jobs waiting to be claimed.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    entries: BTreeMap<QueueKey, JobId>,
    index: HashMap<JobId, QueueKey>,
    next_seq: u64,
}

impl PriorityQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a queued job, replacing any existing entry for the same id.
    ///
    /// A replaced entry moves to the back of its priority class.
    pub fn push(&mut self, record: &JobRecord) {
        self.remove(&record.id);
        let key = QueueKey {
            rank: record.request.priority.rank(),
            not_before: record.eligible_at().unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, record.id);
        self.index.insert(record.id, key);
    }

    /// Best job eligible at `now`, without removing it.
    pub fn peek_next(&self, now: DateTime<Utc>) -> Option<JobId> {
        self.first_eligible(now).map(|(_, id)| id)
    }

    /// Remove and return the best job eligible at `now`.
    pub fn pop_next(&mut self, now: DateTime<Utc>) -> Option<JobId> {
        let (key, id) = self.first_eligible(now)?;
        self.entries.remove(&key);
        self.index.remove(&id);
        Some(id)
    }

    /// Drop a job from the queue. Returns whether it was present.
    pub fn remove(&mut self, id: &JobId) -> bool {
        match self.index.remove(id) {
            Some(key) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Whether the job is waiting in the queue.
    pub fn contains(&self, id: &JobId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of waiting jobs, eligible or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no jobs are waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest not-before time among jobs that are not yet eligible.
    pub fn next_eligible_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.index
            .values()
            .map(|key| key.not_before)
            .filter(|at| *at > now)
            .min()
    }

    fn first_eligible(&self, now: DateTime<Utc>) -> Option<(QueueKey, JobId)> {
        self.entries
            .iter()
            .find(|(key, _)| key.not_before <= now)
            .map(|(key, id)| (*key, *id))
    }
}
