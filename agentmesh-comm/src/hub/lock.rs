//! Named advisory lock table with FIFO wait queues.

// Layer 1: Standard library imports
use std::collections::{HashMap, VecDeque};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::util::AgentAddress;

/// Public snapshot of one lock's state.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// Resource name
    pub resource: String,
    /// Current holder
    pub holder: AgentAddress,
    /// When the current holder acquired the lock
    pub acquired_at: DateTime<Utc>,
    /// Queued waiters, FIFO order
    pub waiters: Vec<AgentAddress>,
}

/// Snapshot row consumed by the deadlock detector.
#[derive(Debug, Clone)]
pub(crate) struct LockSnapshot {
    pub resource: String,
    pub holder: AgentAddress,
    /// Monotone acquisition sequence; larger means more recently acquired.
    pub acquired_seq: u64,
    pub waiters: Vec<AgentAddress>,
}

/// Outcome of an acquisition attempt, computed atomically under the
/// table guard.
pub(crate) enum AcquireOutcome {
    /// The resource was unheld; the caller now holds it.
    Granted,
    /// The caller already holds the resource; re-entry is a no-op.
    Reentrant,
    /// The caller was appended to the FIFO queue; the receiver fires when
    /// the caller is promoted to holder.
    Queued {
        waiter_id: Uuid,
        grant: oneshot::Receiver<()>,
    },
}

/// Outcome of a release attempt.
pub(crate) enum ReleaseOutcome {
    /// Caller was not the holder (or the lock does not exist).
    NotHolder,
    /// Lock released; if the queue was non-empty the head was promoted
    /// before this value was returned.
    Released { promoted: Option<AgentAddress> },
}

/// Outcome of an administrative force-release.
pub(crate) struct ForceReleaseOutcome {
    pub previous_holder: AgentAddress,
    /// Head waiter promoted to holder, if any (hand-to-head policy).
    pub new_holder: Option<AgentAddress>,
}

struct Waiter {
    id: Uuid,
    address: AgentAddress,
    grant: oneshot::Sender<()>,
}

struct LockRecord {
    holder: AgentAddress,
    acquired_at: DateTime<Utc>,
    acquired_seq: u64,
    waiters: VecDeque<Waiter>,
}

/// Table of named advisory locks.
///
/// Invariants maintained here: at most one holder per resource; strict
/// FIFO wait queues; ownership hand-off to the queue head happens inside
/// the mutating call, never leaving an unowned intermediate state. The
/// table is not internally synchronized; the owning hub guards it with a
/// mutex and performs all waiting outside the guard.
pub(crate) struct LockTable {
    locks: HashMap<String, LockRecord>,
    next_seq: u64,
}

impl LockTable {
    pub(crate) fn new() -> Self {
        Self {
            locks: HashMap::new(),
            next_seq: 0,
        }
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Attempt acquisition. Re-acquisition by the current holder succeeds
    /// immediately without queueing; one release still frees the lock.
    pub(crate) fn acquire(&mut self, resource: &str, holder: &AgentAddress) -> AcquireOutcome {
        let seq = self.bump_seq();
        match self.locks.get_mut(resource) {
            None => {
                self.locks.insert(
                    resource.to_string(),
                    LockRecord {
                        holder: holder.clone(),
                        acquired_at: Utc::now(),
                        acquired_seq: seq,
                        waiters: VecDeque::new(),
                    },
                );
                AcquireOutcome::Granted
            }
            Some(record) if record.holder == *holder => AcquireOutcome::Reentrant,
            Some(record) => {
                let (tx, rx) = oneshot::channel();
                let waiter_id = Uuid::new_v4();
                record.waiters.push_back(Waiter {
                    id: waiter_id,
                    address: holder.clone(),
                    grant: tx,
                });
                AcquireOutcome::Queued {
                    waiter_id,
                    grant: rx,
                }
            }
        }
    }

    /// Release by the current holder, promoting the FIFO head if present.
    pub(crate) fn release(&mut self, resource: &str, holder: &AgentAddress) -> ReleaseOutcome {
        let seq = self.bump_seq();
        let Some(record) = self.locks.get_mut(resource) else {
            return ReleaseOutcome::NotHolder;
        };
        if record.holder != *holder {
            return ReleaseOutcome::NotHolder;
        }

        match record.waiters.pop_front() {
            Some(next) => {
                record.holder = next.address.clone();
                record.acquired_at = Utc::now();
                record.acquired_seq = seq;
                // The grant fires while the table guard is still held, so
                // there is never an unowned intermediate state.
                let _ = next.grant.send(());
                ReleaseOutcome::Released {
                    promoted: Some(next.address),
                }
            }
            None => {
                self.locks.remove(resource);
                ReleaseOutcome::Released { promoted: None }
            }
        }
    }

    /// Remove a queued waiter (acquisition timeout). Returns whether the
    /// waiter was still queued.
    pub(crate) fn remove_waiter(&mut self, resource: &str, waiter_id: Uuid) -> bool {
        let Some(record) = self.locks.get_mut(resource) else {
            return false;
        };
        let before = record.waiters.len();
        record.waiters.retain(|waiter| waiter.id != waiter_id);
        record.waiters.len() != before
    }

    /// Administrative revocation: the holder loses the lock and the FIFO
    /// head, if any, is promoted in its place.
    pub(crate) fn force_release(&mut self, resource: &str) -> Option<ForceReleaseOutcome> {
        let seq = self.bump_seq();
        let record = self.locks.get_mut(resource)?;
        let previous_holder = record.holder.clone();

        match record.waiters.pop_front() {
            Some(next) => {
                record.holder = next.address.clone();
                record.acquired_at = Utc::now();
                record.acquired_seq = seq;
                let _ = next.grant.send(());
                Some(ForceReleaseOutcome {
                    previous_holder,
                    new_holder: Some(next.address),
                })
            }
            None => {
                self.locks.remove(resource);
                Some(ForceReleaseOutcome {
                    previous_holder,
                    new_holder: None,
                })
            }
        }
    }

    /// Current holder of a resource, if the lock exists.
    pub(crate) fn holder(&self, resource: &str) -> Option<&AgentAddress> {
        self.locks.get(resource).map(|record| &record.holder)
    }

    /// Public snapshot of one lock.
    pub(crate) fn info(&self, resource: &str) -> Option<LockInfo> {
        self.locks.get(resource).map(|record| LockInfo {
            resource: resource.to_string(),
            holder: record.holder.clone(),
            acquired_at: record.acquired_at,
            waiters: record
                .waiters
                .iter()
                .map(|waiter| waiter.address.clone())
                .collect(),
        })
    }

    /// Snapshot of every lock, for the deadlock detector.
    pub(crate) fn snapshot(&self) -> Vec<LockSnapshot> {
        self.locks
            .iter()
            .map(|(resource, record)| LockSnapshot {
                resource: resource.clone(),
                holder: record.holder.clone(),
                acquired_seq: record.acquired_seq,
                waiters: record
                    .waiters
                    .iter()
                    .map(|waiter| waiter.address.clone())
                    .collect(),
            })
            .collect()
    }

    /// All live lock infos.
    pub(crate) fn all_info(&self) -> Vec<LockInfo> {
        let mut infos: Vec<LockInfo> = self
            .locks
            .keys()
            .filter_map(|resource| self.info(resource))
            .collect();
        infos.sort_by(|a, b| a.resource.cmp(&b.resource));
        infos
    }

    /// Drop every record and waiter. Pending grant receivers observe a
    /// closed channel, which the hub maps to its shutdown error.
    pub(crate) fn clear(&mut self) {
        self.locks.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
