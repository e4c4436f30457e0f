// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::Notify;

// Layer 3: Internal module imports
use super::error::{MailboxError, TryRecvError};
use super::metrics::MailboxMetrics;
use crate::message::priority::PRIORITY_LEVELS;
use crate::message::Envelope;

struct QueueState {
    buckets: [VecDeque<Envelope>; PRIORITY_LEVELS],
    len: usize,
    closed: bool,
}

struct MailboxShared {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
    metrics: MailboxMetrics,
}

/// Receiver half of a bounded priority mailbox.
///
/// Owned exclusively by one agent. Draining order is priority rank
/// ascending (0 = most urgent) with FIFO within a rank. Envelopes whose
/// TTL expired while queued are skipped and counted as dropped, so a
/// receiver never observes a stale message.
///
/// # Example
/// ```rust,ignore
/// let (mut mailbox, sender) = PriorityMailbox::new(100);
/// sender.try_send(envelope)?;
/// let next = mailbox.recv().await;
/// ```
pub struct PriorityMailbox {
    shared: Arc<MailboxShared>,
}

/// Cloneable sender half of a bounded priority mailbox.
#[derive(Clone)]
pub struct PriorityMailboxSender {
    shared: Arc<MailboxShared>,
}

impl PriorityMailbox {
    /// Create a mailbox/sender pair with the given capacity.
    pub fn new(capacity: usize) -> (Self, PriorityMailboxSender) {
        let shared = Arc::new(MailboxShared {
            state: Mutex::new(QueueState {
                buckets: Default::default(),
                len: 0,
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            metrics: MailboxMetrics::new(),
        });

        (
            Self {
                shared: Arc::clone(&shared),
            },
            PriorityMailboxSender { shared },
        )
    }

    /// Receive the next envelope, waiting if the mailbox is empty.
    ///
    /// Returns `None` once the mailbox is closed and fully drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut state = self.shared.state.lock();
                while let Some(envelope) = pop_next(&mut state) {
                    if envelope.is_expired() {
                        self.shared.metrics.record_dropped();
                        continue;
                    }
                    self.shared.metrics.record_received();
                    return Some(envelope);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Result<Envelope, TryRecvError> {
        let mut state = self.shared.state.lock();
        while let Some(envelope) = pop_next(&mut state) {
            if envelope.is_expired() {
                self.shared.metrics.record_dropped();
                continue;
            }
            self.shared.metrics.record_received();
            return Ok(envelope);
        }
        if state.closed {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    /// Current number of queued envelopes.
    pub fn len(&self) -> usize {
        self.shared.state.lock().len
    }

    /// Whether no envelopes are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Traffic counters for this mailbox.
    pub fn metrics(&self) -> &MailboxMetrics {
        &self.shared.metrics
    }
}

impl PriorityMailboxSender {
    /// Enqueue an envelope without blocking.
    ///
    /// When the mailbox is full: if the incoming envelope is strictly more
    /// urgent than the weakest queued one, the newest message of that
    /// weakest class is displaced to make room; otherwise the incoming
    /// envelope is rejected with [`MailboxError::Full`].
    pub fn try_send(&self, envelope: Envelope) -> Result<(), MailboxError> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(MailboxError::Closed);
            }

            if state.len >= self.shared.capacity {
                let weakest = weakest_rank(&state).unwrap_or(0);
                if envelope.priority.rank() >= weakest {
                    return Err(MailboxError::Full {
                        capacity: self.shared.capacity,
                    });
                }
                state.buckets[weakest].pop_back();
                state.len -= 1;
                self.shared.metrics.record_displaced();
            }

            let rank = envelope.priority.rank();
            state.buckets[rank].push_back(envelope);
            state.len += 1;
            self.shared.metrics.record_sent();
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Close the mailbox. Queued envelopes remain receivable; new sends
    /// fail with [`MailboxError::Closed`]. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
        }
        self.shared.notify.notify_waiters();
        self.shared.notify.notify_one();
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Current number of queued envelopes.
    pub fn len(&self) -> usize {
        self.shared.state.lock().len
    }

    /// Whether no envelopes are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Traffic counters for this mailbox.
    pub fn metrics(&self) -> &MailboxMetrics {
        &self.shared.metrics
    }
}

fn pop_next(state: &mut QueueState) -> Option<Envelope> {
    for bucket in state.buckets.iter_mut() {
        if let Some(envelope) = bucket.pop_front() {
            state.len -= 1;
            return Some(envelope);
        }
    }
    None
}

fn weakest_rank(state: &QueueState) -> Option<usize> {
    state
        .buckets
        .iter()
        .enumerate()
        .rev()
        .find(|(_, bucket)| !bucket.is_empty())
        .map(|(rank, _)| rank)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;
    use crate::message::MessagePriority;
    use crate::util::AgentAddress;
    use serde_json::json;

    fn envelope(tag: &str, priority: MessagePriority) -> Envelope {
        Envelope::new(
            AgentAddress::new("sender"),
            AgentAddress::new("receiver"),
            json!(tag),
        )
        .with_priority(priority)
    }

    #[tokio::test]
    async fn test_send_receive() {
        let (mut mailbox, sender) = PriorityMailbox::new(10);

        sender
            .try_send(envelope("hello", MessagePriority::Normal))
            .unwrap();

        let received = mailbox.recv().await.unwrap();
        assert_eq!(received.payload, json!("hello"));
    }

    #[tokio::test]
    async fn test_priority_ordering() {
        let (mut mailbox, sender) = PriorityMailbox::new(10);

        sender
            .try_send(envelope("low", MessagePriority::Low))
            .unwrap();
        sender
            .try_send(envelope("critical", MessagePriority::Critical))
            .unwrap();
        sender
            .try_send(envelope("normal", MessagePriority::Normal))
            .unwrap();

        assert_eq!(mailbox.recv().await.unwrap().payload, json!("critical"));
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("normal"));
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("low"));
    }

    #[tokio::test]
    async fn test_fifo_within_priority_class() {
        let (mut mailbox, sender) = PriorityMailbox::new(10);

        for tag in ["first", "second", "third"] {
            sender.try_send(envelope(tag, MessagePriority::Normal)).unwrap();
        }

        assert_eq!(mailbox.recv().await.unwrap().payload, json!("first"));
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("second"));
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("third"));
    }

    #[tokio::test]
    async fn test_overflow_rejects_equal_priority() {
        let (_mailbox, sender) = PriorityMailbox::new(2);

        sender.try_send(envelope("a", MessagePriority::Normal)).unwrap();
        sender.try_send(envelope("b", MessagePriority::Normal)).unwrap();

        let result = sender.try_send(envelope("c", MessagePriority::Normal));
        assert!(matches!(result, Err(MailboxError::Full { capacity: 2 })));
    }

    #[tokio::test]
    async fn test_overflow_displaces_weaker() {
        let (mut mailbox, sender) = PriorityMailbox::new(2);

        sender.try_send(envelope("keep", MessagePriority::Normal)).unwrap();
        sender.try_send(envelope("victim", MessagePriority::Low)).unwrap();

        sender
            .try_send(envelope("urgent", MessagePriority::High))
            .unwrap();

        assert_eq!(sender.metrics().displaced_count(), 1);
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("urgent"));
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("keep"));
        assert!(mailbox.is_empty());
    }

    #[tokio::test]
    async fn test_size_one_mailbox_displacement() {
        let (mut mailbox, sender) = PriorityMailbox::new(1);

        sender.try_send(envelope("old", MessagePriority::Normal)).unwrap();
        sender
            .try_send(envelope("new", MessagePriority::Critical))
            .unwrap();

        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("new"));
    }

    #[tokio::test]
    async fn test_closed_mailbox_rejects_sends() {
        let (mut mailbox, sender) = PriorityMailbox::new(10);

        sender.try_send(envelope("queued", MessagePriority::Normal)).unwrap();
        sender.close();

        let result = sender.try_send(envelope("late", MessagePriority::Normal));
        assert!(matches!(result, Err(MailboxError::Closed)));

        // Already-queued messages drain, then recv reports closure.
        assert_eq!(mailbox.recv().await.unwrap().payload, json!("queued"));
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_try_recv_empty_and_closed() {
        let (mut mailbox, sender) = PriorityMailbox::new(4);

        assert!(matches!(mailbox.try_recv(), Err(TryRecvError::Empty)));
        sender.close();
        assert!(matches!(mailbox.try_recv(), Err(TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn test_expired_envelope_skipped_on_recv() {
        let (mut mailbox, sender) = PriorityMailbox::new(10);

        let mut stale = envelope("stale", MessagePriority::Normal).with_ttl_ms(10);
        stale.timestamp = chrono::Utc::now() - chrono::Duration::milliseconds(100);
        sender.try_send(stale).unwrap();
        sender.try_send(envelope("fresh", MessagePriority::Normal)).unwrap();

        assert_eq!(mailbox.recv().await.unwrap().payload, json!("fresh"));
        assert_eq!(mailbox.metrics().dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_send() {
        let (mut mailbox, sender) = PriorityMailbox::new(4);

        let handle = tokio::spawn(async move { mailbox.recv().await });
        tokio::task::yield_now().await;
        sender.try_send(envelope("late", MessagePriority::Normal)).unwrap();

        let received = handle.await.unwrap().unwrap();
        assert_eq!(received.payload, json!("late"));
    }
}
