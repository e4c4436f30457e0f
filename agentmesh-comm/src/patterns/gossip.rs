//! Epidemic-style gossip fan-out over peers seen in hub history.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use rand::seq::SliceRandom;
use serde_json::{json, Value};

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::message::{Envelope, MessagePriority};
use crate::util::AgentAddress;

/// Send `payload` to up to `fanout` random peers known from the topic's
/// message history (peers are prior senders on the topic, excluding
/// `from`).
///
/// Each copy travels at `low` priority with the payload wrapped as
/// `{"gossip": true, "payload": …}` so receivers can distinguish gossip
/// from direct traffic. There is no coverage guarantee; epidemic
/// propagation is orchestrated by the application re-gossiping what it
/// receives. Returns the peers actually contacted.
pub fn gossip(
    hub: &CommHub,
    from: &AgentAddress,
    topic: &str,
    payload: &Value,
    fanout: usize,
) -> Result<Vec<AgentAddress>, PatternError> {
    let mut peers: Vec<AgentAddress> = Vec::new();
    for envelope in hub.get_messages(&AgentAddress::broadcast(), Some(topic)) {
        let sender = envelope.from;
        if sender == *from || sender.is_broadcast() || peers.contains(&sender) {
            continue;
        }
        peers.push(sender);
    }

    let take = fanout.min(peers.len());
    let mut rng = rand::thread_rng();
    let (selected, _) = peers.partial_shuffle(&mut rng, take);

    let wrapped = json!({ "gossip": true, "payload": payload });
    let mut contacted = Vec::with_capacity(take);
    for peer in selected.iter() {
        hub.send(
            Envelope::new(from.clone(), peer.clone(), wrapped.clone())
                .with_topic(topic)
                .with_priority(MessagePriority::Low),
        )?;
        contacted.push(peer.clone());
    }
    Ok(contacted)
}
