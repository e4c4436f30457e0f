//! Bully leader election by candidate index.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::json;

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::util::{AgentAddress, MessageId};

/// Upper bound on the candidacy propagation window.
const MAX_PROPAGATION_WINDOW: Duration = Duration::from_millis(100);

/// Run a bully election among the candidates; the candidate's position
/// in the slice is its priority (higher index wins).
///
/// Every candidate subscribes to a fresh election topic, broadcasts its
/// candidacy, and yields upon seeing a strictly higher index. After one
/// propagation window (at most 100 ms, less if `timeout` is shorter) the
/// highest non-yielding candidate is the winner. A single candidate wins
/// immediately without broadcasting.
pub async fn election(
    hub: &CommHub,
    candidates: &[AgentAddress],
    timeout: Duration,
) -> Result<AgentAddress, PatternError> {
    match candidates {
        [] => return Err(PatternError::NoCandidates),
        [only] => return Ok(only.clone()),
        _ => {}
    }

    let topic = format!("__election__{}", MessageId::new());
    let yielded: Arc<Vec<AtomicBool>> = Arc::new(
        candidates
            .iter()
            .map(|_| AtomicBool::new(false))
            .collect(),
    );

    let mut subscriptions = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let yielded = Arc::clone(&yielded);
        let id = hub.subscribe(candidate.clone(), topic.clone(), move |envelope| {
            let competitor = envelope.payload["index"].as_u64().unwrap_or(0);
            if competitor > index as u64 {
                yielded[index].store(true, Ordering::SeqCst);
            }
        })?;
        subscriptions.push(id);
    }

    for (index, candidate) in candidates.iter().enumerate() {
        hub.broadcast(
            candidate.clone(),
            topic.clone(),
            json!({ "candidate": candidate.as_str(), "index": index }),
            None,
        )?;
    }

    tokio::time::sleep(timeout.min(MAX_PROPAGATION_WINDOW)).await;

    for id in subscriptions {
        hub.unsubscribe(id);
    }

    let winner = candidates
        .iter()
        .enumerate()
        .rev()
        .find(|(index, _)| !yielded[*index].load(Ordering::SeqCst))
        .map(|(_, candidate)| candidate.clone());

    // The highest-indexed candidate never sees a higher competitor, so a
    // winner always exists once candidacies have propagated.
    winner.ok_or(PatternError::NoCandidates)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    fn addr(name: &str) -> AgentAddress {
        AgentAddress::new(name)
    }

    #[tokio::test]
    async fn test_no_candidates_rejected() {
        let hub = CommHub::new();
        let err = election(&hub, &[], Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, PatternError::NoCandidates));
    }

    #[tokio::test]
    async fn test_single_candidate_wins_without_broadcast() {
        let hub = CommHub::new();
        let winner = election(&hub, &[addr("solo")], Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(winner, addr("solo"));
        // No candidacy traffic was recorded.
        assert_eq!(hub.history_len(), 0);
    }

    #[tokio::test]
    async fn test_highest_index_wins() {
        let hub = CommHub::new();
        let winner = election(
            &hub,
            &[addr("a"), addr("b"), addr("c")],
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert_eq!(winner, addr("c"));
    }

    #[tokio::test]
    async fn test_election_subscriptions_cleaned_up() {
        let hub = CommHub::new();
        election(&hub, &[addr("a"), addr("b")], Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(hub.subscription_count(), 0);
    }
}
