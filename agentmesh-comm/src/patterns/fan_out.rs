//! Parallel request fan-out gathered through a barrier collector.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::future::join_all;
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::util::AgentAddress;

/// Issue the same request to every target in parallel and return the
/// successful replies, keyed by target address in completion-recording
/// order.
///
/// Partial failure is the design default: targets that time out or fail
/// are recorded as collector errors and simply absent from the returned
/// results; callers compare the result count against the target count to
/// detect losses. An empty target list returns an empty result without
/// error.
pub async fn fan_out(
    hub: &CommHub,
    from: &AgentAddress,
    topic: &str,
    payload: &Value,
    targets: &[AgentAddress],
    timeout: Duration,
) -> Result<Vec<(String, Value)>, PatternError> {
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let collector = hub.create_collector(targets.len())?;

    let requests = targets.iter().map(|target| {
        let collector = collector.clone();
        async move {
            let outcome = hub
                .request(target.clone(), topic, payload.clone(), from.clone(), timeout)
                .await;
            match outcome {
                Ok(reply) => {
                    collector.submit_result(target.as_str(), reply.payload);
                }
                Err(error) => {
                    collector.submit_error(target.as_str(), error.to_string());
                }
            }
        }
    });
    join_all(requests).await;

    let results = collector.results();
    hub.remove_collector(collector.id());
    Ok(results)
}
