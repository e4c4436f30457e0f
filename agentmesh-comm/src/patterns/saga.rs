//! Sequential saga with reverse-order compensation.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::util::AgentAddress;

/// Sender address used for saga-internal requests.
const SAGA_SENDER: &str = "__saga__";

/// Undo action attached to a saga step.
#[derive(Debug, Clone)]
pub struct Compensation {
    /// Agent performing the undo.
    pub agent: AgentAddress,
    /// Topic the undo request is sent on.
    pub topic: String,
    /// Undo payload.
    pub payload: Value,
}

/// One step of a saga.
#[derive(Debug, Clone)]
pub struct SagaStep {
    /// Human-readable step name, used in failure reports.
    pub name: String,
    /// Agent performing the step.
    pub agent: AgentAddress,
    /// Topic the step request is sent on.
    pub topic: String,
    /// Step payload.
    pub payload: Value,
    /// Optional undo action, executed if a later step fails.
    pub compensation: Option<Compensation>,
}

/// Execute steps sequentially; on any failure, compensate the completed
/// steps in reverse order.
///
/// Compensation failures are counted but never abort the rollback. The
/// single returned error names the originating step failure and the
/// number of compensation failures. The failing step itself is never
/// compensated: it did not complete.
pub async fn saga(
    hub: &CommHub,
    steps: &[SagaStep],
    timeout: Duration,
) -> Result<Vec<Value>, PatternError> {
    let sender = AgentAddress::new(SAGA_SENDER);
    let mut results = Vec::with_capacity(steps.len());

    for (index, step) in steps.iter().enumerate() {
        let outcome = hub
            .request(
                step.agent.clone(),
                step.topic.clone(),
                step.payload.clone(),
                sender.clone(),
                timeout,
            )
            .await;

        match outcome {
            Ok(reply) => results.push(reply.payload),
            Err(failure) => {
                let mut compensation_failures = 0;
                for completed in steps[..index].iter().rev() {
                    let Some(compensation) = &completed.compensation else {
                        continue;
                    };
                    let undo = hub
                        .request(
                            compensation.agent.clone(),
                            compensation.topic.clone(),
                            compensation.payload.clone(),
                            sender.clone(),
                            timeout,
                        )
                        .await;
                    if undo.is_err() {
                        compensation_failures += 1;
                    }
                }
                return Err(PatternError::SagaAborted {
                    step: step.name.clone(),
                    source_message: failure.to_string(),
                    compensation_failures,
                });
            }
        }
    }

    Ok(results)
}
