//! Sequential request pipeline.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::util::AgentAddress;

/// Sender address used for pipeline-internal requests.
const PIPELINE_SENDER: &str = "__pipeline__";

/// One stage of a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineStage {
    /// Agent handling this stage.
    pub agent: AgentAddress,
    /// Topic the stage listens on.
    pub topic: String,
}

impl PipelineStage {
    /// Construct a stage.
    pub fn new(agent: AgentAddress, topic: impl Into<String>) -> Self {
        Self {
            agent,
            topic: topic.into(),
        }
    }
}

/// Fold a payload through the stages sequentially: each stage receives
/// the previous stage's reply payload.
///
/// There is no partial success: any stage timeout or failure rejects the
/// whole pipeline. An empty stage list returns the initial payload
/// unchanged.
pub async fn pipeline(
    hub: &CommHub,
    stages: &[PipelineStage],
    initial: Value,
    timeout: Duration,
) -> Result<Value, PatternError> {
    let mut current = initial;
    for stage in stages {
        let reply = hub
            .request(
                stage.agent.clone(),
                stage.topic.clone(),
                current,
                AgentAddress::new(PIPELINE_SENDER),
                timeout,
            )
            .await?;
        current = reply.payload;
    }
    Ok(current)
}
