//! Map-reduce over contiguous data chunks.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use futures::future::join_all;
use serde_json::{json, Value};

// Layer 3: Internal module imports
use super::error::PatternError;
use crate::hub::CommHub;
use crate::util::AgentAddress;

/// Sender address used for map-reduce-internal requests.
const MAP_REDUCE_SENDER: &str = "__mapreduce__";

/// Topic mappers listen on.
pub const MAP_TOPIC: &str = "__map__";

/// Topic the reducer listens on.
pub const REDUCE_TOPIC: &str = "__reduce__";

/// Partition `data` into one contiguous chunk per mapper (chunk size
/// ⌈|data| / |mappers|⌉), request each mapper on `__map__` with
/// `{chunk, index}`, gather through a barrier, then hand
/// `{results: [[name, payload], …]}` (collector insertion order) to the
/// reducer on `__reduce__` and return its reply payload.
///
/// Mapper failures follow the fan-out default: they are absent from the
/// entries the reducer sees.
pub async fn map_reduce(
    hub: &CommHub,
    map_agents: &[AgentAddress],
    reduce_agent: &AgentAddress,
    data: &[Value],
    timeout: Duration,
) -> Result<Value, PatternError> {
    let sender = AgentAddress::new(MAP_REDUCE_SENDER);

    let entries: Vec<(String, Value)> = if map_agents.is_empty() {
        Vec::new()
    } else {
        let chunk_size = data.len().div_ceil(map_agents.len()).max(1);
        let collector = hub.create_collector(map_agents.len())?;

        let requests = map_agents.iter().enumerate().map(|(index, agent)| {
            let collector = collector.clone();
            let sender = sender.clone();
            let chunk: Vec<Value> = data
                .iter()
                .skip(index * chunk_size)
                .take(chunk_size)
                .cloned()
                .collect();
            async move {
                let payload = json!({ "chunk": chunk, "index": index });
                let outcome = hub
                    .request(agent.clone(), MAP_TOPIC, payload, sender, timeout)
                    .await;
                match outcome {
                    Ok(reply) => {
                        collector.submit_result(agent.as_str(), reply.payload);
                    }
                    Err(error) => {
                        collector.submit_error(agent.as_str(), error.to_string());
                    }
                }
            }
        });
        join_all(requests).await;

        let results = collector.results();
        hub.remove_collector(collector.id());
        results
    };

    let entry_pairs: Vec<Value> = entries
        .into_iter()
        .map(|(name, payload)| json!([name, payload]))
        .collect();

    let reply = hub
        .request(
            reduce_agent.clone(),
            REDUCE_TOPIC,
            json!({ "results": entry_pairs }),
            sender,
            timeout,
        )
        .await?;
    Ok(reply.payload)
}
