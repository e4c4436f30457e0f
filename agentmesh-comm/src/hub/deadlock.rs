//! Deadlock detection over the lock wait-for graph.
//!
//! The graph has one edge per (waiter, holder) pair: W waits on a lock H
//! holds. Cycle detection is an iterative three-colour DFS; cycles found
//! from different roots are deduplicated by their canonical (sorted) key.

// Layer 1: Standard library imports
use std::collections::{BTreeSet, HashMap, HashSet};

// Layer 2: Third-party crate imports
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use super::lock::LockSnapshot;
use crate::util::AgentAddress;

/// One detected deadlock cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockInfo {
    /// Addresses forming the cycle, in traversal order.
    pub cycle: Vec<AgentAddress>,
    /// Resources linking cycle members: held by a cycle member and waited
    /// on by another.
    pub resources: Vec<String>,
}

/// Victim selection strategy used to break a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    /// Force-release the cycle resource acquired most recently.
    Youngest,
    /// Force-release a resource held by the first address in the sorted
    /// cycle (deterministic tie-break).
    LowestPriority,
    /// Force-release a uniformly random cycle resource.
    Random,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Detect every unique cycle in the wait-for graph of `snapshot`.
pub(crate) fn detect_cycles(snapshot: &[LockSnapshot]) -> Vec<DeadlockInfo> {
    // W -> H for each lock held by H with waiter W.
    let mut edges: HashMap<&AgentAddress, Vec<&AgentAddress>> = HashMap::new();
    let mut nodes: BTreeSet<&AgentAddress> = BTreeSet::new();
    for row in snapshot {
        nodes.insert(&row.holder);
        for waiter in &row.waiters {
            nodes.insert(waiter);
            edges.entry(waiter).or_default().push(&row.holder);
        }
    }

    let mut color: HashMap<&AgentAddress, Color> =
        nodes.iter().map(|node| (*node, Color::White)).collect();
    let mut seen_keys: HashSet<Vec<AgentAddress>> = HashSet::new();
    let mut cycles: Vec<Vec<AgentAddress>> = Vec::new();
    let empty: Vec<&AgentAddress> = Vec::new();

    for &root in &nodes {
        if color.get(root) != Some(&Color::White) {
            continue;
        }

        // Frame: (node, next successor index).
        let mut stack: Vec<(&AgentAddress, usize)> = vec![(root, 0)];
        color.insert(root, Color::Grey);

        while let Some(&(node, next)) = stack.last() {
            let successors = edges.get(node).unwrap_or(&empty);
            if next < successors.len() {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let successor = successors[next];
                match color.get(successor) {
                    Some(Color::White) => {
                        color.insert(successor, Color::Grey);
                        stack.push((successor, 0));
                    }
                    Some(Color::Grey) => {
                        // Walk the DFS stack back to the grey successor to
                        // extract the cycle in traversal order.
                        if let Some(start) =
                            stack.iter().position(|(frame, _)| *frame == successor)
                        {
                            let cycle: Vec<AgentAddress> = stack[start..]
                                .iter()
                                .map(|(frame, _)| (*frame).clone())
                                .collect();
                            let mut key = cycle.clone();
                            key.sort();
                            if seen_keys.insert(key) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    _ => {}
                }
            } else {
                color.insert(node, Color::Black);
                stack.pop();
            }
        }
    }

    cycles
        .into_iter()
        .map(|cycle| {
            let members: HashSet<&AgentAddress> = cycle.iter().collect();
            let mut resources: Vec<String> = snapshot
                .iter()
                .filter(|row| {
                    members.contains(&row.holder)
                        && row.waiters.iter().any(|waiter| members.contains(waiter))
                })
                .map(|row| row.resource.clone())
                .collect();
            resources.sort();
            DeadlockInfo { cycle, resources }
        })
        .collect()
}

/// Choose the resource to force-release for one cycle.
pub(crate) fn select_victim(
    info: &DeadlockInfo,
    snapshot: &[LockSnapshot],
    strategy: ResolutionStrategy,
) -> Option<String> {
    if info.resources.is_empty() {
        return None;
    }
    match strategy {
        ResolutionStrategy::Youngest => info
            .resources
            .iter()
            .filter_map(|resource| {
                snapshot
                    .iter()
                    .find(|row| row.resource == *resource)
                    .map(|row| (row.acquired_seq, resource))
            })
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, resource)| resource.clone()),
        ResolutionStrategy::LowestPriority => {
            let mut sorted = info.cycle.clone();
            sorted.sort();
            let victim_address = sorted.first()?;
            info.resources
                .iter()
                .find(|resource| {
                    snapshot
                        .iter()
                        .any(|row| row.resource == **resource && row.holder == *victim_address)
                })
                .or_else(|| info.resources.first())
                .cloned()
        }
        ResolutionStrategy::Random => info
            .resources
            .choose(&mut rand::thread_rng())
            .cloned(),
    }
}
