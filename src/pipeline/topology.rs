/*!
 * Pipeline Topology
 *
 * Computes the shutdown drain order from the stage graph. A stage reading
 * channel X and writing channel Y makes X upstream of Y. Channels are
 * drained consumer end first: every channel is drained before any channel
 * upstream of it, so a producer released by a drain never finds its
 * downstream queue still full with nobody left to empty it.
 *
 * Works for fan-in and fan-out. Channels on a cycle (and everything
 * downstream of one) have no such order; they are drained first, in
 * reverse registration order.
 */

use crate::core::types::ChannelId;
use ahash::AHashMap;
use std::collections::{BTreeSet, VecDeque};
use tracing::warn;

/// Channels a stage reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageEdges {
    pub inputs: Vec<ChannelId>,
    pub outputs: Vec<ChannelId>,
}

/// Consumer-first drain order
///
/// `channels` is the registration order and decides ties. Ids referenced by a
/// stage but missing from `channels` are ignored.
pub fn drain_order(channels: &[ChannelId], stages: &[StageEdges]) -> Vec<ChannelId> {
    let index: AHashMap<ChannelId, usize> = channels
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let mut edges = BTreeSet::new();
    for stage in stages {
        for input in stage.inputs.iter().filter_map(|id| index.get(id)) {
            for output in stage.outputs.iter().filter_map(|id| index.get(id)) {
                edges.insert((*input, *output));
            }
        }
    }

    let mut in_degree = vec![0usize; channels.len()];
    let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); channels.len()];
    for (from, to) in &edges {
        in_degree[*to] += 1;
        downstream[*from].push(*to);
    }

    // Kahn's algorithm, lowest registration index first among ready nodes
    let mut ready: BTreeSet<usize> = (0..channels.len())
        .filter(|i| in_degree[*i] == 0)
        .collect();
    let mut producer_first = VecDeque::with_capacity(channels.len());

    while let Some(node) = ready.pop_first() {
        producer_first.push_back(node);
        for next in &downstream[node] {
            in_degree[*next] -= 1;
            if in_degree[*next] == 0 {
                ready.insert(*next);
            }
        }
    }

    let mut order = Vec::with_capacity(channels.len());

    if producer_first.len() < channels.len() {
        let mut cyclic: Vec<usize> = (0..channels.len())
            .filter(|i| in_degree[*i] > 0)
            .collect();
        cyclic.reverse();
        warn!(
            channels = ?cyclic.iter().map(|i| channels[*i]).collect::<Vec<_>>(),
            "Channel graph has a cycle, draining those channels in reverse registration order"
        );
        order.extend(cyclic.into_iter().map(|i| channels[i]));
    }

    order.extend(producer_first.into_iter().rev().map(|i| channels[i]));
    order
}
