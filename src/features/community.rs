//! Louvain community detection on the undirected projection of the
//! transaction graph: antiparallel edges collapse into a single undirected
//! edge whose weight is the sum of both directions' `total_amount`.
//!
//! No teacher analogue exists (the teacher's closest relative, circular-flow
//! detection, is a pure graph-theoretic walk with no weighting). Shaped
//! after the iterative local-moving style of
//! `datasynth-graph`'s `entity_groups::detect_label_propagation`: each
//! node repeatedly reassigns itself to the neighboring group that improves
//! a global objective, here Newman's modularity rather than a plurality
//! vote, with the standard two-phase Louvain aggregation added on top.

use crate::graph::Graph;
use std::collections::BTreeMap;

const MODULARITY_GAIN_TOLERANCE: f64 = 1e-4;

struct Projection {
    /// `adjacency[i]` is the sorted list of `(neighbor, weight)` pairs
    /// incident to node `i`, one entry per distinct neighbor.
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Weight of a self-loop at node `i` (counted once; contributes twice
    /// to degree under the standard modularity convention).
    self_loops: Vec<f64>,
}

fn build_projection(graph: &Graph) -> (Vec<String>, Projection) {
    let nodes: Vec<String> = graph.nodes().cloned().collect();
    let index: BTreeMap<&str, usize> =
        nodes.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let n = nodes.len();

    let mut undirected: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut self_loops = vec![0.0_f64; n];

    for ((sender, receiver), edge) in graph.edges() {
        let i = index[sender.as_str()];
        let j = index[receiver.as_str()];
        if i == j {
            self_loops[i] += edge.total_amount;
            continue;
        }
        let key = if i < j { (i, j) } else { (j, i) };
        *undirected.entry(key).or_insert(0.0) += edge.total_amount;
    }

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (&(i, j), &weight) in &undirected {
        adjacency[i].push((j, weight));
        adjacency[j].push((i, weight));
    }
    for list in adjacency.iter_mut() {
        list.sort_by_key(|(node, _)| *node);
    }

    (nodes, Projection { adjacency, self_loops })
}

/// One Louvain local-moving phase: repeatedly move each node into the
/// neighboring community that yields the largest modularity gain, until a
/// full sweep produces no further gain above tolerance.
fn local_moving(projection: &Projection) -> Vec<usize> {
    let n = projection.adjacency.len();
    let degree: Vec<f64> = (0..n)
        .map(|i| {
            projection.adjacency[i].iter().map(|(_, w)| w).sum::<f64>()
                + 2.0 * projection.self_loops[i]
        })
        .collect();
    let total_weight: f64 = degree.iter().sum::<f64>() / 2.0;

    let mut community: Vec<usize> = (0..n).collect();
    let mut community_degree: Vec<f64> = degree.clone();

    if total_weight <= 0.0 {
        return community;
    }

    loop {
        let mut improved = false;
        for node in 0..n {
            let current_community = community[node];
            let node_degree = degree[node];

            let mut neighbor_weight: BTreeMap<usize, f64> = BTreeMap::new();
            for &(neighbor, weight) in &projection.adjacency[node] {
                *neighbor_weight.entry(community[neighbor]).or_insert(0.0) += weight;
            }

            community_degree[current_community] -= node_degree;

            let weight_to_current = *neighbor_weight.get(&current_community).unwrap_or(&0.0);
            let mut best_community = current_community;
            let mut best_gain = 0.0;

            for (&candidate, &weight_to_candidate) in &neighbor_weight {
                if candidate == current_community {
                    continue;
                }
                let gain = (weight_to_candidate - weight_to_current)
                    - node_degree * (community_degree[candidate] - community_degree[current_community])
                        / (2.0 * total_weight);
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best_community = candidate;
                }
            }

            community_degree[best_community] += node_degree;
            if best_community != current_community {
                community[node] = best_community;
                improved = true;
            }
        }
        if !improved {
            break;
        }
    }

    renumber(&community)
}

/// Compact a community-index vector to a dense `0..k` range, in order of
/// first appearance, so downstream aggregation can use plain `Vec` indices.
fn renumber(community: &[usize]) -> Vec<usize> {
    let mut next_id: BTreeMap<usize, usize> = BTreeMap::new();
    community
        .iter()
        .map(|&c| {
            let next = next_id.len();
            *next_id.entry(c).or_insert(next)
        })
        .collect()
}

fn aggregate(projection: &Projection, community: &[usize], community_count: usize) -> Projection {
    let mut undirected: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut self_loops = vec![0.0_f64; community_count];

    for node in 0..projection.adjacency.len() {
        let node_community = community[node];
        self_loops[node_community] += projection.self_loops[node];
        for &(neighbor, weight) in &projection.adjacency[node] {
            let neighbor_community = community[neighbor];
            if neighbor_community == node_community {
                if neighbor > node {
                    self_loops[node_community] += weight;
                }
                continue;
            }
            let key = if node_community < neighbor_community {
                (node_community, neighbor_community)
            } else {
                (neighbor_community, node_community)
            };
            // Each undirected edge is visited from both endpoints; halve it
            // back out by only counting it once via the ordered-pair sum.
            *undirected.entry(key).or_insert(0.0) += weight / 2.0;
        }
    }

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); community_count];
    for (&(i, j), &weight) in &undirected {
        adjacency[i].push((j, weight));
        adjacency[j].push((i, weight));
    }
    for list in adjacency.iter_mut() {
        list.sort_by_key(|(node, _)| *node);
    }

    Projection { adjacency, self_loops }
}

fn modularity(projection: &Projection, community: &[usize]) -> f64 {
    let n = projection.adjacency.len();
    let degree: Vec<f64> = (0..n)
        .map(|i| {
            projection.adjacency[i].iter().map(|(_, w)| w).sum::<f64>()
                + 2.0 * projection.self_loops[i]
        })
        .collect();
    let total_weight: f64 = degree.iter().sum::<f64>() / 2.0;
    if total_weight <= 0.0 {
        return 0.0;
    }

    let mut community_internal: BTreeMap<usize, f64> = BTreeMap::new();
    let mut community_degree: BTreeMap<usize, f64> = BTreeMap::new();
    for node in 0..n {
        *community_degree.entry(community[node]).or_insert(0.0) += degree[node];
    }
    for node in 0..n {
        *community_internal.entry(community[node]).or_insert(0.0) += 2.0 * projection.self_loops[node];
        for &(neighbor, weight) in &projection.adjacency[node] {
            if community[neighbor] == community[node] {
                *community_internal.entry(community[node]).or_insert(0.0) += weight;
            }
        }
    }

    let mut q = 0.0;
    for (&c, &total) in &community_degree {
        let internal = community_internal.get(&c).copied().unwrap_or(0.0);
        q += internal / (2.0 * total_weight) - (total / (2.0 * total_weight)).powi(2);
    }
    q
}

/// Detect communities and return, for every account with at least one
/// edge, its `community_id` (`None` for singleton communities).
pub fn detect(graph: &Graph) -> BTreeMap<String, Option<u32>> {
    let (nodes, mut projection) = build_projection(graph);
    let n = nodes.len();
    if n == 0 {
        return BTreeMap::new();
    }

    // `membership[i]` is the original node's current community id at this
    // level of aggregation.
    let mut membership: Vec<usize> = (0..n).collect();
    let mut previous_modularity = f64::NEG_INFINITY;

    loop {
        let level_community = local_moving(&projection);
        let level_count = level_community.iter().copied().max().map(|m| m + 1).unwrap_or(0);

        for slot in membership.iter_mut() {
            *slot = level_community[*slot];
        }

        let current_modularity = modularity(&projection, &level_community);
        let no_move_happened = level_count == projection.adjacency.len();
        if no_move_happened || current_modularity - previous_modularity < MODULARITY_GAIN_TOLERANCE {
            break;
        }
        previous_modularity = current_modularity;
        projection = aggregate(&projection, &level_community, level_count);
    }

    let final_membership = renumber(&membership);
    let mut community_size: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in &final_membership {
        *community_size.entry(c).or_insert(0) += 1;
    }

    nodes
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let c = final_membership[i];
            let label = if community_size[&c] >= 2 { Some(c as u32) } else { None };
            (id, label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use chrono::Utc;

    fn tx(sender: &str, receiver: &str, amount: f64) -> crate::Transaction {
        crate::Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn two_dense_clusters_joined_by_a_weak_bridge_separate() {
        let mut transactions = Vec::new();
        for (a, b) in [("A", "B"), ("B", "C"), ("C", "A")] {
            transactions.push(tx(a, b, 1000.0));
        }
        for (a, b) in [("X", "Y"), ("Y", "Z"), ("Z", "X")] {
            transactions.push(tx(a, b, 1000.0));
        }
        transactions.push(tx("A", "X", 1.0));
        let graph = build_graph(&transactions).unwrap();
        let communities = detect(&graph);
        assert_eq!(communities["A"], communities["B"]);
        assert_eq!(communities["A"], communities["C"]);
        assert_eq!(communities["X"], communities["Y"]);
        assert_eq!(communities["X"], communities["Z"]);
        assert_ne!(communities["A"], communities["X"]);
    }

    #[test]
    fn isolated_pair_with_no_other_structure_is_labeled() {
        let transactions = vec![tx("A", "B", 100.0)];
        let graph = build_graph(&transactions).unwrap();
        let communities = detect(&graph);
        assert_eq!(communities["A"], communities["B"]);
        assert!(communities["A"].is_some());
    }
}
