//! Amount-weighted PageRank: a random walk that follows out-edges with
//! probability proportional to `total_amount`, with damping and a
//! dangling-node correction.
//!
//! No analogue exists in the teacher repo; grounded on the standard power
//! iteration formulation (damping factor, uniform dangling redistribution,
//! L1 convergence tolerance) used across the pack's graph-analytics code
//! (e.g. RegulensAI's `graph/mod.rs` centrality fields, `paiml-trueno-graph`).

use crate::graph::Graph;
use crate::PipelineConfig;
use std::collections::BTreeMap;

pub fn compute(graph: &Graph, config: &PipelineConfig) -> (BTreeMap<String, f64>, bool) {
    let nodes: Vec<&String> = graph.nodes().collect();
    let n = nodes.len();
    if n == 0 {
        return (BTreeMap::new(), true);
    }

    let index: BTreeMap<&String, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    // Per-node out-edge weights, proportional to total_amount.
    let mut out_weights: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut out_weight_sum = vec![0.0_f64; n];
    for (i, id) in nodes.iter().enumerate() {
        for to in graph.out_neighbors(id) {
            if let Some(edge) = graph.edge(id, to) {
                let j = index[to];
                out_weights[i].push((j, edge.total_amount));
                out_weight_sum[i] += edge.total_amount;
            }
        }
    }

    let damping = config.pagerank_damping;
    let base = (1.0 - damping) / n as f64;

    let mut rank = vec![1.0 / n as f64; n];
    let mut converged = false;

    for _ in 0..config.pagerank_max_iter {
        let dangling_mass: f64 = (0..n)
            .filter(|&i| out_weight_sum[i] == 0.0)
            .map(|i| rank[i])
            .sum();
        let dangling_share = damping * dangling_mass / n as f64;

        let mut next = vec![base + dangling_share; n];
        for (i, edges) in out_weights.iter().enumerate() {
            if out_weight_sum[i] == 0.0 {
                continue;
            }
            let share = damping * rank[i] / out_weight_sum[i];
            for &(j, weight) in edges {
                next[j] += share * weight;
            }
        }

        let delta: f64 = next.iter().zip(rank.iter()).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < config.pagerank_tol {
            converged = true;
            break;
        }
    }

    // Normalize defensively so rounding error never leaves the
    // distribution measurably off 1.0.
    let total: f64 = rank.iter().sum();
    if total > 0.0 {
        for value in rank.iter_mut() {
            *value /= total;
        }
    }

    let result = nodes
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), rank[i]))
        .collect();
    (result, converged)
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
    fn symmetric_cycle_splits_rank_evenly() {
        let transactions = vec![
            tx("A", "B", 100.0),
            tx("B", "C", 100.0),
            tx("C", "A", 100.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (rank, converged) = compute(&graph, &config);
        assert!(converged);
        for value in rank.values() {
            assert!((value - 1.0 / 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn dangling_node_does_not_leak_mass() {
        let transactions = vec![tx("A", "B", 100.0)];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (rank, _) = compute(&graph, &config);
        let sum: f64 = rank.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn higher_weighted_inbound_edge_yields_higher_rank() {
        let transactions = vec![
            tx("A", "B", 10.0),
            tx("A", "C", 10.0),
            tx("X", "B", 1000.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (rank, _) = compute(&graph, &config);
        assert!(rank["B"] > rank["C"]);
    }
}
