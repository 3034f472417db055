//! Shell-chain detection: a low-degree node is a shell account when it sits
//! inside a run of similarly low-degree intermediaries long enough to look
//! like a pass-through chain rather than a genuine counterparty.
//!
//! Grounded on the teacher's `TransactionNode::is_pass_through`
//! (`network_analysis.rs`), generalized from a single-hop check to the
//! bounded-depth forward/backward walk the spec calls for.

use crate::graph::Graph;
use crate::PipelineConfig;

/// Depth-limit on the forward/backward walk itself. Independent of
/// `shell_min_chain_depth`, which is the minimum qualifying chain length.
const WALK_DEPTH_LIMIT: usize = 3;

fn is_low_degree(graph: &Graph, id: &str, config: &PipelineConfig) -> bool {
    let degree_sum = graph.in_degree(id) + graph.out_degree(id);
    (2..=config.shell_max_degree).contains(&degree_sum)
}

/// Longest run of consecutive low-degree nodes reachable by following a
/// single out-neighbor at a time, starting at (but not counting) `id`.
fn forward_run(graph: &Graph, id: &str, config: &PipelineConfig, depth: usize) -> usize {
    if depth == 0 {
        return 0;
    }
    let Some(next) = graph.out_neighbors(id).next() else {
        return 0;
    };
    if !is_low_degree(graph, next, config) {
        return 0;
    }
    1 + forward_run(graph, next, config, depth - 1)
}

/// Longest run of consecutive low-degree nodes reachable by following a
/// single in-neighbor at a time, starting at (but not counting) `id`.
fn backward_run(graph: &Graph, id: &str, config: &PipelineConfig, depth: usize) -> usize {
    if depth == 0 {
        return 0;
    }
    let Some(previous) = graph.in_neighbors(id).next() else {
        return 0;
    };
    if !is_low_degree(graph, previous, config) {
        return 0;
    }
    1 + backward_run(graph, previous, config, depth - 1)
}

pub fn is_shell(graph: &Graph, account_id: &str, config: &PipelineConfig) -> bool {
    if graph.in_degree(account_id) < 1 || graph.out_degree(account_id) < 1 {
        return false;
    }
    if !is_low_degree(graph, account_id, config) {
        return false;
    }

    let chain_length = 1
        + backward_run(graph, account_id, config, WALK_DEPTH_LIMIT)
        + forward_run(graph, account_id, config, WALK_DEPTH_LIMIT);

    chain_length >= config.shell_min_chain_depth
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
    fn middle_of_a_five_node_chain_is_flagged() {
        let transactions = vec![
            tx("A", "B", 10000.0),
            tx("B", "C", 10000.0),
            tx("C", "D", 10000.0),
            tx("D", "E", 10000.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        assert!(is_shell(&graph, "B", &config));
        assert!(is_shell(&graph, "C", &config));
        assert!(is_shell(&graph, "D", &config));
    }

    #[test]
    fn chain_endpoints_are_not_flagged() {
        let transactions = vec![
            tx("A", "B", 10000.0),
            tx("B", "C", 10000.0),
            tx("C", "D", 10000.0),
            tx("D", "E", 10000.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        assert!(!is_shell(&graph, "A", &config));
        assert!(!is_shell(&graph, "E", &config));
    }

    #[test]
    fn high_degree_hub_is_never_a_shell() {
        let mut transactions: Vec<crate::Transaction> =
            (0..10).map(|i| tx(&format!("S{i}"), "HUB", 100.0)).collect();
        transactions.push(tx("HUB", "OUT", 100.0));
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        assert!(!is_shell(&graph, "HUB", &config));
    }
}
