//! Graph Builder. Aggregates a transaction list into a directed, weighted
//! multigraph keyed by ordered `(sender, receiver)` pairs.
//!
//! Grounded on the teacher's `TransactionGraph` (`network_analysis.rs`):
//! same `HashMap`-of-aggregates shape, generalized to `BTreeMap` so that
//! node and neighbor iteration order is a pure function of account id,
//! never of input order. Determinism and shuffle-invariance follow
//! directly from that choice.

use crate::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One directed monetary transfer, already validated by the (external)
/// ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Coalesced view of every transaction between one ordered pair of
/// accounts. Immutable once the graph is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeAggregate {
    pub total_amount: f64,
    pub transaction_count: usize,
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Directed, weighted multigraph aggregated per ordered `(sender,
/// receiver)` pair. Built once and read-only thereafter: extractors may
/// annotate accounts but must never mutate edges.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeSet<String>,
    edges: BTreeMap<(String, String), EdgeAggregate>,
    out_neighbors: BTreeMap<String, BTreeSet<String>>,
    in_neighbors: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
    fn empty() -> Self {
        Self {
            nodes: BTreeSet::new(),
            edges: BTreeMap::new(),
            out_neighbors: BTreeMap::new(),
            in_neighbors: BTreeMap::new(),
        }
    }

    /// All node ids in sorted (deterministic) order.
    pub fn nodes(&self) -> impl Iterator<Item = &String> {
        self.nodes.iter()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges in sorted `(sender, receiver)` order.
    pub fn edges(&self) -> impl Iterator<Item = (&(String, String), &EdgeAggregate)> {
        self.edges.iter()
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeAggregate> {
        self.edges.get(&(from.to_string(), to.to_string()))
    }

    /// Distinct outgoing counterparties, sorted.
    pub fn out_neighbors(&self, id: &str) -> impl Iterator<Item = &String> {
        self.out_neighbors.get(id).into_iter().flat_map(|s| s.iter())
    }

    /// Distinct incoming counterparties, sorted.
    pub fn in_neighbors(&self, id: &str) -> impl Iterator<Item = &String> {
        self.in_neighbors.get(id).into_iter().flat_map(|s| s.iter())
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.out_neighbors.get(id).map_or(0, |s| s.len())
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.in_neighbors.get(id).map_or(0, |s| s.len())
    }

    pub fn total_out_amount(&self, id: &str) -> f64 {
        self.out_neighbors(id)
            .filter_map(|to| self.edge(id, to))
            .map(|e| e.total_amount)
            .sum()
    }

    pub fn total_in_amount(&self, id: &str) -> f64 {
        self.in_neighbors(id)
            .filter_map(|from| self.edge(from, id))
            .map(|e| e.total_amount)
            .sum()
    }

    /// Every individual incoming or outgoing transaction touching this
    /// account, as `(timestamp, counterparty)` pairs, sorted by time then
    /// counterparty id. One entry per transaction row (not deduplicated),
    /// so both transaction-count and distinct-counterparty windows can be
    /// computed from the same sequence. Used by the temporal extractors.
    pub fn all_events(&self, id: &str) -> Vec<(DateTime<Utc>, String)> {
        let mut events: Vec<(DateTime<Utc>, String)> = Vec::new();
        for to in self.out_neighbors(id) {
            if let Some(edge) = self.edge(id, to) {
                events.extend(edge.timestamps.iter().map(|ts| (*ts, to.clone())));
            }
        }
        for from in self.in_neighbors(id) {
            if let Some(edge) = self.edge(from, id) {
                events.extend(edge.timestamps.iter().map(|ts| (*ts, from.clone())));
            }
        }
        events.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        events
    }
}

/// Build the graph from a validated transaction list. Rejects the whole
/// batch on a missing key field, negative amount, or non-finite amount.
pub fn build_graph(transactions: &[Transaction]) -> Result<Graph, PipelineError> {
    let mut graph = Graph::empty();

    for transaction in transactions {
        let sender = transaction.sender.trim();
        let receiver = transaction.receiver.trim();

        if sender.is_empty() || receiver.is_empty() {
            return Err(PipelineError::InputInvalid(
                "sender and receiver must be non-empty".to_string(),
            ));
        }
        if !transaction.amount.is_finite() || transaction.amount < 0.0 {
            return Err(PipelineError::InputInvalid(format!(
                "amount {} is negative or non-finite",
                transaction.amount
            )));
        }

        graph.nodes.insert(sender.to_string());
        graph.nodes.insert(receiver.to_string());

        graph
            .out_neighbors
            .entry(sender.to_string())
            .or_default()
            .insert(receiver.to_string());
        graph
            .in_neighbors
            .entry(receiver.to_string())
            .or_default()
            .insert(sender.to_string());

        let edge = graph
            .edges
            .entry((sender.to_string(), receiver.to_string()))
            .or_insert_with(|| EdgeAggregate {
                total_amount: 0.0,
                transaction_count: 0,
                timestamps: Vec::new(),
            });
        edge.total_amount += transaction.amount;
        edge.transaction_count += 1;
        edge.timestamps.push(transaction.timestamp);
    }

    for edge in graph.edges.values_mut() {
        edge.timestamps.sort();
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tx(sender: &str, receiver: &str, amount: f64) -> Transaction {
        Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn coalesces_multi_edges() {
        let transactions = vec![tx("A", "B", 100.0), tx("A", "B", 250.0)];
        let graph = build_graph(&transactions).unwrap();
        let edge = graph.edge("A", "B").unwrap();
        assert_eq!(edge.total_amount, 350.0);
        assert_eq!(edge.transaction_count, 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn self_loop_is_retained_as_an_edge() {
        let transactions = vec![tx("A", "A", 100.0)];
        let graph = build_graph(&transactions).unwrap();
        assert!(graph.edge("A", "A").is_some());
        assert_eq!(graph.nodes().count(), 1);
    }

    #[test]
    fn rejects_negative_amount() {
        let transactions = vec![tx("A", "B", -1.0)];
        assert!(build_graph(&transactions).is_err());
    }

    #[test]
    fn rejects_blank_account() {
        let transactions = vec![tx("  ", "B", 10.0)];
        assert!(build_graph(&transactions).is_err());
    }

    #[test]
    fn neighbor_order_is_sorted_not_insertion_order() {
        let transactions = vec![tx("A", "Z", 1.0), tx("A", "B", 1.0), tx("A", "M", 1.0)];
        let graph = build_graph(&transactions).unwrap();
        let order: Vec<&String> = graph.out_neighbors("A").collect();
        assert_eq!(order, vec!["B", "M", "Z"]);
    }

    #[test]
    fn aggregation_is_order_independent() {
        let mut first = vec![tx("A", "B", 10.0), tx("B", "C", 20.0), tx("A", "B", 5.0)];
        let g1 = build_graph(&first).unwrap();
        first.reverse();
        let g2 = build_graph(&first).unwrap();
        assert_eq!(g1.edge("A", "B").unwrap().total_amount, g2.edge("A", "B").unwrap().total_amount);
        assert_eq!(
            g1.edge("A", "B").unwrap().transaction_count,
            g2.edge("A", "B").unwrap().transaction_count
        );
    }
}
