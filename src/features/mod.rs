//! Feature Extractor. Computes the seven feature families the scoring
//! engine reduces to a per-account score.
//!
//! Each extractor lives in its own submodule (the teacher splits concerns
//! the same way: one file per checker feeding a shared result struct).
//! Every account that appears in any edge ends up with every feature
//! defined. [`AccountFeatures`] is a fixed-schema record, never an open
//! property bag, so that invariant is structural rather than checked.

mod betweenness;
mod community;
mod cycles;
mod degree;
mod pagerank;
mod shell;
mod temporal;

pub use cycles::Cycle;

use crate::graph::Graph;
use crate::PipelineConfig;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Per-account derived attributes. Populated in full by [`extract_features`]
/// for every node that has at least one incident edge.
#[derive(Debug, Clone)]
pub struct AccountFeatures {
    pub account_id: String,
    pub in_degree: usize,
    pub out_degree: usize,
    pub total_in_amount: f64,
    pub total_out_amount: f64,
    pub pagerank: f64,
    pub betweenness: f64,
    pub community_id: Option<u32>,
    pub in_cycle: bool,
    pub cycle_memberships: BTreeSet<u32>,
    pub fan_in_flag: bool,
    pub fan_out_flag: bool,
    pub smurf_flag: bool,
    pub velocity_flag: bool,
    pub shell_flag: bool,
}

impl AccountFeatures {
    fn new(account_id: String) -> Self {
        Self {
            account_id,
            in_degree: 0,
            out_degree: 0,
            total_in_amount: 0.0,
            total_out_amount: 0.0,
            pagerank: 0.0,
            betweenness: 0.0,
            community_id: None,
            in_cycle: false,
            cycle_memberships: BTreeSet::new(),
            fan_in_flag: false,
            fan_out_flag: false,
            smurf_flag: false,
            velocity_flag: false,
            shell_flag: false,
        }
    }

    /// A cycle signal is validated when the account sits in at least two
    /// distinct cycles, or when the highest-value edge on any of its
    /// cycles exceeds 1,000.
    pub fn has_validated_cycle(&self, cycles: &[Cycle]) -> bool {
        if self.cycle_memberships.len() >= 2 {
            return true;
        }
        self.cycle_memberships.iter().any(|id| {
            cycles
                .get(*id as usize)
                .map(|c| c.max_edge_amount > 1000.0)
                .unwrap_or(false)
        })
    }
}

/// Everything the scoring engine needs: the per-account feature records
/// plus the auxiliary structures (cycle arena, network-wide means, and
/// the non-fatal degeneracy flags) that don't fit a single account.
#[derive(Debug, Clone)]
pub struct FeatureBundle {
    pub accounts: BTreeMap<String, AccountFeatures>,
    pub cycles: Vec<Cycle>,
    pub cycles_truncated: bool,
    pub pagerank_converged: bool,
    pub mean_pagerank: f64,
    pub mean_betweenness: f64,
}

impl FeatureBundle {
    pub fn get(&self, account_id: &str) -> Option<&AccountFeatures> {
        self.accounts.get(account_id)
    }
}

/// Run all seven extractors over the graph and assemble the bundle.
pub fn extract_features(graph: &Graph, config: &PipelineConfig) -> FeatureBundle {
    let mut accounts: BTreeMap<String, AccountFeatures> = graph
        .nodes()
        .map(|id| (id.clone(), AccountFeatures::new(id.clone())))
        .collect();

    debug!(nodes = accounts.len(), "degree and amount statistics");
    degree::annotate(graph, config, &mut accounts);

    debug!(
        damping = config.pagerank_damping,
        max_iter = config.pagerank_max_iter,
        "pagerank"
    );
    let (pagerank, pagerank_converged) = pagerank::compute(graph, config);
    for (id, value) in &pagerank {
        if let Some(account) = accounts.get_mut(id) {
            account.pagerank = *value;
        }
    }
    if !pagerank_converged {
        tracing::warn!("pagerank did not converge within max_iter; using last iterate");
    }

    debug!(
        sample_threshold = config.betweenness_sample_threshold_nodes,
        "betweenness centrality"
    );
    let betweenness = betweenness::compute(graph, config);
    for (id, value) in &betweenness {
        if let Some(account) = accounts.get_mut(id) {
            account.betweenness = *value;
        }
    }

    debug!(
        cap = config.cycle_cap,
        bound = config.cycle_length_bound,
        "cycle enumeration"
    );
    let (cycles, cycles_truncated) = cycles::enumerate(graph, config);
    if cycles_truncated {
        tracing::warn!(cap = config.cycle_cap, "cycle cap reached; enumeration truncated");
    }
    for cycle in &cycles {
        for member in &cycle.members {
            if let Some(account) = accounts.get_mut(member) {
                account.in_cycle = true;
                account.cycle_memberships.insert(cycle.id);
            }
        }
    }

    debug!("louvain community detection");
    let communities = community::detect(graph);
    for (id, community_id) in &communities {
        if let Some(account) = accounts.get_mut(id) {
            account.community_id = *community_id;
        }
    }

    debug!(
        window_hours = config.smurfing_window_hours,
        velocity_hours = config.velocity_window_hours,
        "temporal smurfing and velocity"
    );
    for account in accounts.values_mut() {
        let (smurf, velocity) = temporal::flags(graph, &account.account_id, config);
        account.smurf_flag = smurf;
        account.velocity_flag = velocity;
    }

    debug!(
        max_degree = config.shell_max_degree,
        min_depth = config.shell_min_chain_depth,
        "shell chain detection"
    );
    for account in accounts.values_mut() {
        account.shell_flag = shell::is_shell(graph, &account.account_id, config);
    }

    let n = accounts.len().max(1) as f64;
    let mean_pagerank = accounts.values().map(|a| a.pagerank).sum::<f64>() / n;
    let mean_betweenness = accounts.values().map(|a| a.betweenness).sum::<f64>() / n;

    FeatureBundle {
        accounts,
        cycles,
        cycles_truncated,
        pagerank_converged,
        mean_pagerank,
        mean_betweenness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use chrono::{TimeZone, Utc};

    fn tx(sender: &str, receiver: &str, amount: f64, hour: u32) -> crate::Transaction {
        crate::Transaction {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn every_node_gets_every_feature() {
        let transactions = vec![tx("A", "B", 100.0, 0), tx("B", "C", 100.0, 1)];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let bundle = extract_features(&graph, &config);
        for id in graph.nodes() {
            assert!(bundle.get(id).is_some());
        }
    }

    #[test]
    fn pagerank_sums_to_one() {
        let transactions = vec![
            tx("A", "B", 100.0, 0),
            tx("B", "C", 100.0, 1),
            tx("C", "A", 100.0, 2),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let bundle = extract_features(&graph, &config);
        let sum: f64 = bundle.accounts.values().map(|a| a.pagerank).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
