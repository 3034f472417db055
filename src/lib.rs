//! # Mule Ring Detector
//!
//! Graph-based detection of money-muling activity in a batch of financial
//! transactions.
//!
//! ## Pipeline
//!
//! 1. [`graph`]: aggregate a transaction list into a directed, weighted graph.
//! 2. [`features`]: extract degree/amount statistics, PageRank, betweenness,
//!    cycles, Louvain communities, temporal smurfing, and shell-chain flags.
//! 3. [`scoring`]: reduce the feature bundle to a per-account suspicion score.
//! 4. [`rings`]: cluster flagged accounts into fraud rings.
//!
//! [`run_pipeline`] runs all four stages in order and returns a
//! [`ResultBundle`] ready for serialization.

pub mod features;
pub mod graph;
pub mod rings;
pub mod scoring;

pub use features::{extract_features, AccountFeatures, Cycle, FeatureBundle};
pub use graph::{build_graph, EdgeAggregate, Graph, Transaction};
pub use rings::{assemble_rings, FraudRing, PatternType};
pub use scoring::{score_accounts, AccountScore, RiskLevel};

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Errors surfaced before any extractor runs. Non-fatal degeneracies
/// (cycle cap, PageRank non-convergence) are not represented here; they
/// are reflected in [`Summary`] instead, per the propagation policy.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum PipelineError {
    #[error("invalid transaction record: {0}")]
    InputInvalid(String),
    #[error("no transactions to analyze after aggregation")]
    EmptyInput,
    #[error("internal precondition violated: {0}")]
    Internal(String),
}

/// Tunable thresholds for every stage of the pipeline. Constructed once by
/// the caller and threaded through explicitly, no process-wide defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fan_in_min_in: usize,
    pub fan_in_max_out: usize,
    pub fan_out_min_out: usize,
    pub fan_out_max_in: usize,

    pub cycle_length_bound: usize,
    pub cycle_cap: usize,

    pub smurfing_window_hours: i64,
    pub smurfing_min_counterparties: usize,

    pub velocity_window_hours: i64,
    pub velocity_threshold: usize,

    pub shell_max_degree: usize,
    pub shell_min_chain_depth: usize,

    pub betweenness_sample_k: usize,
    pub betweenness_sample_threshold_nodes: usize,
    pub betweenness_seed: u64,

    pub pagerank_damping: f64,
    pub pagerank_tol: f64,
    pub pagerank_max_iter: usize,

    pub flag_threshold: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fan_in_min_in: 10,
            fan_in_max_out: 2,
            fan_out_min_out: 10,
            fan_out_max_in: 2,

            cycle_length_bound: 5,
            cycle_cap: 500,

            smurfing_window_hours: 72,
            smurfing_min_counterparties: 10,

            velocity_window_hours: 24,
            velocity_threshold: 10,

            shell_max_degree: 3,
            shell_min_chain_depth: 3,

            betweenness_sample_k: 200,
            betweenness_sample_threshold_nodes: 5000,
            betweenness_seed: 0xC0FFEE,

            pagerank_damping: 0.85,
            pagerank_tol: 1e-6,
            pagerank_max_iter: 100,

            flag_threshold: 40,
        }
    }
}

/// Node/edge list used by downstream visualization consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphSnapshotNode>,
    pub links: Vec<GraphSnapshotLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshotNode {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshotLink {
    pub source: String,
    pub target: String,
    pub total_amount: f64,
    pub transaction_count: usize,
}

/// Aggregate run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_accounts_analyzed: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
    pub cycles_truncated: bool,
    /// Not part of the outbound wire schema; carried for internal callers
    /// that inspect a `Summary` in-process rather than over JSON.
    #[serde(skip_serializing, default)]
    pub pagerank_converged: bool,
}

/// Final output of a pipeline run. Constructed once, never mutated after
/// return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultBundle {
    pub suspicious_accounts: Vec<AccountScore>,
    pub fraud_rings: Vec<FraudRing>,
    #[serde(rename = "graph")]
    pub graph_snapshot: GraphSnapshot,
    pub summary: Summary,
}

impl ResultBundle {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Run the full detection pipeline over one batch of transactions.
///
/// Stages run strictly sequentially: graph construction, feature
/// extraction, scoring, and ring assembly. Any [`PipelineError`] aborts
/// before a partial bundle is produced.
pub fn run_pipeline(
    transactions: &[Transaction],
    config: &PipelineConfig,
) -> Result<ResultBundle, PipelineError> {
    let start = Instant::now();

    if transactions.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let graph = build_graph(transactions)?;
    if graph.nodes().count() == 0 {
        return Err(PipelineError::EmptyInput);
    }

    info!(
        nodes = graph.nodes().count(),
        edges = graph.edge_count(),
        "built transaction graph"
    );

    let bundle = extract_features(&graph, config);
    let mut scores = score_accounts(&graph, &bundle, config);

    let flagged: Vec<AccountScore> = scores
        .iter()
        .filter(|s| s.suspicion_score >= config.flag_threshold as f64)
        .cloned()
        .collect();

    let rings = assemble_rings(&graph, &bundle, &flagged);

    // Back-reference ring_id onto the score list (cycle rings already take
    // precedence in `assemble_rings`'s own conflict resolution).
    let mut ring_of: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
    for ring in &rings {
        for member in &ring.member_accounts {
            ring_of.insert(member.as_str(), ring.ring_id.as_str());
        }
    }
    for score in scores.iter_mut() {
        score.ring_id = ring_of.get(score.account_id.as_str()).map(|s| s.to_string());
    }

    let mut suspicious_accounts: Vec<AccountScore> = scores
        .into_iter()
        .filter(|s| s.suspicion_score >= config.flag_threshold as f64)
        .collect();
    suspicious_accounts.sort_by(|a, b| {
        b.suspicion_score
            .partial_cmp(&a.suspicion_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    let mut fraud_rings = rings;
    fraud_rings.sort_by(|a, b| {
        b.risk_score
            .partial_cmp(&a.risk_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.ring_id.cmp(&b.ring_id))
    });

    let graph_snapshot = GraphSnapshot {
        nodes: graph
            .nodes()
            .map(|id| GraphSnapshotNode { id: id.clone() })
            .collect(),
        links: graph
            .edges()
            .map(|((source, target), edge)| GraphSnapshotLink {
                source: source.clone(),
                target: target.clone(),
                total_amount: edge.total_amount,
                transaction_count: edge.transaction_count,
            })
            .collect(),
    };

    let summary = Summary {
        total_accounts_analyzed: graph.nodes().count(),
        suspicious_accounts_flagged: suspicious_accounts.len(),
        fraud_rings_detected: fraud_rings.len(),
        processing_time_seconds: start.elapsed().as_secs_f64(),
        cycles_truncated: bundle.cycles_truncated,
        pagerank_converged: bundle.pagerank_converged,
    };

    info!(
        flagged = suspicious_accounts.len(),
        rings = fraud_rings.len(),
        elapsed_s = summary.processing_time_seconds,
        "pipeline run complete"
    );

    Ok(ResultBundle {
        suspicious_accounts,
        fraud_rings,
        graph_snapshot,
        summary,
    })
}
