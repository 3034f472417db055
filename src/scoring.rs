//! Scoring Engine. Reduces the feature bundle to a per-account suspicion
//! score via additive primary signals, supporting signals gated on at
//! least one primary signal, and subtractive suppressions for account
//! shapes that explain the same topology innocently (payroll, merchant,
//! payment gateway).
//!
//! Grounded on the teacher's `FraudDetector::calculate_fraud_score`
//! (`fraud_patterns.rs`): same additive-then-clamp shape and `FraudFlag`
//! list, generalized to the graph-native signal set this spec defines.

use crate::features::FeatureBundle;
use crate::graph::Graph;
use crate::PipelineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::Critical
        } else if score >= 60.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountScore {
    pub account_id: String,
    pub suspicion_score: f64,
    pub risk_level: RiskLevel,
    pub detected_patterns: Vec<String>,
    pub primary_reason: String,
    pub ring_id: Option<String>,
}

/// The stable pattern-tag order the spec requires for `detected_patterns`.
const PATTERN_ORDER: &[&str] = &[
    "cycle",
    "fan_in",
    "fan_out",
    "smurfing",
    "shell",
    "velocity",
    "community",
    "high_pagerank",
    "high_betweenness",
];

fn forwards_funds_onward(graph: &Graph, account_id: &str) -> bool {
    graph.out_degree(account_id) >= 1
}

fn score_one(graph: &Graph, bundle: &FeatureBundle, account_id: &str, _config: &PipelineConfig) -> AccountScore {
    let account = bundle.get(account_id).expect("every graph node has a feature record");

    let mut patterns: Vec<&'static str> = Vec::new();
    let mut total = 0.0_f64;

    // Primary signals.
    let mut primary_fired = false;
    if account.in_cycle {
        if account.has_validated_cycle(&bundle.cycles) {
            total += 40.0;
        } else {
            total += 10.0;
        }
        patterns.push("cycle");
        primary_fired = true;
    }
    if account.fan_in_flag {
        total += 25.0;
        patterns.push("fan_in");
        primary_fired = true;
    }
    if account.fan_out_flag {
        total += 25.0;
        patterns.push("fan_out");
        primary_fired = true;
    }
    if account.smurf_flag {
        total += 25.0;
        patterns.push("smurfing");
        primary_fired = true;
    }
    if account.shell_flag {
        total += 30.0;
        patterns.push("shell");
        primary_fired = true;
    }
    if account.velocity_flag {
        total += 20.0;
        patterns.push("velocity");
        primary_fired = true;
    }

    // Supporting signals, gated on at least one primary signal having fired.
    if primary_fired {
        if bundle.mean_pagerank > 0.0 && account.pagerank > 2.0 * bundle.mean_pagerank {
            total += 5.0;
            patterns.push("high_pagerank");
        }
        if bundle.mean_betweenness > 0.0 && account.betweenness > 2.0 * bundle.mean_betweenness {
            total += 5.0;
            patterns.push("high_betweenness");
        }
        if account.community_id.is_some() {
            total += 10.0;
            patterns.push("community");
        }
    }

    // Suppressions.
    if !account.in_cycle {
        let out_degree = graph.out_degree(account_id);
        let in_degree = graph.in_degree(account_id);

        if out_degree >= 10 {
            let recipients: Vec<&String> = graph.out_neighbors(account_id).collect();
            let forwarding = recipients
                .iter()
                .filter(|recipient| forwards_funds_onward(graph, recipient))
                .count();
            let forwarding_share = forwarding as f64 / recipients.len().max(1) as f64;
            if forwarding_share < 0.20 {
                total -= 30.0;
            }
        }
        if in_degree >= 10 && out_degree <= 1 {
            total -= 40.0;
        }
        if in_degree >= 50 && out_degree >= 50 {
            total -= 40.0;
        }
        if !primary_fired && out_degree <= 2 {
            total -= 20.0;
        }
    }
    if account.cycle_memberships.len() == 1 {
        let only_cycle_id = *account.cycle_memberships.iter().next().unwrap();
        if let Some(cycle) = bundle.cycles.get(only_cycle_id as usize) {
            if cycle.max_edge_amount < 1000.0 {
                total -= 15.0;
            }
        }
    }

    let suspicion_score = total.clamp(0.0, 100.0);
    let risk_level = RiskLevel::from_score(suspicion_score);

    // `patterns` may have accumulated out of PATTERN_ORDER (supporting
    // signals are pushed after primary ones, which already matches it, but
    // re-sort defensively so the order is guaranteed even if a future
    // signal is added out of sequence).
    patterns.sort_by_key(|tag| PATTERN_ORDER.iter().position(|p| p == tag).unwrap_or(usize::MAX));

    let primary_reason = if patterns.is_empty() {
        "No primary suspicious pattern detected.".to_string()
    } else {
        let leading: Vec<&str> = patterns.iter().take(3).copied().collect();
        format!("Flagged for: {}.", leading.join(", "))
    };

    AccountScore {
        account_id: account_id.to_string(),
        suspicion_score,
        risk_level,
        detected_patterns: patterns.into_iter().map(str::to_string).collect(),
        primary_reason,
        ring_id: None,
    }
}

/// Score every account in the graph. Order follows the graph's node
/// iteration order (account id ascending); callers that need score-ranked
/// output should sort the result themselves.
pub fn score_accounts(graph: &Graph, bundle: &FeatureBundle, config: &PipelineConfig) -> Vec<AccountScore> {
    graph.nodes().map(|id| score_one(graph, bundle, id, config)).collect()
}
