//! Fraud-Ring Assembler. Groups flagged accounts into rings by shared
//! cycle membership first, then by shared Louvain community for whoever
//! is left unassigned. Cycle rings always win a conflict.
//!
//! Grounded on `polysettle-clearing-engine`'s union-find merge of
//! overlapping payment cycles (`cycle_detection.rs`), adapted to merge
//! *rings* sharing a flagged member rather than raw cycles sharing any
//! member.

use crate::features::FeatureBundle;
use crate::graph::Graph;
use crate::scoring::AccountScore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Cycle,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub member_accounts: Vec<String>,
    pub pattern_type: PatternType,
    pub risk_score: f64,
    pub total_amount: f64,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

fn total_amount_within(graph: &Graph, members: &BTreeSet<String>) -> f64 {
    graph
        .edges()
        .filter(|((sender, receiver), _)| members.contains(sender) && members.contains(receiver))
        .map(|(_, edge)| edge.total_amount)
        .sum()
}

fn risk_score(scores_by_id: &BTreeMap<&str, f64>, members: &BTreeSet<String>) -> f64 {
    let values: Vec<f64> = members.iter().filter_map(|id| scores_by_id.get(id.as_str()).copied()).collect();
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    mean.round()
}

pub fn assemble_rings(
    graph: &Graph,
    bundle: &FeatureBundle,
    flagged: &[AccountScore],
) -> Vec<FraudRing> {
    let flagged_ids: BTreeSet<&str> = flagged.iter().map(|s| s.account_id.as_str()).collect();
    let scores_by_id: BTreeMap<&str, f64> =
        flagged.iter().map(|s| (s.account_id.as_str(), s.suspicion_score)).collect();

    // 1. Cycle-based candidate rings: one per cycle with >= 2 flagged members.
    let mut candidate_members: Vec<BTreeSet<String>> = Vec::new();
    for cycle in &bundle.cycles {
        let members: BTreeSet<String> = cycle
            .members
            .iter()
            .filter(|id| flagged_ids.contains(id.as_str()))
            .cloned()
            .collect();
        if members.len() >= 2 {
            candidate_members.push(members);
        }
    }

    // 2. Merge candidate rings sharing >= 1 member via union-find.
    let mut uf = UnionFind::new(candidate_members.len());
    for i in 0..candidate_members.len() {
        for j in (i + 1)..candidate_members.len() {
            if !candidate_members[i].is_disjoint(&candidate_members[j]) {
                uf.union(i, j);
            }
        }
    }
    let mut merged: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for i in 0..candidate_members.len() {
        let root = uf.find(i);
        merged.entry(root).or_default().extend(candidate_members[i].iter().cloned());
    }

    let mut assigned: BTreeSet<String> = BTreeSet::new();
    let mut rings: Vec<(BTreeSet<String>, PatternType)> = Vec::new();
    for members in merged.into_values() {
        assigned.extend(members.iter().cloned());
        rings.push((members, PatternType::Cycle));
    }

    // 3. Community-based rings for flagged accounts not already assigned.
    let mut by_community: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
    for id in &flagged_ids {
        if assigned.contains(*id) {
            continue;
        }
        if let Some(community_id) = bundle.get(id).and_then(|a| a.community_id) {
            by_community.entry(community_id).or_default().insert(id.to_string());
        }
    }
    for members in by_community.into_values() {
        if members.len() >= 2 {
            assigned.extend(members.iter().cloned());
            rings.push((members, PatternType::Community));
        }
    }

    // 4. Assign ring_id stable by minimum member id within each ring.
    rings.sort_by(|a, b| a.0.iter().next().cmp(&b.0.iter().next()));

    rings
        .into_iter()
        .enumerate()
        .map(|(index, (members, pattern_type))| {
            let ring_id = format!("RING_{:03}", index + 1);
            let total_amount = total_amount_within(graph, &members);
            let score = risk_score(&scores_by_id, &members);
            FraudRing {
                ring_id,
                member_accounts: members.into_iter().collect(),
                pattern_type,
                risk_score: score,
                total_amount,
            }
        })
        .collect()
}
