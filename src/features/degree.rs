//! Degree and amount statistics, and the fan-in/fan-out flags derived from
//! them. Grounded on the teacher's `TransactionNode::is_funnel` /
//! `is_distributor` (`network_analysis.rs`), generalized from hardcoded
//! 5/2 thresholds to the configurable ones the spec exposes.

use super::AccountFeatures;
use crate::graph::Graph;
use crate::PipelineConfig;
use std::collections::BTreeMap;

pub fn annotate(graph: &Graph, config: &PipelineConfig, accounts: &mut BTreeMap<String, AccountFeatures>) {
    for (id, account) in accounts.iter_mut() {
        account.in_degree = graph.in_degree(id);
        account.out_degree = graph.out_degree(id);
        account.total_in_amount = graph.total_in_amount(id);
        account.total_out_amount = graph.total_out_amount(id);

        account.fan_in_flag =
            account.in_degree >= config.fan_in_min_in && account.out_degree <= config.fan_in_max_out;
        account.fan_out_flag =
            account.out_degree >= config.fan_out_min_out && account.in_degree <= config.fan_out_max_in;
    }
}
