//! Temporal smurfing and velocity flags: both are sliding-window counts
//! over the same per-account event stream, advanced with the classic
//! two-pointer technique so each window is evaluated in a single linear
//! pass rather than re-scanned per candidate start.

use crate::graph::Graph;
use crate::PipelineConfig;
use chrono::Duration;
use std::collections::BTreeMap;

/// `(smurf_flag, velocity_flag)` for one account.
pub fn flags(graph: &Graph, account_id: &str, config: &PipelineConfig) -> (bool, bool) {
    let events = graph.all_events(account_id);
    if events.is_empty() {
        return (false, false);
    }

    let smurf = max_distinct_counterparties_in_window(
        &events,
        Duration::hours(config.smurfing_window_hours),
    ) >= config.smurfing_min_counterparties;

    let velocity =
        max_transactions_in_window(&events, Duration::hours(config.velocity_window_hours))
            > config.velocity_threshold;

    (smurf, velocity)
}

fn max_transactions_in_window(
    events: &[(chrono::DateTime<chrono::Utc>, String)],
    window: Duration,
) -> usize {
    let mut left = 0;
    let mut best = 0;
    for right in 0..events.len() {
        while events[right].0 - events[left].0 > window {
            left += 1;
        }
        best = best.max(right - left + 1);
    }
    best
}

fn max_distinct_counterparties_in_window(
    events: &[(chrono::DateTime<chrono::Utc>, String)],
    window: Duration,
) -> usize {
    let mut left = 0;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut best = 0;
    for right in 0..events.len() {
        *counts.entry(events[right].1.as_str()).or_insert(0) += 1;
        while events[right].0 - events[left].0 > window {
            let entry = counts.get_mut(events[left].1.as_str()).unwrap();
            *entry -= 1;
            if *entry == 0 {
                counts.remove(events[left].1.as_str());
            }
            left += 1;
        }
        best = best.max(counts.len());
    }
    best
}
