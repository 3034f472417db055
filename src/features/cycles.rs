//! Bounded simple directed cycle enumeration.
//!
//! Grounded on `polysettle-clearing-engine`'s `cycle_detection.rs`: DFS from
//! every node with a visited-on-stack set, a canonical rotation for
//! deduplicating cycles discovered from more than one starting point, and a
//! running cap that stops the search once enough cycles have been found.
//! Self-loops are real edges but are excluded here: a cycle of length 1
//! carries no smurfing-style laundering signal on its own.

use crate::graph::Graph;
use crate::PipelineConfig;

/// One simple directed cycle, identified by an integer id stable across a
/// single enumeration run. Nodes hold only the id, never a reference to the
/// cycle itself, so there is no possibility of a reference cycle between
/// node and cycle records.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub id: u32,
    pub members: Vec<String>,
    pub max_edge_amount: f64,
}

/// Rotate `members` to start at its lexicographically smallest element.
/// Two descriptions of the same directed cycle (found from different start
/// nodes) always rotate to the same canonical form; the reverse traversal
/// of the same node set rotates to a different one, since direction matters.
fn canonical_form(members: &[String]) -> Vec<String> {
    if members.is_empty() {
        return Vec::new();
    }
    let min_index = members
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    members[min_index..]
        .iter()
        .chain(members[..min_index].iter())
        .cloned()
        .collect()
}

fn max_edge_amount(graph: &Graph, members: &[String]) -> f64 {
    let mut max_amount = 0.0_f64;
    for window in members.windows(2) {
        if let Some(edge) = graph.edge(&window[0], &window[1]) {
            max_amount = max_amount.max(edge.total_amount);
        }
    }
    if let (Some(last), Some(first)) = (members.last(), members.first()) {
        if let Some(edge) = graph.edge(last, first) {
            max_amount = max_amount.max(edge.total_amount);
        }
    }
    max_amount
}

struct Search<'a> {
    graph: &'a Graph,
    length_bound: usize,
    cap: usize,
    start: &'a str,
    stack: Vec<String>,
    on_stack: Vec<String>,
    found: Vec<Vec<String>>,
    seen: std::collections::BTreeSet<Vec<String>>,
    truncated: bool,
}

impl<'a> Search<'a> {
    fn dfs(&mut self, current: &str) {
        if self.found.len() >= self.cap {
            self.truncated = true;
            return;
        }
        for next in self.graph.out_neighbors(current).cloned().collect::<Vec<_>>() {
            if self.found.len() >= self.cap {
                self.truncated = true;
                return;
            }
            if next == self.start {
                if self.stack.len() >= 2 {
                    let canonical = canonical_form(&self.stack);
                    if self.seen.insert(canonical.clone()) {
                        self.found.push(canonical);
                    }
                }
                continue;
            }
            if self.on_stack.contains(&next) {
                continue;
            }
            if self.stack.len() + 1 > self.length_bound {
                continue;
            }
            // Only extend through nodes that sort after the start node, so
            // each simple cycle is discovered from exactly one starting
            // point (its lexicographically smallest member).
            if next.as_str() <= self.start {
                continue;
            }
            self.stack.push(next.clone());
            self.on_stack.push(next.clone());
            self.dfs(&next);
            self.stack.pop();
            self.on_stack.pop();
        }
    }
}

pub fn enumerate(graph: &Graph, config: &PipelineConfig) -> (Vec<Cycle>, bool) {
    let mut all_found: Vec<Vec<String>> = Vec::new();
    let mut seen: std::collections::BTreeSet<Vec<String>> = std::collections::BTreeSet::new();
    let mut truncated = false;

    for start in graph.nodes() {
        if all_found.len() >= config.cycle_cap {
            truncated = true;
            break;
        }
        let mut search = Search {
            graph,
            length_bound: config.cycle_length_bound,
            cap: config.cycle_cap.saturating_sub(all_found.len()),
            start,
            stack: vec![start.clone()],
            on_stack: vec![start.clone()],
            found: Vec::new(),
            seen: std::collections::BTreeSet::new(),
            truncated: false,
        };
        search.dfs(start);
        truncated = truncated || search.truncated;
        for members in search.found {
            if seen.insert(members.clone()) {
                all_found.push(members);
            }
        }
    }

    all_found.sort();
    let cycles = all_found
        .into_iter()
        .enumerate()
        .map(|(index, members)| {
            let max_edge_amount = max_edge_amount(graph, &members);
            Cycle { id: index as u32, members, max_edge_amount }
        })
        .collect();

    (cycles, truncated)
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
    fn finds_a_simple_triangle() {
        let transactions = vec![tx("A", "B", 500.0), tx("B", "C", 500.0), tx("C", "A", 500.0)];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (cycles, truncated) = enumerate(&graph, &config);
        assert!(!truncated);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members, vec!["A", "B", "C"]);
        assert_eq!(cycles[0].max_edge_amount, 500.0);
    }

    #[test]
    fn self_loop_does_not_count_as_a_cycle() {
        let transactions = vec![tx("A", "A", 500.0)];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (cycles, _) = enumerate(&graph, &config);
        assert!(cycles.is_empty());
    }

    #[test]
    fn two_triangles_sharing_a_node_are_both_found() {
        let transactions = vec![
            tx("A", "B", 5000.0),
            tx("B", "C", 5000.0),
            tx("C", "A", 5000.0),
            tx("A", "D", 5000.0),
            tx("D", "E", 5000.0),
            tx("E", "A", 5000.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (cycles, _) = enumerate(&graph, &config);
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn no_back_edge_is_followed_past_the_length_bound() {
        // A 6-node directed cycle exceeds the default length bound of 5.
        let transactions = vec![
            tx("A", "B", 100.0),
            tx("B", "C", 100.0),
            tx("C", "D", 100.0),
            tx("D", "E", 100.0),
            tx("E", "F", 100.0),
            tx("F", "A", 100.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (cycles, _) = enumerate(&graph, &config);
        assert!(cycles.is_empty());
    }

    #[test]
    fn cycle_order_is_deterministic_across_runs() {
        let transactions = vec![
            tx("A", "B", 5000.0),
            tx("B", "C", 5000.0),
            tx("C", "A", 5000.0),
            tx("A", "D", 5000.0),
            tx("D", "E", 5000.0),
            tx("E", "A", 5000.0),
        ];
        let graph = build_graph(&transactions).unwrap();
        let config = PipelineConfig::default();
        let (first, _) = enumerate(&graph, &config);
        let (second, _) = enumerate(&graph, &config);
        let first_ids: Vec<&Vec<String>> = first.iter().map(|c| &c.members).collect();
        let second_ids: Vec<&Vec<String>> = second.iter().map(|c| &c.members).collect();
        assert_eq!(first_ids, second_ids);
    }
}
