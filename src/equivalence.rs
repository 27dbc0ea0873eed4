//! Behavioural equivalence of reaction graphs.
//!
//! Strong bisimilarity over rule-labelled transitions, decided by partition
//! refinement on the disjoint union of the states reachable from the two
//! starting points.
//!
//! # Citations
//! - Kanellakis & Smolka, "CCS expressions, finite state processes, and three problems of equivalence" (1990)
//! - Milner, "Communication and Concurrency" (1989), Chapter 4 (strong bisimulation)

use crate::reaction_graph::{ReactionGraph, StateId};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A state of either graph: `(graph, state)`, where `graph` is 0 or 1.
type Vertex = (usize, StateId);

fn reachable(graph: &ReactionGraph, from: StateId) -> Vec<StateId> {
    let mut seen = vec![false; graph.state_count()];
    let mut order = Vec::new();
    let mut queue = VecDeque::new();
    if from.index() < seen.len() {
        seen[from.index()] = true;
        queue.push_back(from);
    }
    while let Some(current) = queue.pop_front() {
        order.push(current);
        for t in graph.outgoing(current) {
            if !seen[t.target.index()] {
                seen[t.target.index()] = true;
                queue.push_back(t.target);
            }
        }
    }
    order
}

/// Returns `true` if state `s1` of `g1` and state `s2` of `g2` are strongly bisimilar.
///
/// States outside their graph are bisimilar to nothing.
pub fn is_bisimilar(g1: &ReactionGraph, s1: StateId, g2: &ReactionGraph, s2: StateId) -> bool {
    if g1.state(s1).is_none() || g2.state(s2).is_none() {
        return false;
    }
    let graphs = [g1, g2];
    let vertices: Vec<Vertex> = reachable(g1, s1)
        .into_iter()
        .map(|s| (0, s))
        .chain(reachable(g2, s2).into_iter().map(|s| (1, s)))
        .collect();

    let mut block: HashMap<Vertex, usize> = vertices.iter().map(|v| (*v, 0)).collect();
    let mut blocks = 1;
    loop {
        // A vertex's signature: its block and the (label, target block) pairs it can reach.
        let mut ids: HashMap<(usize, BTreeSet<(&str, usize)>), usize> = HashMap::new();
        let mut next: HashMap<Vertex, usize> = HashMap::with_capacity(vertices.len());
        for &(g, s) in &vertices {
            let moves: BTreeSet<(&str, usize)> = graphs[g]
                .outgoing(s)
                .map(|t| (t.label.as_str(), block[&(g, t.target)]))
                .collect();
            let fresh = ids.len();
            let id = *ids.entry((block[&(g, s)], moves)).or_insert(fresh);
            next.insert((g, s), id);
        }
        block = next;
        if ids.len() == blocks {
            break;
        }
        blocks = ids.len();
    }
    block[&(0, s1)] == block[&(1, s2)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_context;

    /// Builds a graph from labelled edges over `n` states.
    fn graph(n: usize, edges: &[(u32, u32, &str)]) -> ReactionGraph {
        let ctx = fixture_context();
        let mut g = ReactionGraph::new();
        for i in 0..n {
            g.add_state(format!("x{}", i), ctx.barren().unwrap());
        }
        for (s, t, label) in edges {
            g.add_transition(StateId::new(*s), StateId::new(*t), label);
        }
        g
    }

    #[test]
    fn equal_chains() {
        let a = graph(3, &[(0, 1, "fire"), (1, 2, "fire")]);
        let b = graph(3, &[(0, 1, "fire"), (1, 2, "fire")]);
        assert!(is_bisimilar(&a, StateId::new(0), &b, StateId::new(0)));
        assert!(!is_bisimilar(&a, StateId::new(0), &b, StateId::new(1)));
    }

    /// A two-state cycle unfolds to a self loop.
    #[test]
    fn cycle_and_self_loop() {
        let cycle = graph(2, &[(0, 1, "a"), (1, 0, "a")]);
        let looped = graph(1, &[(0, 0, "a")]);
        assert!(is_bisimilar(&cycle, StateId::new(0), &looped, StateId::new(0)));
        let other = graph(1, &[(0, 0, "b")]);
        assert!(!is_bisimilar(&cycle, StateId::new(0), &other, StateId::new(0)));
    }

    /// Branching time matters: a.(b + c) differs from a.b + a.c.
    #[test]
    fn branching_distinguishes() {
        let late = graph(4, &[(0, 1, "a"), (1, 2, "b"), (1, 3, "c")]);
        let early = graph(5, &[(0, 1, "a"), (0, 2, "a"), (1, 3, "b"), (2, 4, "c")]);
        assert!(!is_bisimilar(&late, StateId::new(0), &early, StateId::new(0)));
        assert!(!is_bisimilar(&late, StateId::new(9), &early, StateId::new(0)));
    }
}
