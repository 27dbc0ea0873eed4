//! Exploration strategies.
//!
//! A [`Frontier`] holds the discovered states that still wait for expansion.
//! The order it hands them out in decides the shape of the exploration; the
//! set of reachable states is the same for every complete run.

use crate::reaction_graph::StateId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Work list of states waiting for expansion.
pub trait Frontier {
    fn push(&mut self, state: StateId);

    /// The next state to expand, if any.
    fn pop(&mut self) -> Option<StateId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First in, first out.
#[derive(Debug, Clone, Default)]
pub struct BreadthFirst(VecDeque<StateId>);

impl Frontier for BreadthFirst {
    fn push(&mut self, state: StateId) {
        self.0.push_back(state);
    }

    fn pop(&mut self) -> Option<StateId> {
        self.0.pop_front()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Last in, first out.
#[derive(Debug, Clone, Default)]
pub struct DepthFirst(Vec<StateId>);

impl Frontier for DepthFirst {
    fn push(&mut self, state: StateId) {
        self.0.push(state);
    }

    fn pop(&mut self) -> Option<StateId> {
        self.0.pop()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Uniformly random pick, reproducible from a seed.
#[derive(Debug, Clone)]
pub struct RandomOrder {
    rng: StdRng,
    pending: Vec<StateId>,
}

impl RandomOrder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            pending: Vec::new(),
        }
    }
}

impl Frontier for RandomOrder {
    fn push(&mut self, state: StateId) {
        self.pending.push(state);
    }

    fn pop(&mut self) -> Option<StateId> {
        if self.pending.is_empty() {
            return None;
        }
        let at = self.rng.gen_range(0..self.pending.len());
        Some(self.pending.swap_remove(at))
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Built-in exploration orders, selectable from options files.
///
/// The `*_first_match` variants expand each state through its first
/// successor only: the first occurrence of the first rule, by priority, that
/// yields one. Exploration then follows a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStrategy {
    #[default]
    BreadthFirst,
    BreadthFirstFirstMatch,
    DepthFirst,
    DepthFirstFirstMatch,
    /// Uses `random_seed` from the options.
    Random,
}

impl ExplorationStrategy {
    pub fn frontier(self, seed: u64) -> Box<dyn Frontier> {
        match self {
            Self::BreadthFirst | Self::BreadthFirstFirstMatch => Box::<BreadthFirst>::default(),
            Self::DepthFirst | Self::DepthFirstFirstMatch => Box::<DepthFirst>::default(),
            Self::Random => Box::new(RandomOrder::new(seed)),
        }
    }

    pub fn first_match_only(self) -> bool {
        matches!(self, Self::BreadthFirstFirstMatch | Self::DepthFirstFirstMatch)
    }
}
