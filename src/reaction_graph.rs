//! The reaction graph built by the model checker.
//!
//! States are agents identified by their canonical string; at most one state
//! exists per canonical form. Transitions are labelled with the rule that
//! produced them and are unique per `(source, target, label)`.
//!
//! A [`GraphSnapshot`] carries the plain data (labels, canonical strings,
//! predicate marks, transitions) without the agents themselves and is the
//! exchange format for exporters. It is stored as CBOR.

use crate::core::Bigraph;
use crate::fingerprint::{state_digest, HashValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Dense index of a state in its reaction graph.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(u32);

impl StateId {
    /// The id of the state at position `index` in discovery order.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position in [`ReactionGraph::states`].
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A reachable agent.
#[derive(Debug, Clone)]
pub struct State {
    pub id: StateId,
    /// Display label `a_<n>`, in discovery order.
    pub label: String,
    pub canonical: String,
    pub digest: HashValue,
    pub bigraph: Bigraph,
    /// Verdict of every predicate evaluated on this state, by predicate name.
    pub predicates: BTreeMap<String, bool>,
}

/// A labelled reaction step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub label: String,
}

/// Counters and timings of one exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationStats {
    /// States discovered, the initial one included.
    pub states: usize,
    /// Transitions recorded.
    pub transitions: usize,
    /// Occurrences reported by the matcher, including ones that led to known states.
    pub occurrences: usize,
    /// Occurrences skipped because matching or recomposition failed.
    pub failed_occurrences: usize,
    /// Wall-clock time of the whole exploration.
    pub elapsed: Duration,
    /// Time spent in the matcher; only measured when requested.
    pub matching_time: Duration,
    /// Time spent building successors; only measured when requested.
    pub rewriting_time: Duration,
    /// Time spent canonicalizing successors; only measured when requested.
    pub canonical_time: Duration,
}

/// Error type for snapshot persistence.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("CBOR encoding failed: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// States and labelled transitions discovered so far.
#[derive(Debug, Clone, Default)]
pub struct ReactionGraph {
    states: Vec<State>,
    by_canonical: HashMap<String, StateId>,
    transitions: Vec<Transition>,
    edge_keys: HashSet<Transition>,
    outgoing: Vec<Vec<usize>>,
    stats: ExplorationStats,
}

impl ReactionGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a state unless one with the same canonical string exists.
    ///
    /// Returns the state's id and whether it was newly created.
    pub fn add_state(&mut self, canonical: String, bigraph: Bigraph) -> (StateId, bool) {
        if let Some(id) = self.by_canonical.get(&canonical) {
            return (*id, false);
        }
        let id = StateId::new(self.states.len() as u32);
        self.states.push(State {
            id,
            label: format!("a_{}", id.0),
            digest: state_digest(&canonical),
            canonical: canonical.clone(),
            bigraph,
            predicates: BTreeMap::new(),
        });
        self.outgoing.push(Vec::new());
        self.by_canonical.insert(canonical, id);
        self.stats.states = self.states.len();
        (id, true)
    }

    /// Records a transition; returns `false` if the same labelled edge exists.
    pub fn add_transition(&mut self, source: StateId, target: StateId, label: &str) -> bool {
        let transition = Transition {
            source,
            target,
            label: label.to_string(),
        };
        if self.edge_keys.contains(&transition) || source.index() >= self.states.len() {
            return false;
        }
        self.edge_keys.insert(transition.clone());
        if let Some(out) = self.outgoing.get_mut(source.index()) {
            out.push(self.transitions.len());
        }
        self.transitions.push(transition);
        self.stats.transitions = self.transitions.len();
        true
    }

    /// The first state inserted.
    pub fn initial(&self) -> Option<StateId> {
        self.states.first().map(|s| s.id)
    }

    /// The state with id `id`, if recorded.
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// All states in discovery order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Looks a state up by its canonical string.
    pub fn state_by_canonical(&self, canonical: &str) -> Option<StateId> {
        self.by_canonical.get(canonical).copied()
    }

    /// All transitions in recording order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Transitions leaving `id`, in insertion order.
    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = &Transition> {
        self.outgoing
            .get(id.index())
            .into_iter()
            .flatten()
            .map(move |i| &self.transitions[*i])
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Records a predicate verdict on a state.
    pub fn mark_predicate(&mut self, id: StateId, predicate: &str, holds: bool) {
        if let Some(state) = self.states.get_mut(id.index()) {
            state.predicates.insert(predicate.to_string(), holds);
        }
    }

    /// Counters of the exploration that built this graph.
    pub fn stats(&self) -> &ExplorationStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ExplorationStats {
        &mut self.stats
    }

    /// Shortest path of states from `from` to `to` (breadth-first), both included.
    pub fn shortest_path(&self, from: StateId, to: StateId) -> Option<Vec<StateId>> {
        if from.index() >= self.states.len() || to.index() >= self.states.len() {
            return None;
        }
        let mut previous: HashMap<StateId, StateId> = HashMap::new();
        let mut seen: HashSet<StateId> = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(prev) = previous.get(&cursor) {
                    path.push(*prev);
                    cursor = *prev;
                }
                path.reverse();
                return Some(path);
            }
            for transition in self.outgoing(current) {
                if seen.insert(transition.target) {
                    previous.insert(transition.target, current);
                    queue.push_back(transition.target);
                }
            }
        }
        None
    }

    /// Plain-data view of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            states: self
                .states
                .iter()
                .map(|s| StateRecord {
                    id: s.id,
                    label: s.label.clone(),
                    canonical: s.canonical.clone(),
                    digest: s.digest,
                    predicates: s.predicates.clone(),
                })
                .collect(),
            transitions: self.transitions.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Exported state data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: StateId,
    /// Display label `a_<n>`.
    pub label: String,
    pub canonical: String,
    pub digest: HashValue,
    pub predicates: BTreeMap<String, bool>,
}

/// Serializable snapshot of a [`ReactionGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// States without their bigraphs.
    pub states: Vec<StateRecord>,
    pub transitions: Vec<Transition>,
    pub stats: ExplorationStats,
}

impl GraphSnapshot {
    /// Serializes the snapshot to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserializes a snapshot from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    /// Writes the CBOR encoding to `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    /// Reads a snapshot written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}
