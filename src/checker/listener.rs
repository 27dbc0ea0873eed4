//! Exploration callbacks.

use super::CheckerState;
use crate::reaction_graph::{ExplorationStats, StateId, Transition};

/// Observer of a model-checking run. Every method defaults to doing nothing.
pub trait ExplorationListener {
    /// The initial agent was inserted as `initial`.
    fn on_started(&mut self, _initial: StateId) {}

    /// The rule labelled `rule` is about to be matched against `state`.
    fn on_checking_rule(&mut self, _state: StateId, _rule: &str) {}

    /// A new transition was recorded.
    fn on_rule_applied(&mut self, _transition: &Transition) {}

    fn on_predicate_matched(&mut self, _state: StateId, _predicate: &str) {}

    fn on_all_predicates_matched(&mut self, _state: StateId) {}

    /// `trace` is a shortest path of states from the initial state to `state`.
    fn on_predicate_violated(&mut self, _state: StateId, _predicate: &str, _trace: &[StateId]) {}

    /// `outcome` is either [`CheckerState::Exhausted`] or [`CheckerState::LimitReached`].
    fn on_finished(&mut self, _outcome: CheckerState, _stats: &ExplorationStats) {}
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ExplorationListener for NoopListener {}
