//! Model checking of bigraphical reactive systems.
//!
//! Starting from an initial agent, the checker applies every rule at every
//! occurrence, identifies successors by canonical form and records the
//! reachable states and labelled transitions in a [`ReactionGraph`]. States
//! are expanded in the order of a [`Frontier`], breadth-first by default.
//!
//! Lifecycle: `Idle → Exploring → (Exhausted | LimitReached) → Done`. Both
//! budgets are checked before each dequeued state and before each
//! occurrence; no transition is recorded beyond the transition budget.
//! Failures while matching or rebuilding a single occurrence are logged and
//! skipped.
//!
//! # Example
//!
//! ```no_run
//! use bigraphs::checker::{ModelChecker, ModelCheckingOptions};
//! use bigraphs::rule::RuleSet;
//! # fn agent() -> bigraphs::core::Bigraph { unimplemented!() }
//!
//! let mut checker = ModelChecker::new(agent(), RuleSet::new(), ModelCheckingOptions::default());
//! let graph = checker.run().unwrap();
//! println!("{} states", graph.state_count());
//! ```

mod listener;
mod options;
mod predicate;
mod strategy;

pub use listener::{ExplorationListener, NoopListener};
pub use options::{ConfigError, ModelCheckingOptions, TransitionOptions};
pub use predicate::{And, IsoPredicate, MatchPredicate, Not, Or, Predicate, PredicateChecker, Verdict};
pub use strategy::{BreadthFirst, DepthFirst, ExplorationStrategy, Frontier, RandomOrder};

use crate::canonical::{CanonicalForm, CanonicalFormError};
use crate::core::Bigraph;
use crate::matching::{Matcher, NaiveMatcher};
use crate::reaction_graph::{ReactionGraph, StateId};
use crate::rule::{ReactionRule, RuleSet};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle of a [`ModelChecker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckerState {
    Idle,
    Exploring,
    /// No frontier state was left.
    Exhausted,
    /// The transition or time budget ran out.
    LimitReached,
    Done,
}

/// Error type for model checking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckerError {
    /// The initial agent cannot be canonicalized.
    #[error("initial agent: {0}")]
    Canonical(#[from] CanonicalFormError),
    /// The operation is not allowed in the checker's current state.
    #[error("checker is {found:?}, expected {expected:?}")]
    InvalidState { expected: CheckerState, found: CheckerState },
}

/// Explores the reaction graph of an agent under a rule set.
pub struct ModelChecker<M: Matcher = NaiveMatcher> {
    agent: Bigraph,
    rules: RuleSet,
    options: ModelCheckingOptions,
    matcher: M,
    predicates: PredicateChecker,
    listeners: Vec<Box<dyn ExplorationListener>>,
    frontier: Option<Box<dyn Frontier>>,
    state: CheckerState,
    outcome: Option<CheckerState>,
    graph: ReactionGraph,
}

impl ModelChecker<NaiveMatcher> {
    /// Checker using the built-in [`NaiveMatcher`].
    pub fn new(agent: Bigraph, rules: RuleSet, options: ModelCheckingOptions) -> Self {
        Self::with_matcher(agent, rules, options, NaiveMatcher)
    }
}

impl<M: Matcher> ModelChecker<M> {
    pub fn with_matcher(agent: Bigraph, rules: RuleSet, options: ModelCheckingOptions, matcher: M) -> Self {
        Self {
            agent,
            rules,
            options,
            matcher,
            predicates: PredicateChecker::new(),
            listeners: Vec::new(),
            frontier: None,
            state: CheckerState::Idle,
            outcome: None,
            graph: ReactionGraph::new(),
        }
    }

    pub fn add_predicate(&mut self, predicate: Box<dyn Predicate>) {
        self.predicates.add(predicate);
    }

    pub fn add_listener(&mut self, listener: Box<dyn ExplorationListener>) {
        self.listeners.push(listener);
    }

    /// Expands states in the order of `frontier` instead of the configured strategy.
    pub fn with_frontier(mut self, frontier: Box<dyn Frontier>) -> Self {
        self.frontier = Some(frontier);
        self
    }

    pub fn state(&self) -> CheckerState {
        self.state
    }

    /// How exploration ended, once it has.
    pub fn outcome(&self) -> Option<CheckerState> {
        self.outcome
    }

    pub fn options(&self) -> &ModelCheckingOptions {
        &self.options
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn reaction_graph(&self) -> &ReactionGraph {
        &self.graph
    }

    pub fn into_reaction_graph(self) -> ReactionGraph {
        self.graph
    }

    /// The encoder that identifies states under the current options.
    pub fn canonical_form(&self) -> CanonicalForm {
        CanonicalForm::new()
            .with_rewrite_open_links(self.options.transition.rewrite_open_links)
            .with_unordered_roots(self.options.transition.allow_reducible_classes)
    }

    /// Explores the state space. May be called once.
    pub fn run(&mut self) -> Result<&ReactionGraph, CheckerError> {
        if self.state != CheckerState::Idle {
            return Err(CheckerError::InvalidState {
                expected: CheckerState::Idle,
                found: self.state,
            });
        }
        let canon = self.canonical_form();
        let initial = canon.encode_state(&self.agent)?;

        self.state = CheckerState::Exploring;
        let outcome = self.explore(canon, initial);
        self.outcome = Some(outcome);
        self.state = outcome;

        let stats = self.graph.stats().clone();
        log::debug!("Total States: {}", stats.states);
        log::debug!("Total Transitions: {}", stats.transitions);
        log::debug!("Total Occurrences: {}", stats.occurrences);
        for listener in &mut self.listeners {
            listener.on_finished(outcome, &stats);
        }
        self.state = CheckerState::Done;
        Ok(&self.graph)
    }

    fn explore(&mut self, canon: CanonicalForm, initial: String) -> CheckerState {
        let ModelChecker {
            agent,
            rules,
            options,
            matcher,
            predicates,
            listeners,
            frontier,
            graph,
            ..
        } = self;
        let max_transitions = options.maximum_transitions();
        let max_time = options.maximum_time();
        let measure = options.measure_time;
        let first_match = options.strategy.first_match_only();
        let mut queue = frontier
            .take()
            .unwrap_or_else(|| options.strategy.frontier(options.random_seed));
        let ordered: Vec<&ReactionRule> = rules.by_priority();
        log::debug!(
            "exploring with {} rules ({:?}), at most {} transitions within {:?}",
            ordered.len(),
            options.strategy,
            max_transitions,
            max_time
        );

        let start = Instant::now();
        let (root, _) = graph.add_state(initial, agent.clone());
        for listener in listeners.iter_mut() {
            listener.on_started(root);
        }
        evaluate(predicates, graph, listeners, root, root);

        queue.push(root);
        let outcome = 'explore: loop {
            if graph.transition_count() >= max_transitions || start.elapsed() >= max_time {
                break CheckerState::LimitReached;
            }
            let current = match queue.pop() {
                Some(current) => current,
                None => break CheckerState::Exhausted,
            };
            let current_agent = match graph.state(current) {
                Some(state) => state.bigraph.clone(),
                None => continue,
            };
            log::trace!("expanding {} ({} queued)", current, queue.len());

            'rules: for rule in &ordered {
                let label = rule.label().unwrap_or_default();
                for listener in listeners.iter_mut() {
                    listener.on_checking_rule(current, label);
                }
                let timer = Instant::now();
                let found = matcher.find_occurrences(&current_agent, rule.redex());
                record(measure, &mut graph.stats_mut().matching_time, timer);
                let occurrences = match found {
                    Ok(occurrences) => occurrences,
                    Err(e) => {
                        log::warn!("rule `{}` on {}: matching failed: {}", label, current, e);
                        graph.stats_mut().failed_occurrences += 1;
                        continue;
                    }
                };
                graph.stats_mut().occurrences += occurrences.len();

                for occurrence in occurrences {
                    if graph.transition_count() >= max_transitions || start.elapsed() >= max_time {
                        break 'explore CheckerState::LimitReached;
                    }
                    let timer = Instant::now();
                    let rebuilt = occurrence.react(rule.reactum(), rule.instantiation_map());
                    record(measure, &mut graph.stats_mut().rewriting_time, timer);
                    let successor = match rebuilt {
                        Ok(successor) => successor,
                        Err(e) => {
                            log::warn!("rule `{}` on {}: rebuilding failed: {}", label, current, e);
                            graph.stats_mut().failed_occurrences += 1;
                            continue;
                        }
                    };

                    let timer = Instant::now();
                    let encoded = canon.encode_state(&successor);
                    record(measure, &mut graph.stats_mut().canonical_time, timer);
                    let encoded = match encoded {
                        Ok(encoded) => encoded,
                        Err(e) => {
                            log::warn!("rule `{}` on {}: successor not canonicalizable: {}", label, current, e);
                            graph.stats_mut().failed_occurrences += 1;
                            continue;
                        }
                    };

                    let (target, fresh) = graph.add_state(encoded, successor);
                    if fresh {
                        queue.push(target);
                    }
                    if fresh || options.reaction_graph_with_cycles {
                        if graph.add_transition(current, target, label) {
                            if let Some(transition) = graph.transitions().last() {
                                for listener in listeners.iter_mut() {
                                    listener.on_rule_applied(transition);
                                }
                            }
                            evaluate(predicates, graph, listeners, root, target);
                        }
                    }
                    if first_match {
                        break 'rules;
                    }
                }
            }
        };
        graph.stats_mut().elapsed = start.elapsed();
        outcome
    }
}

fn record(measure: bool, total: &mut Duration, since: Instant) {
    if measure {
        *total += since.elapsed();
    }
}

/// Evaluates every predicate on `state`, marks the verdicts and notifies listeners.
fn evaluate(
    predicates: &PredicateChecker,
    graph: &mut ReactionGraph,
    listeners: &mut [Box<dyn ExplorationListener>],
    root: StateId,
    state: StateId,
) {
    if predicates.is_empty() {
        return;
    }
    let verdicts = match graph.state(state) {
        Some(s) => predicates.check_all(&s.bigraph),
        None => return,
    };
    for verdict in &verdicts {
        graph.mark_predicate(state, &verdict.name, verdict.holds);
        if verdict.holds {
            for listener in listeners.iter_mut() {
                listener.on_predicate_matched(state, &verdict.name);
            }
        } else {
            let trace = graph.shortest_path(root, state).unwrap_or_default();
            for listener in listeners.iter_mut() {
                listener.on_predicate_violated(state, &verdict.name, &trace);
            }
        }
    }
    if verdicts.iter().all(|v| v.holds) {
        for listener in listeners.iter_mut() {
            listener.on_all_predicates_matched(state);
        }
    }
}
