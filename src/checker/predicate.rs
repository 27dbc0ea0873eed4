//! State predicates evaluated during exploration.

use crate::canonical::{CanonicalForm, CanonicalFormError};
use crate::core::Bigraph;
use crate::matching::{Matcher, NaiveMatcher};
use std::fmt;

/// A named yes/no question about an agent.
pub trait Predicate: fmt::Debug {
    fn name(&self) -> &str;

    /// Returns `true` if the predicate holds for `agent`.
    fn test(&self, agent: &Bigraph) -> bool;
}

/// Holds for agents isomorphic to a fixed target.
#[derive(Debug, Clone)]
pub struct IsoPredicate {
    name: String,
    form: CanonicalForm,
    canonical: String,
}

impl IsoPredicate {
    /// `form` must be the encoder used for states so that strings compare.
    pub fn new(name: impl Into<String>, target: &Bigraph, form: CanonicalForm) -> Result<Self, CanonicalFormError> {
        Ok(Self {
            name: name.into(),
            canonical: form.encode_state(target)?,
            form,
        })
    }
}

impl Predicate for IsoPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, agent: &Bigraph) -> bool {
        self.form
            .encode_state(agent)
            .map_or(false, |canonical| canonical == self.canonical)
    }
}

/// Holds for agents containing at least one occurrence of a pattern.
#[derive(Debug, Clone)]
pub struct MatchPredicate {
    name: String,
    pattern: Bigraph,
}

impl MatchPredicate {
    pub fn new(name: impl Into<String>, pattern: Bigraph) -> Self {
        Self {
            name: name.into(),
            pattern,
        }
    }
}

impl Predicate for MatchPredicate {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, agent: &Bigraph) -> bool {
        match NaiveMatcher.find_occurrences(agent, &self.pattern) {
            Ok(found) => !found.is_empty(),
            Err(e) => {
                log::warn!("predicate `{}`: matching failed: {}", self.name, e);
                false
            }
        }
    }
}

fn joined(parts: &[Box<dyn Predicate>], op: &str) -> String {
    let names: Vec<&str> = parts.iter().map(|p| p.name()).collect();
    format!("({})", names.join(op))
}

/// Conjunction; the empty conjunction holds.
#[derive(Debug)]
pub struct And {
    name: String,
    parts: Vec<Box<dyn Predicate>>,
}

impl And {
    pub fn new(parts: Vec<Box<dyn Predicate>>) -> Self {
        Self {
            name: joined(&parts, " && "),
            parts,
        }
    }
}

impl Predicate for And {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, agent: &Bigraph) -> bool {
        self.parts.iter().all(|p| p.test(agent))
    }
}

/// Disjunction; the empty disjunction fails.
#[derive(Debug)]
pub struct Or {
    name: String,
    parts: Vec<Box<dyn Predicate>>,
}

impl Or {
    pub fn new(parts: Vec<Box<dyn Predicate>>) -> Self {
        Self {
            name: joined(&parts, " || "),
            parts,
        }
    }
}

impl Predicate for Or {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, agent: &Bigraph) -> bool {
        self.parts.iter().any(|p| p.test(agent))
    }
}

#[derive(Debug)]
pub struct Not {
    name: String,
    inner: Box<dyn Predicate>,
}

impl Not {
    pub fn new(inner: Box<dyn Predicate>) -> Self {
        Self {
            name: format!("!{}", inner.name()),
            inner,
        }
    }
}

impl Predicate for Not {
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, agent: &Bigraph) -> bool {
        !self.inner.test(agent)
    }
}

/// Outcome of one predicate on one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub name: String,
    pub holds: bool,
}

/// The predicates registered with a checker.
#[derive(Debug, Default)]
pub struct PredicateChecker {
    predicates: Vec<Box<dyn Predicate>>,
}

impl PredicateChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, predicate: Box<dyn Predicate>) {
        self.predicates.push(predicate);
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates every predicate, in registration order.
    pub fn check_all(&self, agent: &Bigraph) -> Vec<Verdict> {
        self.predicates
            .iter()
            .map(|p| Verdict {
                name: p.name().to_string(),
                holds: p.test(agent),
            })
            .collect()
    }
}
