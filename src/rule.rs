//! Reaction rules and rule sets.
//!
//! A [`ReactionRule`] is validated once, when it is constructed; a value of
//! this type is always admissible to the model checker.
//!
//! # Invariants
//! - Redex and reactum share one signature and one outer face.
//! - The redex is open, guarding and inner-injective.
//! - The reactum has no idle outer names.
//! - The instantiation map assigns every reactum site a redex site.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definitions 8.5 and 8.6 (parametric reaction rules, simple redexes)

use crate::canonical::{CanonicalForm, CanonicalFormError};
use crate::core::Bigraph;
use crate::interface::Face;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Which simplicity condition a redex fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimplicityViolation {
    /// The redex has an idle edge or idle outer name.
    NotOpen,
    /// A site is a direct child of a root.
    NotGuarding,
    /// Two sites share a parent.
    NotInnerInjective,
}

impl fmt::Display for SimplicityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimplicityViolation::NotOpen => write!(f, "redex has idle links"),
            SimplicityViolation::NotGuarding => write!(f, "redex has a site directly under a root"),
            SimplicityViolation::NotInnerInjective => write!(f, "redex has sibling sites"),
        }
    }
}

/// Error type for rule construction and rule sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Redex and reactum are typed over different signatures.
    #[error("redex and reactum signatures differ")]
    IncompatibleSignature,
    /// Redex and reactum expose different outer faces.
    #[error("redex outer face {redex} differs from reactum outer face {reactum}")]
    NonConformInterfaces { redex: Face, reactum: Face },
    /// The redex is not simple.
    #[error("redex is not simple: {0}")]
    RedexNotSimple(SimplicityViolation),
    /// An outer name of the reactum has no points.
    #[error("reactum outer name `{name}` is idle")]
    OuterNameIsIdle { name: String },
    /// A reactum site has no valid redex site.
    #[error("instantiation map sends reactum site {site} to {target:?}")]
    InstantiationMapNotWellDefined { site: usize, target: Option<usize> },
    /// A different rule is already registered under this label.
    #[error("a different rule is already labelled `{label}`")]
    DuplicateLabel { label: String },
    /// Rule sides could not be encoded for duplicate detection.
    #[error(transparent)]
    Encoding(#[from] CanonicalFormError),
}

/// Maps reactum sites to redex sites: entry `j` is the redex site whose
/// parameter fills reactum site `j`. Parameters can be copied or dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstantiationMap(Vec<usize>);

impl InstantiationMap {
    /// The identity on `n` sites.
    pub fn identity(n: usize) -> Self {
        Self((0..n).collect())
    }

    /// Entry `j` of `targets` is the redex site feeding reactum site `j`.
    pub fn new(targets: Vec<usize>) -> Self {
        Self(targets)
    }

    /// Redex site for reactum site `site`.
    pub fn get(&self, site: usize) -> Option<usize> {
        self.0.get(site).copied()
    }

    /// Number of reactum sites covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Redex site per reactum site.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Reorders `parameters` (one per redex site) into one per reactum site.
    pub fn instantiate<T: Clone>(&self, parameters: &[T]) -> Vec<T> {
        self.0
            .iter()
            .filter_map(|&target| parameters.get(target).cloned())
            .collect()
    }

    fn check(&self, redex_sites: usize, reactum_sites: usize) -> Result<(), RuleError> {
        for (site, &target) in self.0.iter().enumerate() {
            if site >= reactum_sites || target >= redex_sites {
                return Err(RuleError::InstantiationMapNotWellDefined {
                    site,
                    target: Some(target),
                });
            }
        }
        if self.0.len() < reactum_sites {
            return Err(RuleError::InstantiationMapNotWellDefined {
                site: self.0.len(),
                target: None,
            });
        }
        Ok(())
    }
}

/// A parametric reaction rule `redex -> reactum`.
#[derive(Debug, Clone)]
pub struct ReactionRule {
    redex: Bigraph,
    reactum: Bigraph,
    map: InstantiationMap,
    label: Option<String>,
    priority: i32,
}

impl ReactionRule {
    /// Validates and creates a rule. `map` defaults to the identity on the
    /// reactum's sites.
    pub fn new(redex: Bigraph, reactum: Bigraph, map: Option<InstantiationMap>) -> Result<Self, RuleError> {
        if redex.signature() != reactum.signature() {
            return Err(RuleError::IncompatibleSignature);
        }
        let (redex_face, reactum_face) = (redex.outer_face(), reactum.outer_face());
        if redex_face != reactum_face {
            return Err(RuleError::NonConformInterfaces {
                redex: redex_face,
                reactum: reactum_face,
            });
        }
        if let Some(violation) = simplicity_violation(&redex) {
            return Err(RuleError::RedexNotSimple(violation));
        }
        if let Some(name) = reactum.idle_outer_names().first() {
            return Err(RuleError::OuterNameIsIdle {
                name: name.to_string(),
            });
        }
        let map = map.unwrap_or_else(|| InstantiationMap::identity(reactum.sites().len()));
        map.check(redex.sites().len(), reactum.sites().len())?;

        Ok(Self {
            redex,
            reactum,
            map,
            label: None,
            priority: 0,
        })
    }

    /// Names the rule; transitions it produces carry this label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Rules with lower priority are tried first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Left-hand side, the pattern searched for in agents.
    pub fn redex(&self) -> &Bigraph {
        &self.redex
    }

    /// Right-hand side, substituted for each occurrence of the redex.
    pub fn reactum(&self) -> &Bigraph {
        &self.reactum
    }

    /// How redex parameters fill reactum sites.
    pub fn instantiation_map(&self) -> &InstantiationMap {
        &self.map
    }

    /// Set by [`with_label`](Self::with_label) or on insertion into a [`RuleSet`].
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Label-independent structural identity of the rule.
    fn structural_key(&self) -> Result<(String, String, Vec<usize>), CanonicalFormError> {
        let canon = CanonicalForm::default();
        Ok((
            canon.encode_open(&self.redex)?,
            canon.encode_open(&self.reactum)?,
            self.map.as_slice().to_vec(),
        ))
    }
}

fn simplicity_violation(redex: &Bigraph) -> Option<SimplicityViolation> {
    if !redex.idle_links().is_empty() {
        Some(SimplicityViolation::NotOpen)
    } else if !redex.sites_under_roots().is_empty() {
        Some(SimplicityViolation::NotGuarding)
    } else if !redex.sites_are_not_siblings() {
        Some(SimplicityViolation::NotInnerInjective)
    } else {
        None
    }
}

/// Label-keyed collection of rules.
///
/// Unlabelled rules receive `r<n>` labels in insertion order. Adding a rule
/// structurally equal to a registered one does nothing.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ReactionRule>,
    keys: HashSet<(String, String, Vec<usize>)>,
    sequence: usize,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `rule`; returns `false` if a structurally equal rule is present.
    pub fn add(&mut self, mut rule: ReactionRule) -> Result<bool, RuleError> {
        let key = rule.structural_key()?;
        if self.keys.contains(&key) {
            log::debug!("rule set: skipping duplicate rule {:?}", rule.label());
            return Ok(false);
        }
        let label = match rule.label.take() {
            Some(label) => label,
            None => loop {
                let candidate = format!("r{}", self.sequence);
                self.sequence += 1;
                if self.get(&candidate).is_none() {
                    break candidate;
                }
            },
        };
        if self.get(&label).is_some() {
            return Err(RuleError::DuplicateLabel { label });
        }
        rule.label = Some(label);
        self.keys.insert(key);
        self.rules.push(rule);
        Ok(true)
    }

    /// The rule labelled `label`.
    pub fn get(&self, label: &str) -> Option<&ReactionRule> {
        self.rules.iter().find(|r| r.label() == Some(label))
    }

    /// Removes and returns the rule labelled `label`.
    pub fn remove(&mut self, label: &str) -> Option<ReactionRule> {
        let position = self.rules.iter().position(|r| r.label() == Some(label))?;
        let rule = self.rules.remove(position);
        if let Ok(key) = rule.structural_key() {
            self.keys.remove(&key);
        }
        Some(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ReactionRule> {
        self.rules.iter()
    }

    /// Rules by ascending priority, insertion order among equals.
    pub fn by_priority(&self) -> Vec<&ReactionRule> {
        let mut ordered: Vec<&ReactionRule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| r.priority);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elementary::BigraphContext;
    use crate::signature::{Control, Signature};
    use crate::testing::{fire_rule, fixture_context};

    /// `Place[x]` with optional site, optional link.
    fn place(ctx: &BigraphContext, linked: bool, site: bool) -> Bigraph {
        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        let x = b.add_outer_name("x").unwrap();
        if linked {
            b.connect(p, 0, x).unwrap();
        }
        if site {
            b.add_site(p).unwrap();
        }
        b.build().unwrap()
    }

    /// The firing rule passes every check.
    #[test]
    fn fire_rule_is_valid() {
        let ctx = fixture_context();
        let rule = fire_rule(&ctx);
        assert_eq!(rule.label(), Some("fire"));
        assert_eq!(rule.instantiation_map(), &InstantiationMap::identity(2));
        assert_eq!(rule.priority(), 0);
    }

    /// A site directly under a root violates guarding.
    #[test]
    fn unguarded_redex() {
        let ctx = fixture_context();
        let side = || {
            let mut b = ctx.builder();
            let r = b.add_root();
            b.add_node(r, "Place").unwrap();
            b.add_site(r).unwrap();
            b.build().unwrap()
        };
        assert_eq!(
            ReactionRule::new(side(), side(), None).unwrap_err(),
            RuleError::RedexNotSimple(SimplicityViolation::NotGuarding)
        );
    }

    /// Idle links and sibling sites make a redex non-simple.
    #[test]
    fn open_and_injective() {
        let ctx = fixture_context();
        let unlinked = place(&ctx, false, false);
        let linked = place(&ctx, true, false);
        assert_eq!(
            ReactionRule::new(unlinked, linked.clone(), None).unwrap_err(),
            RuleError::RedexNotSimple(SimplicityViolation::NotOpen)
        );

        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        b.add_site(p).unwrap();
        b.add_site(p).unwrap();
        let siblings = b.build().unwrap();
        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        b.add_site(p).unwrap();
        let reactum = b.build().unwrap();
        assert_eq!(
            ReactionRule::new(siblings, reactum, None).unwrap_err(),
            RuleError::RedexNotSimple(SimplicityViolation::NotInnerInjective)
        );
    }

    /// A reactum outer name with no points is rejected.
    #[test]
    fn idle_reactum_name() {
        let ctx = fixture_context();
        let err = ReactionRule::new(place(&ctx, true, false), place(&ctx, false, false), None).unwrap_err();
        assert_eq!(err, RuleError::OuterNameIsIdle { name: "x".into() });
    }

    /// Signatures and outer faces must agree.
    #[test]
    fn signature_and_interfaces() {
        let ctx = fixture_context();
        let other = BigraphContext::new(Signature::new([Control::active("Place", 1)]).unwrap());
        assert_eq!(
            ReactionRule::new(place(&ctx, true, false), place(&other, true, false), None).unwrap_err(),
            RuleError::IncompatibleSignature
        );

        let mut b = ctx.builder();
        let r = b.add_root();
        b.add_node(r, "Token").unwrap();
        let token = b.build().unwrap();
        let err = ReactionRule::new(place(&ctx, true, false), token, None).unwrap_err();
        assert!(matches!(err, RuleError::NonConformInterfaces { .. }));
    }

    /// Instantiation maps must cover every reactum site with a redex site.
    #[test]
    fn instantiation_map_checks() {
        let ctx = fixture_context();
        let redex = place(&ctx, true, true);
        let reactum = place(&ctx, true, true);
        assert_eq!(
            ReactionRule::new(redex.clone(), reactum.clone(), Some(InstantiationMap::new(vec![1]))).unwrap_err(),
            RuleError::InstantiationMapNotWellDefined {
                site: 0,
                target: Some(1)
            }
        );
        assert_eq!(
            ReactionRule::new(redex.clone(), reactum.clone(), Some(InstantiationMap::new(vec![]))).unwrap_err(),
            RuleError::InstantiationMapNotWellDefined { site: 0, target: None }
        );
        assert!(ReactionRule::new(redex, reactum, Some(InstantiationMap::new(vec![0]))).is_ok());

        let map = InstantiationMap::new(vec![1, 1, 0]);
        assert_eq!(map.instantiate(&["a", "b"]), vec!["b", "b", "a"]);
    }

    /// Structural duplicates are skipped and unlabelled rules are numbered.
    #[test]
    fn rule_set_behaviour() {
        let ctx = fixture_context();
        let mut set = RuleSet::new();
        assert_eq!(set.add(fire_rule(&ctx)), Ok(true));
        assert_eq!(set.add(fire_rule(&ctx).with_label("again")), Ok(false));
        assert_eq!(set.len(), 1);

        let grow = ReactionRule::new(place(&ctx, true, true), place(&ctx, true, true), None)
            .unwrap()
            .with_priority(-1);
        assert_eq!(set.add(grow), Ok(true));
        assert!(set.get("r0").is_some());
        let order: Vec<_> = set.by_priority().iter().map(|r| r.label().unwrap_or("")).collect();
        assert_eq!(order, vec!["r0", "fire"]);

        let clash = ReactionRule::new(place(&ctx, true, false), place(&ctx, true, false), None)
            .unwrap()
            .with_label("fire");
        assert_eq!(
            set.add(clash),
            Err(RuleError::DuplicateLabel { label: "fire".into() })
        );
        assert!(set.remove("fire").is_some());
        assert_eq!(set.add(fire_rule(&ctx)), Ok(true));
    }

    /// Controls whose names share a prefix are registered and explored normally.
    #[test]
    fn prefix_sharing_controls() {
        let sig = Signature::new([Control::active("Room", 0), Control::atomic("RoomKey", 0)]).unwrap();
        let ctx = BigraphContext::new(sig);
        let side = |keys: usize, site: bool| {
            let mut b = ctx.builder();
            let r = b.add_root();
            let room = b.add_node(r, "Room").unwrap();
            for _ in 0..keys {
                b.add_node(room, "RoomKey").unwrap();
            }
            if site {
                b.add_site(room).unwrap();
            }
            b.build().unwrap()
        };
        let take = ReactionRule::new(side(1, true), side(0, true), None)
            .unwrap()
            .with_label("take");
        let mut rules = RuleSet::new();
        assert_eq!(rules.add(take), Ok(true));

        let mut checker = crate::checker::ModelChecker::new(
            side(2, false),
            rules,
            crate::checker::ModelCheckingOptions::default(),
        );
        let graph = checker.run().unwrap();
        assert_eq!(graph.state_count(), 3);
        assert!(graph.states()[0].canonical.contains("Room.(RoomKey|RoomKey)"));
    }
}
