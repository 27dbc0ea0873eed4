//! Bigraphs: pure bigraphs, their algebra and a model checker for
//! bigraphical reactive systems.
//!
//! This crate provides:
//! - Signatures of typed controls and pure bigraphs (place forest plus link graph)
//!   stored in flat arenas, built through a validating builder.
//! - Elementary bigraphs and the composition engine (composition, parallel
//!   product, juxtaposition, merge product, nesting).
//! - A canonical string encoding that decides isomorphism of ground bigraphs.
//! - Parametric reaction rules validated at construction, a pluggable matcher
//!   and a model checker that builds the reaction graph breadth-first,
//!   depth-first or in seeded random order.
//! - Strong bisimilarity of reaction graphs.
//!
//! # Mathematical Foundations
//!
//! A bigraph `B : ⟨m, X⟩ → ⟨n, Y⟩` superimposes a place graph (a forest of
//! `n` roots with `m` sites as holes) and a link graph (a hypergraph whose
//! points are node ports and inner names `X`, whose links are edges and outer
//! names `Y`). Interfaces make bigraphs the arrows of a symmetric monoidal
//! category; reaction rules rewrite occurrences of a redex inside an agent.
//!
//! # References
//!
//! - Milner, R. "The Space and Motion of Communicating Agents" (2009)
//! - Jensen, O. H., Milner, R. "Bigraphs and mobile processes (revised)" (2004)
//! - Kehrer, T., Tsigkanos, C., Ghezzi, C. "An EMOF-compliant abstract syntax for bigraphs" (2016)
//!
//! # Example
//!
//! ```
//! use bigraphs::prelude::*;
//!
//! let sig = Signature::new([Control::active("Room", 0), Control::atomic("Agent", 0)]).unwrap();
//! let ctx = BigraphContext::new(sig);
//!
//! // Room.(Agent | $0) -> Room.($0): agents leave rooms.
//! let side = |with_agent: bool| {
//!     let mut b = ctx.builder();
//!     let root = b.add_root();
//!     let room = b.add_node(root, "Room").unwrap();
//!     if with_agent {
//!         b.add_node(room, "Agent").unwrap();
//!     }
//!     b.add_site(room).unwrap();
//!     b.build().unwrap()
//! };
//! let mut rules = RuleSet::new();
//! rules.add(ReactionRule::new(side(true), side(false), None).unwrap()).unwrap();
//!
//! let mut b = ctx.builder();
//! let root = b.add_root();
//! let room = b.add_node(root, "Room").unwrap();
//! b.add_node(room, "Agent").unwrap();
//! b.add_node(room, "Agent").unwrap();
//! let agent = b.build().unwrap();
//!
//! let mut checker = ModelChecker::new(agent, rules, ModelCheckingOptions::default());
//! let graph = checker.run().unwrap();
//! assert_eq!(graph.state_count(), 3);
//! ```

pub mod arena;
pub mod builder;
pub mod canonical;
pub mod checker;
pub mod core;
pub mod elementary;
pub mod equivalence;
pub mod fingerprint;
pub mod interface;
pub mod matching;
pub mod operations;
pub mod reaction_graph;
pub mod rule;
pub mod signature;

#[cfg(test)]
mod testing;

pub use crate::builder::{BigraphBuilder, BigraphError};
pub use crate::canonical::{CanonicalForm, CanonicalFormError};
pub use crate::checker::{CheckerError, CheckerState, ModelChecker, ModelCheckingOptions};
pub use crate::core::Bigraph;
pub use crate::elementary::BigraphContext;
pub use crate::reaction_graph::{ReactionGraph, StateId};
pub use crate::rule::{ReactionRule, RuleError, RuleSet};
pub use crate::signature::{Control, ControlKind, Signature};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::arena::{EntityId, LinkId};
    pub use crate::builder::{BigraphBuilder, BigraphError};
    pub use crate::canonical::{canonical_form, CanonicalForm, CanonicalFormError};
    pub use crate::checker::{
        CheckerError, CheckerState, ExplorationListener, ExplorationStrategy, Frontier, IsoPredicate, MatchPredicate,
        ModelChecker, ModelCheckingOptions, Predicate,
    };
    pub use crate::core::{Bigraph, EntityKind, Link, Point};
    pub use crate::elementary::BigraphContext;
    pub use crate::equivalence::is_bisimilar;
    pub use crate::interface::Face;
    pub use crate::matching::{MatchDecomposition, Matcher, NaiveMatcher};
    pub use crate::operations::{compose, juxtapose, merge, nest, parallel_product, CompositionError};
    pub use crate::reaction_graph::{ReactionGraph, StateId, Transition};
    pub use crate::rule::{InstantiationMap, ReactionRule, RuleError, RuleSet};
    pub use crate::signature::{Control, ControlKind, MergePolicy, Signature};
}
