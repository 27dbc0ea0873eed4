//! Occurrence matching.
//!
//! A [`Matcher`] finds every occurrence of a redex in a ground agent and
//! reports each as a [`MatchDecomposition`] `agent = context ∘ (redex ‖ id) ∘ parameters`.
//! The checker only depends on the trait; [`NaiveMatcher`] is the built-in
//! backtracking strategy.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definition 8.1 (occurrence)
//! - Jensen & Milner, "Bigraphs and mobile processes (revised)" (2004), Section 8 (parametric reaction)

mod naive;

pub use naive::NaiveMatcher;

use crate::arena::EntityId;
use crate::builder::BigraphError;
use crate::core::Bigraph;
use crate::elementary::BigraphContext;
use crate::operations::{compose, parallel_product, tensor_all, CompositionError};
use crate::rule::InstantiationMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Error type for matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Occurrences are only searched in ground agents.
    #[error("agent is not ground")]
    AgentNotGround,
    /// Agent and redex are typed over different signatures.
    #[error("agent and redex signatures differ")]
    IncompatibleSignature,
    /// The redex shape is outside what the matcher supports.
    #[error("unsupported redex: {0}")]
    UnsupportedRedex(String),
    /// Building a context or parameter failed.
    #[error(transparent)]
    Build(#[from] BigraphError),
    /// Recomposing an occurrence failed.
    #[error(transparent)]
    Composition(#[from] CompositionError),
}

/// One occurrence of a redex in an agent.
///
/// # Invariants
/// - `context` has one site per redex root and the agent's outer names.
/// - The inner names `X` of `context` include every redex outer name; the
///   remaining ones are the names under which parameters reach outside links.
/// - `parameters[i]` is prime and ground and fills redex site `i`; its outer
///   names are a subset of `X`.
#[derive(Debug, Clone)]
pub struct MatchDecomposition {
    pub context: Bigraph,
    pub redex_image: Bigraph,
    pub parameters: Vec<Bigraph>,
    /// Redex node to the agent node it matched.
    pub node_mapping: BTreeMap<EntityId, EntityId>,
}

impl MatchDecomposition {
    /// Builds the agent obtained by replacing this occurrence with `reactum`:
    /// `context ∘ ((reactum ‖ id_X) ∘ (d ‖ X))` where `d` is the tensor of the
    /// parameters instantiated through `map`.
    pub fn react(&self, reactum: &Bigraph, map: &InstantiationMap) -> Result<Bigraph, CompositionError> {
        let ctx = BigraphContext::from_arc(Arc::clone(self.context.signature_arc()));
        let names: Vec<&str> = self.context.inner_names().keys().map(String::as_str).collect();

        let instantiated = map.instantiate(&self.parameters);
        let product = tensor_all(&ctx, &instantiated)?;
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| !product.outer_names().contains_key(*n))
            .collect();
        let parameter = parallel_product(&product, &ctx.introduction(&missing)?)?;

        let lifted = parallel_product(reactum, &ctx.identity_link(&names)?)?;
        let middle = compose(&lifted, &parameter)?;
        compose(&self.context, &middle)
    }
}

/// Strategy for finding redex occurrences.
pub trait Matcher {
    /// Every occurrence of `redex` in the ground `agent`; empty when there is none.
    fn find_occurrences(&self, agent: &Bigraph, redex: &Bigraph) -> Result<Vec<MatchDecomposition>, MatchError>;
}
