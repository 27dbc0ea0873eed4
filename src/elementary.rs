//! Elementary bigraphs.
//!
//! Placings (barren roots, merges, permutations) and linkings (closures,
//! substitutions, identities) are the generators of the bigraph algebra.
//! They are built through a caller-owned [`BigraphContext`] that carries the
//! signature; there is no process-wide factory state.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definition 3.1 (elementary placings and linkings)

use crate::arena::EntityId;
use crate::builder::{BigraphBuilder, BigraphError};
use crate::core::Bigraph;
use crate::interface::Face;
use crate::signature::Signature;
use std::sync::Arc;

/// Factory for elementary bigraphs over one signature.
#[derive(Debug, Clone)]
pub struct BigraphContext {
    signature: Arc<Signature>,
}

impl BigraphContext {
    /// Creates a context over `signature`.
    pub fn new(signature: Signature) -> Self {
        Self {
            signature: Arc::new(signature),
        }
    }

    /// Creates a context sharing an existing signature handle.
    pub fn from_arc(signature: Arc<Signature>) -> Self {
        Self { signature }
    }

    /// The context's signature.
    pub fn signature(&self) -> &Arc<Signature> {
        &self.signature
    }

    /// A fresh builder over the context's signature.
    pub fn builder(&self) -> BigraphBuilder {
        BigraphBuilder::with_signature(Arc::clone(&self.signature))
    }

    /// The empty bigraph `ε → ε`.
    pub fn empty(&self) -> Result<Bigraph, BigraphError> {
        self.builder().build()
    }

    /// The barren root `1 : 0 → 1`.
    pub fn barren(&self) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        b.add_root();
        b.build()
    }

    /// `merge_n : n → 1`, one root holding `n` sites.
    pub fn merge(&self, n: usize) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        let root = b.add_root();
        for _ in 0..n {
            b.add_site(root)?;
        }
        b.build()
    }

    /// `join = merge_2`.
    pub fn join(&self) -> Result<Bigraph, BigraphError> {
        self.merge(2)
    }

    /// Identity placing `id_n : n → n`.
    pub fn identity_place(&self, n: usize) -> Result<Bigraph, BigraphError> {
        self.permutation(&(0..n).collect::<Vec<_>>())
    }

    /// Permutation placing: root `i` holds site `order[i]`.
    ///
    /// `order` must be a permutation of `0..order.len()`; otherwise the
    /// resulting site indices are rejected by the builder.
    pub fn permutation(&self, order: &[usize]) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        for &site in order {
            let root = b.add_root();
            b.add_site_with_index(root, site)?;
        }
        b.build()
    }

    /// Symmetry `γ_n`: root `i` holds site `n - 1 - i`.
    pub fn symmetry(&self, n: usize) -> Result<Bigraph, BigraphError> {
        self.permutation(&(0..n).rev().collect::<Vec<_>>())
    }

    /// Closure `/x : x → ε` of each given inner name.
    pub fn closure<S: AsRef<str>>(&self, names: &[S]) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        for name in names {
            let edge = b.add_edge();
            b.add_inner_name(name.as_ref(), Some(edge))?;
        }
        b.build()
    }

    /// Substitution `y/X`: every inner name in `inners` maps to outer name `outer`.
    ///
    /// With no inner names this is the introduction of an idle `outer`.
    pub fn substitution<S: AsRef<str>>(&self, outer: &str, inners: &[S]) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        let link = b.add_outer_name(outer)?;
        for name in inners {
            b.add_inner_name(name.as_ref(), Some(link))?;
        }
        b.build()
    }

    /// Idle outer names `X : ε → X`.
    pub fn introduction<S: AsRef<str>>(&self, names: &[S]) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        for name in names {
            b.add_outer_name(name.as_ref())?;
        }
        b.build()
    }

    /// Identity linking `id_X : X → X`.
    pub fn identity_link<S: AsRef<str>>(&self, names: &[S]) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        for name in names {
            let link = b.add_outer_name(name.as_ref())?;
            b.add_inner_name(name.as_ref(), Some(link))?;
        }
        b.build()
    }

    /// Identity `id_I : I → I` on an interface.
    pub fn identity(&self, face: &Face) -> Result<Bigraph, BigraphError> {
        let mut b = self.builder();
        for _ in 0..face.width {
            let root: EntityId = b.add_root();
            b.add_site(root)?;
        }
        for name in &face.names {
            let link = b.add_outer_name(name)?;
            b.add_inner_name(name, Some(link))?;
        }
        b.build()
    }
}
