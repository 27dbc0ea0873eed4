//! The composition engine: pure operators over bigraphs.
//!
//! Every operator checks signatures and interfaces before any structural work,
//! copies its operands into a fresh bigraph and never mutates an input.
//! Entities are relabelled into the result's own arena, so node identities
//! never collide. Links that become connected through names are merged
//! transitively; edges left without any point are dropped from the result.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definitions 2.5 (composition),
//!   2.7 (juxtaposition), 3.10 (parallel product), 3.15 (nesting)

use crate::arena::{EntityId, LinkId};
use crate::builder::{BigraphBuilder, BigraphError};
use crate::core::{Bigraph, EntityKind};
use crate::elementary::BigraphContext;
use crate::interface::FaceMismatch;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error type for the composition operators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// Operands are typed over different signatures.
    #[error("bigraphs are typed over different signatures")]
    IncompatibleSignature,
    /// The inner face of the outer operand differs from the outer face of the inner one.
    #[error("incompatible interface: {0}")]
    IncompatibleInterface(#[from] FaceMismatch),
    /// A name that must be unique occurs on both operands.
    #[error("name `{name}` occurs on both operands")]
    NameClash { name: String },
    /// The assembled result violates a structural invariant.
    #[error(transparent)]
    Build(#[from] BigraphError),
}

/// Disjoint-set forest over link slots of all operands.
struct LinkClasses {
    parent: Vec<usize>,
}

impl LinkClasses {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, slot: usize) -> usize {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = slot;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }
}

/// How sites met while copying a place graph are treated.
enum SiteMode<'a> {
    /// Keep the site, shifting its index.
    Keep { index_offset: usize },
    /// Replace site `i` by the contents of root `i` of `inner`.
    Splice { inner: &'a Bigraph, link_offset: usize },
}

/// Accumulates the result of an operator.
///
/// Edges are materialized only when a point refers to them, so idle edges
/// of the operands never reach the result.
struct Assembler {
    builder: BigraphBuilder,
    classes: LinkClasses,
    class_links: HashMap<usize, LinkId>,
}

impl Assembler {
    fn new(signature: &Arc<crate::signature::Signature>, slots: usize) -> Self {
        Self {
            builder: BigraphBuilder::with_signature(Arc::clone(signature)),
            classes: LinkClasses::new(slots),
            class_links: HashMap::new(),
        }
    }

    fn declare_outer(&mut self, name: &str, slot: usize) -> Result<(), CompositionError> {
        let class = self.classes.find(slot);
        let link = self.builder.add_outer_name(name)?;
        self.class_links.insert(class, link);
        Ok(())
    }

    fn link_for(&mut self, slot: usize) -> LinkId {
        let class = self.classes.find(slot);
        if let Some(link) = self.class_links.get(&class) {
            return *link;
        }
        let edge = self.builder.add_edge();
        self.class_links.insert(class, edge);
        edge
    }

    fn copy_children(
        &mut self,
        src: &Bigraph,
        src_parent: EntityId,
        dst_parent: EntityId,
        link_offset: usize,
        mode: &SiteMode<'_>,
    ) -> Result<(), CompositionError> {
        for &child in src.children(src_parent) {
            match &src.entities[child].kind {
                EntityKind::Node(data) => {
                    let node = self.builder.add_node(dst_parent, &data.control)?;
                    for (port, link) in data.ports.iter().enumerate() {
                        if let Some(l) = link {
                            let target = self.link_for(link_offset + l.as_u32() as usize);
                            self.builder.connect(node, port, target)?;
                        }
                    }
                    self.copy_children(src, child, node, link_offset, mode)?;
                }
                EntityKind::Site { index } => match mode {
                    SiteMode::Keep { index_offset } => {
                        self.builder.add_site_with_index(dst_parent, index + index_offset)?;
                    }
                    SiteMode::Splice {
                        inner,
                        link_offset: inner_offset,
                    } => {
                        let inner_root = inner.roots[*index];
                        self.copy_children(
                            inner,
                            inner_root,
                            dst_parent,
                            *inner_offset,
                            &SiteMode::Keep { index_offset: 0 },
                        )?;
                    }
                },
                EntityKind::Root { .. } => {}
            }
        }
        Ok(())
    }

    fn copy_inner_names(&mut self, src: &Bigraph, link_offset: usize) -> Result<(), CompositionError> {
        for (name, link) in &src.inner_names {
            let target = link.map(|l| self.link_for(link_offset + l.as_u32() as usize));
            self.builder.add_inner_name(name, target)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Bigraph, CompositionError> {
        Ok(self.builder.build()?)
    }
}

fn check_signatures(a: &Bigraph, b: &Bigraph) -> Result<(), CompositionError> {
    if Arc::ptr_eq(&a.signature, &b.signature) || a.signature == b.signature {
        Ok(())
    } else {
        Err(CompositionError::IncompatibleSignature)
    }
}

/// Sequential composition `outer ∘ inner`.
///
/// Requires `outer.inner_face() == inner.outer_face()`. Site `i` of `outer` is
/// replaced by the contents of root `i` of `inner`; each inner name `x` of
/// `outer` is spliced onto the outer name `x` of `inner`. The result has the
/// outer face of `outer` and the inner face of `inner`.
pub fn compose(outer: &Bigraph, inner: &Bigraph) -> Result<Bigraph, CompositionError> {
    check_signatures(outer, inner)?;
    outer.inner_face().compatible_with(&inner.outer_face())?;

    let offset = outer.links.len();
    let mut asm = Assembler::new(&outer.signature, offset + inner.links.len());
    for (name, inner_link) in &inner.outer_names {
        if let Some(Some(outer_link)) = outer.inner_names.get(name) {
            asm.classes
                .union(outer_link.as_u32() as usize, offset + inner_link.as_u32() as usize);
        }
    }
    for (name, link) in &outer.outer_names {
        asm.declare_outer(name, link.as_u32() as usize)?;
    }

    let splice = SiteMode::Splice {
        inner,
        link_offset: offset,
    };
    for &root in &outer.roots {
        let dst = asm.builder.add_root();
        asm.copy_children(outer, root, dst, 0, &splice)?;
    }
    asm.copy_inner_names(inner, offset)?;
    log::trace!(
        "composed {} nodes over {} nodes",
        outer.node_count(),
        inner.node_count()
    );
    asm.finish()
}

/// Parallel product `a ‖ b`.
///
/// Roots and sites of `b` are placed after those of `a`. Inner names must be
/// disjoint. Outer names are *not* required to be disjoint: an outer name
/// present on both operands denotes a single shared link in the result, which
/// joins every point that either operand attached to it. Use [`juxtapose`]
/// when such sharing is not intended.
pub fn parallel_product(a: &Bigraph, b: &Bigraph) -> Result<Bigraph, CompositionError> {
    check_signatures(a, b)?;
    if let Some(name) = a.inner_names.keys().find(|n| b.inner_names.contains_key(*n)) {
        return Err(CompositionError::NameClash { name: name.clone() });
    }

    let offset = a.links.len();
    let mut asm = Assembler::new(&a.signature, offset + b.links.len());
    for (name, b_link) in &b.outer_names {
        if let Some(a_link) = a.outer_names.get(name) {
            asm.classes
                .union(a_link.as_u32() as usize, offset + b_link.as_u32() as usize);
        }
    }
    for (name, link) in &a.outer_names {
        asm.declare_outer(name, link.as_u32() as usize)?;
    }
    for (name, link) in &b.outer_names {
        if !a.outer_names.contains_key(name) {
            asm.declare_outer(name, offset + link.as_u32() as usize)?;
        }
    }

    for &root in &a.roots {
        let dst = asm.builder.add_root();
        asm.copy_children(a, root, dst, 0, &SiteMode::Keep { index_offset: 0 })?;
    }
    let shift = SiteMode::Keep {
        index_offset: a.sites.len(),
    };
    for &root in &b.roots {
        let dst = asm.builder.add_root();
        asm.copy_children(b, root, dst, offset, &shift)?;
    }
    asm.copy_inner_names(a, 0)?;
    asm.copy_inner_names(b, offset)?;
    asm.finish()
}

/// Juxtaposition `a ⊗ b`: parallel product of operands with disjoint names.
pub fn juxtapose(a: &Bigraph, b: &Bigraph) -> Result<Bigraph, CompositionError> {
    if let Some(name) = a.outer_names.keys().find(|n| b.outer_names.contains_key(*n)) {
        return Err(CompositionError::NameClash { name: name.clone() });
    }
    parallel_product(a, b)
}

/// Merge product `a | b`: parallel product followed by joining all roots into one.
pub fn merge(a: &Bigraph, b: &Bigraph) -> Result<Bigraph, CompositionError> {
    let product = parallel_product(a, b)?;
    let ctx = BigraphContext::from_arc(Arc::clone(&product.signature));
    let names: Vec<&str> = product.outer_names.keys().map(String::as_str).collect();
    let placing = juxtapose(&ctx.merge(product.roots.len())?, &ctx.identity_link(&names)?)?;
    compose(&placing, &product)
}

/// Nesting `f.g = (id_X ‖ f) ∘ g`, where `X` are the outer names of `g`.
///
/// `f` must have no inner names and as many sites as `g` has roots. The
/// outer names of `g` are exported next to those of `f`; a name on both
/// becomes one link.
pub fn nest(f: &Bigraph, g: &Bigraph) -> Result<Bigraph, CompositionError> {
    check_signatures(f, g)?;
    let ctx = BigraphContext::from_arc(Arc::clone(&f.signature));
    let names: Vec<&str> = g.outer_names.keys().map(String::as_str).collect();
    let lifted = parallel_product(&ctx.identity_link(&names)?, f)?;
    compose(&lifted, g)
}

/// Left fold of [`parallel_product`] over `parts`; the empty bigraph for no parts.
pub fn tensor_all(ctx: &BigraphContext, parts: &[Bigraph]) -> Result<Bigraph, CompositionError> {
    let mut iter = parts.iter();
    let mut acc = match iter.next() {
        Some(first) => first.clone(),
        None => return Ok(ctx.empty()?),
    };
    for part in iter {
        acc = parallel_product(&acc, part)?;
    }
    Ok(acc)
}
