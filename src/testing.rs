//! Shared fixtures for unit tests: a small Petri-net signature and agents over it.

use crate::core::Bigraph;
use crate::elementary::BigraphContext;
use crate::rule::ReactionRule;
use crate::signature::{Control, Signature};

pub(crate) fn fixture_signature() -> Signature {
    Signature::new([
        Control::active("Place", 1),
        Control::active("Transition", 2),
        Control::atomic("Token", 0),
    ])
    .unwrap()
}

pub(crate) fn fixture_context() -> BigraphContext {
    BigraphContext::new(fixture_signature())
}

/// `Place[name].(Token | ... | Token)`, ground and prime.
pub(crate) fn place_with_tokens(ctx: &BigraphContext, tokens: usize, name: Option<&str>) -> Bigraph {
    let mut b = ctx.builder();
    let r = b.add_root();
    let p = b.add_node(r, "Place").unwrap();
    for _ in 0..tokens {
        b.add_node(p, "Token").unwrap();
    }
    if let Some(name) = name {
        let link = b.add_outer_name(name).unwrap();
        b.connect(p, 0, link).unwrap();
    }
    b.build().unwrap()
}

/// One net: `PlaceA -e1- Transition -e2- PlaceB`, with tokens in each place.
pub(crate) fn petri_agent(ctx: &BigraphContext, left: usize, right: usize) -> Bigraph {
    let mut b = ctx.builder();
    let r = b.add_root();
    let e1 = b.add_edge();
    let e2 = b.add_edge();
    let a = b.add_node(r, "Place").unwrap();
    b.connect(a, 0, e1).unwrap();
    for _ in 0..left {
        b.add_node(a, "Token").unwrap();
    }
    let t = b.add_node(r, "Transition").unwrap();
    b.connect(t, 0, e1).unwrap();
    b.connect(t, 1, e2).unwrap();
    let p = b.add_node(r, "Place").unwrap();
    b.connect(p, 0, e2).unwrap();
    for _ in 0..right {
        b.add_node(p, "Token").unwrap();
    }
    b.build().unwrap()
}

/// Moves one token across a transition:
/// `Place[l].(Token | $0) | Transition[l,r] | Place[r].($1)` to
/// `Place[l].($0) | Transition[l,r] | Place[r].(Token | $1)`.
pub(crate) fn fire_rule(ctx: &BigraphContext) -> ReactionRule {
    let side = |token_left: bool| {
        let mut b = ctx.builder();
        let root = b.add_root();
        let l = b.add_outer_name("l").unwrap();
        let r = b.add_outer_name("r").unwrap();
        let a = b.add_node(root, "Place").unwrap();
        b.connect(a, 0, l).unwrap();
        let t = b.add_node(root, "Transition").unwrap();
        b.connect(t, 0, l).unwrap();
        b.connect(t, 1, r).unwrap();
        let p = b.add_node(root, "Place").unwrap();
        b.connect(p, 0, r).unwrap();
        if token_left {
            b.add_node(a, "Token").unwrap();
        } else {
            b.add_node(p, "Token").unwrap();
        }
        b.add_site_with_index(a, 0).unwrap();
        b.add_site_with_index(p, 1).unwrap();
        b.build().unwrap()
    };
    ReactionRule::new(side(true), side(false), None)
        .unwrap()
        .with_label("fire")
}

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
