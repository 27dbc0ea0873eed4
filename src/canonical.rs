//! Canonical string encoding of bigraphs.
//!
//! Two ground bigraphs are isomorphic exactly when their canonical strings are
//! equal. The encoder works in two phases:
//!
//! 1. **Colouring.** Every entity receives an isomorphism-invariant colour
//!    (see [`refine_colours`]). Siblings are ordered by colour.
//! 2. **Serialization.** The ordered forest is traversed breadth-first to
//!    number anonymous links by first appearance, then written in nested form.
//!    Siblings with equal colours whose subtrees touch an anonymous link can
//!    still serialize differently. Such ties are broken by
//!    individualization-refinement: one tied entity is singled out, colours
//!    are refined again, and the least string over the search tree wins.
//!    Automorphisms found along the way prune symmetric branches, so `k`
//!    interchangeable components cost `O(k²)` leaves rather than `k!`.
//!
//! # Grammar
//!
//! ```text
//! form   := root+ names?
//! root   := "r" index ( ".(" place ( "|" place )* ")" )? "#"
//! place  := control ( "[" port ( "," port )* "]" )? ( ".(" place ( "|" place )* ")" )?
//! port   := outer-name | "~" n | "^" n | "_"
//! names  := "{" outer-name ( "," outer-name )* "}" | "{^" n "}"
//! ```
//!
//! `~n` is the n-th edge, `^n` the n-th outer name when open links are
//! rewritten, and `_` an open port. Node-free bigraphs (placings and
//! linkings) use fixed templates: `r0#` for a barren root, `r0$01#` for
//! `join`, `r0$0#r1$1#` for the identity on two sites, `xy$zy#` for a
//! substitution `y/{x,z}`, `x$y#` for a closure of `x` and `y`.
//!
//! # Citations
//! - Kehrer, Tsigkanos, Ghezzi, "An EMOF-compliant abstract syntax for bigraphs" (2016)
//! - Gassara et al., "A canonical form for bigraphs" (2019)
//! - Weisfeiler & Lehman, "A reduction of a graph to a canonical form" (1968)

use crate::arena::{EntityId, LinkId};
use crate::core::{Bigraph, EntityKind, Link};
use crate::fingerprint::{individualize, refine_colours, refine_from, state_digest, ColourOptions, HashValue};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt::Write;
use thiserror::Error;

/// Error type for canonical encoding preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalFormError {
    /// The bigraph has sites or inner names.
    #[error("bigraph is not ground")]
    NotGround,
    /// The bigraph does not have exactly one root.
    #[error("bigraph is not prime ({roots} roots)")]
    NotPrime { roots: usize },
    /// The bigraph has no root at all.
    #[error("bigraph has no roots")]
    NoRoots,
    /// A control name is empty or contains a character of the encoding grammar.
    #[error("control `{control}` cannot be written unambiguously")]
    AmbiguousControlAlphabet { control: String },
}

/// Canonical form encoder.
///
/// # Example
///
/// ```
/// use bigraphs::canonical::CanonicalForm;
/// use bigraphs::elementary::BigraphContext;
/// use bigraphs::signature::Signature;
///
/// let ctx = BigraphContext::new(Signature::empty());
/// let canon = CanonicalForm::default();
/// assert_eq!(canon.encode(&ctx.barren().unwrap()).unwrap(), "r0#");
/// assert_eq!(canon.encode(&ctx.join().unwrap()).unwrap(), "r0$01#");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanonicalForm {
    options: ColourOptions,
}

impl CanonicalForm {
    /// Encoder with names kept and roots ordered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats outer names anonymously, like edges.
    ///
    /// Two agents that differ only in how their open links are named then
    /// receive the same string.
    pub fn with_rewrite_open_links(mut self, rewrite: bool) -> Self {
        self.options.anonymous_outer_names = rewrite;
        self
    }

    /// Treats the roots of a multi-root bigraph as interchangeable.
    pub fn with_unordered_roots(mut self, unordered: bool) -> Self {
        self.options.unordered_roots = unordered;
        self
    }

    /// Returns the colouring options in use.
    pub fn options(&self) -> ColourOptions {
        self.options
    }

    /// Encodes a ground, prime bigraph.
    ///
    /// Node-free bigraphs (elementary placings and linkings) are encoded by
    /// template and are exempt from the ground and prime preconditions.
    pub fn encode(&self, bigraph: &Bigraph) -> Result<String, CanonicalFormError> {
        check_alphabet(bigraph)?;
        if bigraph.node_count() == 0 {
            return encode_elementary(bigraph);
        }
        if !bigraph.is_ground() {
            return Err(CanonicalFormError::NotGround);
        }
        if bigraph.roots().is_empty() {
            return Err(CanonicalFormError::NoRoots);
        }
        if !bigraph.is_prime() {
            return Err(CanonicalFormError::NotPrime {
                roots: bigraph.roots().len(),
            });
        }
        Ok(self.encode_forest(bigraph))
    }

    /// Encodes a ground bigraph with any positive number of roots.
    ///
    /// Roots are serialized one after another; with
    /// [`with_unordered_roots`](Self::with_unordered_roots) they are ordered
    /// like siblings. Links shared between roots are numbered across the
    /// whole forest.
    pub fn encode_state(&self, bigraph: &Bigraph) -> Result<String, CanonicalFormError> {
        check_alphabet(bigraph)?;
        if !bigraph.is_ground() {
            return Err(CanonicalFormError::NotGround);
        }
        if bigraph.roots().is_empty() {
            return Err(CanonicalFormError::NoRoots);
        }
        if bigraph.node_count() == 0 {
            return encode_elementary(bigraph);
        }
        Ok(self.encode_forest(bigraph))
    }

    /// Encodes a bigraph with sites and inner names.
    ///
    /// Sites render as `$i` at their position in the forest and inner names
    /// are listed after a trailing `/` as `name=link`. Used to compare rule
    /// sides, which are never ground.
    pub fn encode_open(&self, bigraph: &Bigraph) -> Result<String, CanonicalFormError> {
        check_alphabet(bigraph)?;
        if bigraph.node_count() == 0 {
            return encode_elementary(bigraph);
        }
        if bigraph.roots().is_empty() {
            return Err(CanonicalFormError::NoRoots);
        }
        Ok(self.encode_forest(bigraph))
    }

    /// SHA-256 digest of [`encode_state`](Self::encode_state).
    pub fn digest(&self, bigraph: &Bigraph) -> Result<HashValue, CanonicalFormError> {
        Ok(state_digest(&self.encode_state(bigraph)?))
    }

    /// Returns `true` if both ground bigraphs encode to the same string.
    pub fn is_isomorphic(&self, a: &Bigraph, b: &Bigraph) -> Result<bool, CanonicalFormError> {
        Ok(self.encode_state(a)? == self.encode_state(b)?)
    }

    fn encode_forest(&self, bigraph: &Bigraph) -> String {
        let mut search = Search {
            bigraph,
            options: self.options,
            labelled: touches_anonymous_link(bigraph, self.options),
            first: None,
            best: None,
            automorphisms: Vec::new(),
            leaves: 0,
        };
        let mut path = Vec::new();
        search.explore(refine_colours(bigraph, self.options), &mut path);
        if search.leaves > 1 {
            log::debug!(
                "canonical form: {} leaves, {} automorphisms",
                search.leaves,
                search.automorphisms.len()
            );
        }
        search.best.map(|leaf| leaf.string).unwrap_or_default()
    }
}

/// Encodes with default options.
pub fn canonical_form(bigraph: &Bigraph) -> Result<String, CanonicalFormError> {
    CanonicalForm::default().encode(bigraph)
}

/// Characters with a meaning in the encoding grammar.
const RESERVED: &[char] = &['[', ']', ',', '.', '(', ')', '|', '#', '$', '{', '}', '/', '=', '~', '^'];

/// Every control name is followed by a delimiter, so only names that are empty
/// or contain a delimiter break parsing. Prefixes such as `Room`/`RoomKey` are fine.
fn check_alphabet(bigraph: &Bigraph) -> Result<(), CanonicalFormError> {
    let unparsable = bigraph
        .signature()
        .controls()
        .find(|c| c.name.is_empty() || c.name.contains(RESERVED) || c.name.contains(char::is_whitespace));
    match unparsable {
        Some(control) => Err(CanonicalFormError::AmbiguousControlAlphabet {
            control: control.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Template encoding of a node-free bigraph: the placing part lists, per
/// root, the sites it holds; the linking part lists, per link, its inner
/// names each followed by the outer name. The empty bigraph has no template.
fn encode_elementary(bigraph: &Bigraph) -> Result<String, CanonicalFormError> {
    if bigraph.roots().is_empty() && bigraph.outer_names().is_empty() && bigraph.inner_names().is_empty() {
        return Err(CanonicalFormError::NoRoots);
    }
    let mut out = String::new();
    for (i, root) in bigraph.roots().iter().enumerate() {
        let mut sites: Vec<usize> = bigraph
            .children(*root)
            .iter()
            .filter_map(|c| bigraph.site_index(*c))
            .collect();
        sites.sort_unstable();
        let _ = write!(out, "r{}", i);
        if !sites.is_empty() {
            out.push('$');
            for s in sites {
                let _ = write!(out, "{}", s);
            }
        }
        out.push('#');
    }

    let mut entries: Vec<String> = Vec::new();
    let mut by_link: BTreeMap<LinkId, Vec<&str>> = BTreeMap::new();
    for (name, link) in bigraph.inner_names() {
        match link {
            Some(l) => by_link.entry(*l).or_default().push(name),
            None => entries.push(format!("{}_", name)),
        }
    }
    for (link, inners) in &by_link {
        let outer = bigraph.link(*link).and_then(Link::name).unwrap_or("");
        for inner in inners {
            entries.push(format!("{}{}", inner, outer));
        }
    }
    for (name, link) in bigraph.outer_names() {
        if bigraph.points_of(*link).is_empty() {
            entries.push(format!("^{}", name));
        }
    }
    if !entries.is_empty() {
        entries.sort();
        out.push_str(&entries.join("$"));
        out.push('#');
    }
    Ok(out)
}

/// Marks every entity whose subtree has a port on an anonymous link.
fn touches_anonymous_link(bigraph: &Bigraph, options: ColourOptions) -> HashMap<EntityId, bool> {
    fn visit(
        bigraph: &Bigraph,
        id: EntityId,
        options: ColourOptions,
        out: &mut HashMap<EntityId, bool>,
    ) -> bool {
        let mut touches = bigraph.node(id).map_or(false, |n| {
            n.ports
                .iter()
                .flatten()
                .any(|l| bigraph.link(*l).map_or(false, |link| options.is_anonymous(link)))
        });
        for child in bigraph.children(id) {
            touches |= visit(bigraph, *child, options, out);
        }
        out.insert(id, touches);
        touches
    }
    let mut out = HashMap::new();
    for root in bigraph.roots() {
        visit(bigraph, *root, options, &mut out);
    }
    out
}

/// A fully ordered serialization reached by the search.
#[derive(Debug, Clone)]
struct Leaf {
    string: String,
    /// Entities in the order they were written.
    order: Vec<EntityId>,
    /// Colours of `order`, position by position.
    colours: Vec<HashValue>,
    /// Entities singled out on the way to this leaf.
    path: Vec<EntityId>,
}

impl Leaf {
    fn same_as(&self, other: &Leaf) -> bool {
        self.string == other.string && self.colours == other.colours
    }

    /// The entity permutation sending this leaf onto `other`.
    fn mapping_onto(&self, other: &Leaf) -> HashMap<EntityId, EntityId> {
        self.order.iter().copied().zip(other.order.iter().copied()).collect()
    }
}

/// Individualization-refinement search for the least serialization.
///
/// Every node of the search tree holds an isomorphism-invariant colouring.
/// While equally coloured siblings touching anonymous links remain, one of
/// them is singled out and the colouring refined again. Two leaves with equal
/// serializations and colours reveal an automorphism, which prunes children
/// lying in an already explored orbit.
///
/// # Citations
/// - McKay & Piperno, "Practical graph isomorphism, II" (2014)
struct Search<'a> {
    bigraph: &'a Bigraph,
    options: ColourOptions,
    labelled: HashMap<EntityId, bool>,
    first: Option<Leaf>,
    best: Option<Leaf>,
    automorphisms: Vec<HashMap<EntityId, EntityId>>,
    leaves: usize,
}

impl Search<'_> {
    /// Explores the subtree below `path`. `Some(level)` asks every node deeper
    /// than `level` to give up its remaining children.
    fn explore(&mut self, colours: BTreeMap<EntityId, HashValue>, path: &mut Vec<EntityId>) -> Option<usize> {
        let layout = Layout::sorted(self.bigraph, &colours, self.options);
        let cell = match layout.target_cell(&colours, &self.labelled, self.options) {
            Some(cell) => cell,
            None => {
                let (string, order) = layout.render(self.bigraph, self.options);
                let leaf = Leaf {
                    colours: order.iter().map(|id| colours.get(id).copied().unwrap_or_else(HashValue::zero)).collect(),
                    string,
                    order,
                    path: path.clone(),
                };
                return self.record(leaf);
            }
        };

        let mut explored: Vec<EntityId> = Vec::new();
        for candidate in cell {
            if self.orbit_of(&explored, path.as_slice()).contains(&candidate) {
                continue;
            }
            let mut next = colours.clone();
            individualize(&mut next, candidate, path.len());
            let next = refine_from(self.bigraph, self.options, next);
            path.push(candidate);
            let jump = self.explore(next, path);
            path.pop();
            explored.push(candidate);
            if let Some(level) = jump {
                if level < path.len() {
                    return Some(level);
                }
            }
        }
        None
    }

    fn record(&mut self, leaf: Leaf) -> Option<usize> {
        self.leaves += 1;
        let first = match &self.first {
            Some(first) => first,
            None => {
                self.first = Some(leaf.clone());
                self.best = Some(leaf);
                return None;
            }
        };
        if leaf.same_as(first) {
            self.automorphisms.push(leaf.mapping_onto(first));
            // The subtree where this path left the first one mirrors the first subtree.
            let diverged = leaf
                .path
                .iter()
                .zip(&first.path)
                .position(|(a, b)| a != b)
                .unwrap_or(leaf.path.len());
            return Some(diverged);
        }
        match &self.best {
            Some(best) if leaf.same_as(best) => {
                self.automorphisms.push(leaf.mapping_onto(best));
            }
            Some(best) if leaf.string >= best.string => {}
            _ => self.best = Some(leaf),
        }
        None
    }

    /// Entities reachable from `seeds` under the known automorphisms that fix `path`.
    fn orbit_of(&self, seeds: &[EntityId], path: &[EntityId]) -> BTreeSet<EntityId> {
        let generators: Vec<&HashMap<EntityId, EntityId>> = self
            .automorphisms
            .iter()
            .filter(|gamma| path.iter().all(|p| gamma.get(p) == Some(p)))
            .collect();
        let mut orbit: BTreeSet<EntityId> = seeds.iter().copied().collect();
        let mut stack: Vec<EntityId> = seeds.to_vec();
        while let Some(id) = stack.pop() {
            for gamma in &generators {
                if let Some(image) = gamma.get(&id) {
                    if orbit.insert(*image) {
                        stack.push(*image);
                    }
                }
            }
        }
        orbit
    }
}

/// A total order on roots and on the children of every entity.
struct Layout {
    roots: Vec<EntityId>,
    children: HashMap<EntityId, Vec<EntityId>>,
}

impl Layout {
    fn sorted(bigraph: &Bigraph, colours: &BTreeMap<EntityId, HashValue>, options: ColourOptions) -> Self {
        let colour = |id: &EntityId| colours.get(id).copied().unwrap_or_else(HashValue::zero);
        let mut roots = bigraph.roots().to_vec();
        if options.unordered_roots {
            roots.sort_by_key(|r| (colour(r), *r));
        }
        let mut children = HashMap::new();
        for (id, entity) in bigraph.entities() {
            if entity.children.is_empty() {
                continue;
            }
            let mut ordered = entity.children.clone();
            ordered.sort_by_key(|c| (colour(c), *c));
            children.insert(id, ordered);
        }
        Self { roots, children }
    }

    /// The colour class to split next: the least colour shared by two
    /// siblings whose subtrees touch an anonymous link. `None` once the
    /// layout serializes the same whatever the remaining ties.
    fn target_cell(
        &self,
        colours: &BTreeMap<EntityId, HashValue>,
        labelled: &HashMap<EntityId, bool>,
        options: ColourOptions,
    ) -> Option<Vec<EntityId>> {
        let mut least: Option<HashValue> = None;
        let mut scan = |seq: &[EntityId]| {
            for pair in seq.windows(2) {
                let (a, b) = (colours.get(&pair[0]), colours.get(&pair[1]));
                let tied_and_linked = a.is_some()
                    && a == b
                    && (labelled.get(&pair[0]).copied().unwrap_or(false)
                        || labelled.get(&pair[1]).copied().unwrap_or(false));
                if let (true, Some(colour)) = (tied_and_linked, a) {
                    if least.map_or(true, |l| *colour < l) {
                        least = Some(*colour);
                    }
                }
            }
        };
        if options.unordered_roots {
            scan(&self.roots);
        }
        for seq in self.children.values() {
            scan(seq);
        }
        let least = least?;
        Some(
            colours
                .iter()
                .filter(|(_, c)| **c == least)
                .map(|(id, _)| *id)
                .collect(),
        )
    }

    fn ordered_children(&self, id: EntityId) -> &[EntityId] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Numbers anonymous links breadth-first, then writes the nested form.
    /// Also returns the entities in the order they were written.
    fn render(&self, bigraph: &Bigraph, options: ColourOptions) -> (String, Vec<EntityId>) {
        let mut numbers: HashMap<LinkId, usize> = HashMap::new();
        let mut next_edge = 0usize;
        let mut next_open = 0usize;
        let mut number = |link: LinkId, numbers: &mut HashMap<LinkId, usize>| {
            if numbers.contains_key(&link) {
                return;
            }
            match bigraph.link(link) {
                Some(Link::Edge) => {
                    numbers.insert(link, next_edge);
                    next_edge += 1;
                }
                Some(Link::Outer(_)) if options.anonymous_outer_names => {
                    numbers.insert(link, next_open);
                    next_open += 1;
                }
                _ => {}
            }
        };
        let mut queue: VecDeque<EntityId> = self.roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if let Some(node) = bigraph.node(id) {
                for link in node.ports.iter().flatten() {
                    number(*link, &mut numbers);
                }
            }
            queue.extend(self.ordered_children(id).iter().copied());
        }
        for link in bigraph.inner_names().values().flatten() {
            number(*link, &mut numbers);
        }

        let mut out = String::new();
        let mut order = Vec::with_capacity(bigraph.entities.len());
        for (position, root) in self.roots.iter().enumerate() {
            let index = if options.unordered_roots {
                position
            } else {
                bigraph.root_index(*root).unwrap_or(position)
            };
            let _ = write!(out, "r{}", index);
            order.push(*root);
            self.render_children(bigraph, *root, &numbers, &mut out, &mut order);
            out.push('#');
        }

        let outer = bigraph.outer_names();
        if options.anonymous_outer_names {
            let idle = outer
                .values()
                .filter(|l| bigraph.points_of(**l).is_empty())
                .count();
            if idle > 0 {
                let _ = write!(out, "{{^{}}}", idle);
            }
        } else if !outer.is_empty() {
            out.push('{');
            out.push_str(&outer.keys().cloned().collect::<Vec<_>>().join(","));
            out.push('}');
        }

        if !bigraph.inner_names().is_empty() {
            let entries: Vec<String> = bigraph
                .inner_names()
                .iter()
                .map(|(name, link)| format!("{}={}", name, link_label(bigraph, *link, &numbers)))
                .collect();
            out.push('/');
            out.push_str(&entries.join(","));
        }
        (out, order)
    }

    fn render_children(
        &self,
        bigraph: &Bigraph,
        id: EntityId,
        numbers: &HashMap<LinkId, usize>,
        out: &mut String,
        order: &mut Vec<EntityId>,
    ) {
        let children = self.ordered_children(id);
        if children.is_empty() {
            return;
        }
        out.push_str(".(");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            self.render_place(bigraph, *child, numbers, out, order);
        }
        out.push(')');
    }

    fn render_place(
        &self,
        bigraph: &Bigraph,
        id: EntityId,
        numbers: &HashMap<LinkId, usize>,
        out: &mut String,
        order: &mut Vec<EntityId>,
    ) {
        order.push(id);
        match &bigraph.entities[id].kind {
            EntityKind::Node(node) => {
                out.push_str(&node.control);
                if !node.ports.is_empty() {
                    out.push('[');
                    for (i, port) in node.ports.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        out.push_str(&link_label(bigraph, *port, numbers));
                    }
                    out.push(']');
                }
                self.render_children(bigraph, id, numbers, out, order);
            }
            EntityKind::Site { index } => {
                let _ = write!(out, "${}", index);
            }
            EntityKind::Root { .. } => {}
        }
    }
}

fn link_label(bigraph: &Bigraph, link: Option<LinkId>, numbers: &HashMap<LinkId, usize>) -> String {
    match link.map(|l| (l, bigraph.link(l))) {
        Some((l, Some(Link::Edge))) => format!("~{}", numbers.get(&l).copied().unwrap_or(0)),
        Some((l, Some(Link::Outer(name)))) => match numbers.get(&l) {
            Some(n) => format!("^{}", n),
            None => name.clone(),
        },
        _ => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BigraphBuilder;
    use crate::elementary::BigraphContext;
    use crate::signature::{Control, Signature};
    use crate::testing::{fixture_context, petri_agent, place_with_tokens};

    /// Elementary placings and linkings use fixed templates.
    #[test]
    fn elementary_templates() {
        let ctx = fixture_context();
        let canon = CanonicalForm::default();
        assert_eq!(canon.encode(&ctx.barren().unwrap()).unwrap(), "r0#");
        assert_eq!(canon.encode(&ctx.join().unwrap()).unwrap(), "r0$01#");
        assert_eq!(canon.encode(&ctx.merge(3).unwrap()).unwrap(), "r0$012#");
        assert_eq!(canon.encode(&ctx.identity_place(2).unwrap()).unwrap(), "r0$0#r1$1#");
        assert_eq!(canon.encode(&ctx.symmetry(2).unwrap()).unwrap(), "r0$1#r1$0#");
        assert_eq!(canon.encode(&ctx.closure(&["x", "y"]).unwrap()).unwrap(), "x$y#");
        assert_eq!(
            canon.encode(&ctx.substitution("y", &["x", "z"]).unwrap()).unwrap(),
            "xy$zy#"
        );
        assert_eq!(canon.encode(&ctx.identity_link(&["a", "b"]).unwrap()).unwrap(), "aa$bb#");
    }

    /// Ground and prime preconditions.
    #[test]
    fn preconditions() {
        let ctx = fixture_context();
        let canon = CanonicalForm::default();
        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        b.add_site(p).unwrap();
        assert_eq!(canon.encode(&b.build().unwrap()), Err(CanonicalFormError::NotGround));

        let two = crate::operations::parallel_product(
            &place_with_tokens(&ctx, 1, None),
            &place_with_tokens(&ctx, 0, None),
        )
        .unwrap();
        assert_eq!(canon.encode(&two), Err(CanonicalFormError::NotPrime { roots: 2 }));
        assert!(canon.encode_state(&two).is_ok());
        assert_eq!(canon.encode_state(&ctx.empty().unwrap()), Err(CanonicalFormError::NoRoots));
    }

    /// Prefixes are fine; only names clashing with the grammar are rejected.
    #[test]
    fn control_alphabet() {
        let sig = Signature::new([Control::active("Room", 0), Control::atomic("RoomKey", 0)]).unwrap();
        let mut b = BigraphBuilder::new(sig);
        let r = b.add_root();
        let room = b.add_node(r, "Room").unwrap();
        b.add_node(room, "RoomKey").unwrap();
        assert_eq!(
            CanonicalForm::default().encode(&b.build().unwrap()).unwrap(),
            "r0.(Room.(RoomKey))#"
        );

        for bad in ["A.B", "", "x|y", "with space"] {
            let sig = Signature::new([Control::active(bad, 0)]).unwrap();
            let mut b = BigraphBuilder::new(sig);
            let r = b.add_root();
            b.add_node(r, bad).unwrap();
            let err = CanonicalForm::default().encode(&b.build().unwrap()).unwrap_err();
            assert_eq!(err, CanonicalFormError::AmbiguousControlAlphabet { control: bad.into() });
        }
    }

    /// The Petri net agent renders in the documented grammar.
    #[test]
    fn renders_grammar() {
        let ctx = fixture_context();
        let s = canonical_form(&petri_agent(&ctx, 1, 0)).unwrap();
        assert!(s.starts_with("r0.("), "{}", s);
        assert!(s.ends_with(")#"), "{}", s);
        assert!(s.contains("Token"));
        assert!(s.contains("Transition[~"));
    }

    /// Sibling order does not influence the string.
    #[test]
    fn sibling_order_independent() {
        let ctx = fixture_context();
        let build = |reverse: bool| {
            let mut b = ctx.builder();
            let r = b.add_root();
            let e = b.add_edge();
            let make = |b: &mut BigraphBuilder| {
                let p = b.add_node(r, "Place").unwrap();
                b.connect(p, 0, e).unwrap();
                b.add_node(p, "Token").unwrap();
            };
            if reverse {
                b.add_node(r, "Transition").unwrap();
                make(&mut b);
            } else {
                make(&mut b);
                b.add_node(r, "Transition").unwrap();
            }
            b.build().unwrap()
        };
        let canon = CanonicalForm::default();
        assert_eq!(canon.encode(&build(false)).unwrap(), canon.encode(&build(true)).unwrap());
    }

    /// Tied siblings with different edge wiring still encode identically.
    #[test]
    fn tied_linked_siblings() {
        let ctx = fixture_context();
        // Two places share edge e; a third place sits alone on f. Tokens
        // are placed so that the colour classes tie.
        let build = |swap: bool| {
            let mut b = ctx.builder();
            let r = b.add_root();
            let e = b.add_edge();
            let f = b.add_edge();
            let t = b.add_node(r, "Transition").unwrap();
            b.connect(t, 0, e).unwrap();
            b.connect(t, 1, f).unwrap();
            let (first, second) = if swap { (f, e) } else { (e, f) };
            let p1 = b.add_node(r, "Place").unwrap();
            b.connect(p1, 0, first).unwrap();
            let p2 = b.add_node(r, "Place").unwrap();
            b.connect(p2, 0, second).unwrap();
            b.build().unwrap()
        };
        let canon = CanonicalForm::default();
        assert_eq!(canon.encode(&build(false)).unwrap(), canon.encode(&build(true)).unwrap());
    }

    /// Structurally different bigraphs get different strings.
    #[test]
    fn distinguishes_structure() {
        let ctx = fixture_context();
        let canon = CanonicalForm::default();
        let a = canon.encode(&petri_agent(&ctx, 2, 0)).unwrap();
        let b = canon.encode(&petri_agent(&ctx, 1, 1)).unwrap();
        let c = canon.encode(&petri_agent(&ctx, 0, 2)).unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);

        // Same shape, different link pattern: both places on one edge.
        let mut builder = ctx.builder();
        let r = builder.add_root();
        let e = builder.add_edge();
        let p = builder.add_node(r, "Place").unwrap();
        let q = builder.add_node(r, "Place").unwrap();
        builder.connect(p, 0, e).unwrap();
        builder.connect(q, 0, e).unwrap();
        let shared = builder.build().unwrap();

        let mut builder = ctx.builder();
        let r = builder.add_root();
        let e = builder.add_edge();
        let f = builder.add_edge();
        let p = builder.add_node(r, "Place").unwrap();
        let q = builder.add_node(r, "Place").unwrap();
        builder.connect(p, 0, e).unwrap();
        builder.connect(q, 0, f).unwrap();
        let separate = builder.build().unwrap();
        assert_ne!(canon.encode(&shared).unwrap(), canon.encode(&separate).unwrap());
    }

    /// Open-link rewriting identifies agents that differ only in names.
    #[test]
    fn rewrite_open_links() {
        let ctx = fixture_context();
        let x = place_with_tokens(&ctx, 1, Some("x"));
        let y = place_with_tokens(&ctx, 1, Some("y"));
        let named = CanonicalForm::default();
        assert_ne!(named.encode(&x).unwrap(), named.encode(&y).unwrap());
        let anonymous = CanonicalForm::default().with_rewrite_open_links(true);
        assert_eq!(anonymous.encode(&x).unwrap(), anonymous.encode(&y).unwrap());
    }

    /// Unordered roots collapse root permutations.
    #[test]
    fn unordered_roots() {
        let ctx: BigraphContext = fixture_context();
        let a = place_with_tokens(&ctx, 1, None);
        let b = place_with_tokens(&ctx, 0, None);
        let ab = crate::operations::parallel_product(&a, &b).unwrap();
        let ba = crate::operations::parallel_product(&b, &a).unwrap();
        let ordered = CanonicalForm::default();
        assert_ne!(ordered.encode_state(&ab).unwrap(), ordered.encode_state(&ba).unwrap());
        let unordered = CanonicalForm::default().with_unordered_roots(true);
        assert_eq!(unordered.encode_state(&ab).unwrap(), unordered.encode_state(&ba).unwrap());
        assert_eq!(unordered.digest(&ab).unwrap(), unordered.digest(&ba).unwrap());
    }

    /// Open bigraphs encode sites in place and list inner names.
    #[test]
    fn open_encoding() {
        let ctx = fixture_context();
        let rule = crate::testing::fire_rule(&ctx);
        let canon = CanonicalForm::default();
        let redex = canon.encode_open(rule.redex()).unwrap();
        assert!(redex.contains("$0") && redex.contains("$1"), "{}", redex);
        assert!(redex.ends_with("{l,r}"), "{}", redex);
        assert_ne!(redex, canon.encode_open(rule.reactum()).unwrap());

        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        let e = b.add_edge();
        b.connect(p, 0, e).unwrap();
        b.add_inner_name("x", Some(e)).unwrap();
        assert_eq!(canon.encode_open(&b.build().unwrap()).unwrap(), "r0.(Place[~0])#/x=~0");
    }

    /// `count` disjoint `Place.(Token) -e- Transition -f- Place` nets under one
    /// root, created in `order`; with `flip` each net is built right to left.
    fn copies(ctx: &BigraphContext, count: usize, order: &[usize], flip: bool) -> Bigraph {
        let mut b = ctx.builder();
        let r = b.add_root();
        let links: Vec<_> = (0..2 * count).map(|_| b.add_edge()).collect();
        for &i in order.iter().take(count) {
            let (e, f) = (links[2 * i], links[2 * i + 1]);
            let mut steps = ["source", "transition", "sink"];
            if flip {
                steps.reverse();
            }
            for step in steps {
                match step {
                    "source" => {
                        let p = b.add_node(r, "Place").unwrap();
                        b.connect(p, 0, e).unwrap();
                        b.add_node(p, "Token").unwrap();
                    }
                    "transition" => {
                        let t = b.add_node(r, "Transition").unwrap();
                        b.connect(t, 0, e).unwrap();
                        b.connect(t, 1, f).unwrap();
                    }
                    _ => {
                        let p = b.add_node(r, "Place").unwrap();
                        b.connect(p, 0, f).unwrap();
                    }
                }
            }
        }
        b.build().unwrap()
    }

    /// Many interchangeable linked components encode quickly and independently
    /// of construction order.
    #[test]
    fn symmetric_components() {
        let ctx = fixture_context();
        let canon = CanonicalForm::default();
        let n = 10;
        let forward: Vec<usize> = (0..n).collect();
        let shuffled: Vec<usize> = (0..n).map(|i| (i * 7 + 3) % n).collect();

        let started = std::time::Instant::now();
        let a = canon.encode_state(&copies(&ctx, n, &forward, false)).unwrap();
        let b = canon.encode_state(&copies(&ctx, n, &shuffled, true)).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(10), "{:?}", started.elapsed());
        assert_eq!(a, b);
        assert_eq!(a.matches("Transition").count(), n);

        let fewer = canon.encode_state(&copies(&ctx, n - 1, &forward, false)).unwrap();
        assert_ne!(a, fewer);
    }

    /// Equal colours do not imply equal structure: one 6-cycle of places
    /// against two 3-cycles.
    #[test]
    fn regular_link_structures() {
        let sig = Signature::new([Control::active("P", 2)]).unwrap();
        let ring = |cycles: &[usize]| {
            let mut b = BigraphBuilder::new(sig.clone());
            let r = b.add_root();
            for &len in cycles {
                let edges: Vec<_> = (0..len).map(|_| b.add_edge()).collect();
                for i in 0..len {
                    let p = b.add_node(r, "P").unwrap();
                    b.connect(p, 0, edges[i]).unwrap();
                    b.connect(p, 1, edges[(i + 1) % len]).unwrap();
                }
            }
            b.build().unwrap()
        };
        let canon = CanonicalForm::default();
        let six = canon.encode(&ring(&[6])).unwrap();
        let threes = canon.encode(&ring(&[3, 3])).unwrap();
        assert_ne!(six, threes);
        assert_eq!(threes, canon.encode(&ring(&[3, 3])).unwrap());
    }

    /// The empty bigraph has no encoding; pure linkings without roots do.
    #[test]
    fn empty_bigraph() {
        let ctx = fixture_context();
        let canon = CanonicalForm::default();
        let empty = ctx.empty().unwrap();
        assert_eq!(canon.encode(&empty), Err(CanonicalFormError::NoRoots));
        assert_eq!(canon.encode_open(&empty), Err(CanonicalFormError::NoRoots));
        assert_eq!(canon.encode_state(&empty), Err(CanonicalFormError::NoRoots));
        assert_eq!(canon.encode(&ctx.closure(&["x"]).unwrap()).unwrap(), "x#");
    }
}
