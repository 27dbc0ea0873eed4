//! Core data structures for pure bigraphs.
//!
//! A bigraph pairs a place graph (a forest of roots, nodes and sites) with a
//! link graph (points connected to edges or outer names). Entities and links
//! live in flat arenas; parent/child and port/link relations are index arrays.
//!
//! A `Bigraph` is an immutable value. It is produced by
//! [`BigraphBuilder`](crate::builder::BigraphBuilder), by the elementary
//! constructors of [`BigraphContext`](crate::elementary::BigraphContext) or by
//! the composition operators in [`operations`](crate::operations), all of which
//! return fresh values and never share entities between bigraphs.
//!
//! # Citations
//! - Milner, "The Space and Motion of Communicating Agents" (2009), Definition 2.1 (concrete bigraph)
//! - Jensen & Milner, "Bigraphs and mobile processes (revised)" (2004)

use crate::arena::{Arena, EntityId, LinkId};
use crate::interface::Face;
use crate::signature::{Control, Signature};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Payload of a node entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeData {
    /// Name of the node's control in the bigraph's signature.
    pub control: String,
    /// One slot per port, in the control's port numbering. `None` is an open port.
    pub ports: Vec<Option<LinkId>>,
}

/// The three kinds of place-graph entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Outer interface anchor with its index.
    Root { index: usize },
    /// A node carrying a control.
    Node(NodeData),
    /// An open hole of the inner interface with its index.
    Site { index: usize },
}

/// A place-graph entity together with its position in the forest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Kind and payload.
    pub kind: EntityKind,
    /// Owning entity; `None` exactly for roots.
    pub parent: Option<EntityId>,
    /// Children in insertion order. Sibling order carries no meaning.
    pub children: Vec<EntityId>,
}

impl Entity {
    /// Returns the node payload if this entity is a node.
    pub fn as_node(&self) -> Option<&NodeData> {
        match &self.kind {
            EntityKind::Node(data) => Some(data),
            _ => None,
        }
    }

    /// Returns `true` for roots.
    pub fn is_root(&self) -> bool {
        matches!(self.kind, EntityKind::Root { .. })
    }

    /// Returns `true` for nodes.
    pub fn is_node(&self) -> bool {
        matches!(self.kind, EntityKind::Node(_))
    }

    /// Returns `true` for sites.
    pub fn is_site(&self) -> bool {
        matches!(self.kind, EntityKind::Site { .. })
    }
}

/// A link of the link graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Link {
    /// An anonymous, closed link.
    Edge,
    /// A named link of the outer face.
    Outer(String),
}

impl Link {
    /// Returns `true` for edges.
    pub fn is_edge(&self) -> bool {
        matches!(self, Link::Edge)
    }

    /// Returns the outer name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Link::Edge => None,
            Link::Outer(name) => Some(name),
        }
    }
}

/// A point of the link graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Point {
    /// Port `port` of node `node`.
    Port { node: EntityId, port: usize },
    /// An inner name.
    Inner(String),
}

/// A pure, concrete bigraph.
///
/// # Invariants
/// - Every node has exactly `arity` ports, where `arity` is its control's arity.
/// - The place graph is a forest: roots have no parent, every other entity has
///   exactly one, and following parents always reaches a root.
/// - Sites and atomic nodes have no children.
/// - Root indices are `0..roots.len()` in order, site indices `0..sites.len()`.
/// - Outer names map to `Link::Outer` links of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bigraph {
    pub(crate) signature: Arc<Signature>,
    pub(crate) entities: Arena<EntityId, Entity>,
    pub(crate) links: Arena<LinkId, Link>,
    pub(crate) roots: Vec<EntityId>,
    pub(crate) sites: Vec<EntityId>,
    pub(crate) outer_names: BTreeMap<String, LinkId>,
    pub(crate) inner_names: BTreeMap<String, Option<LinkId>>,
    /// Points attached to each link, indexed by `LinkId`.
    pub(crate) link_points: Vec<Vec<Point>>,
}

impl Bigraph {
    /// The signature this bigraph is typed over.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Shared handle to the signature.
    pub fn signature_arc(&self) -> &Arc<Signature> {
        &self.signature
    }

    /// Roots in index order.
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Sites in index order.
    pub fn sites(&self) -> &[EntityId] {
        &self.sites
    }

    /// Returns the entity stored at `id`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// All entities in allocation order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Parent of `id`, `None` for roots and unknown ids.
    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.entities.get(id).and_then(|e| e.parent)
    }

    /// Children of `id`, empty for unknown ids.
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.entities.get(id).map_or(&[], |e| e.children.as_slice())
    }

    /// All nodes in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = (EntityId, &NodeData)> {
        self.entities
            .iter()
            .filter_map(|(id, e)| e.as_node().map(|data| (id, data)))
    }

    /// Node payload of `id`, if it is a node.
    pub fn node(&self, id: EntityId) -> Option<&NodeData> {
        self.entities.get(id).and_then(Entity::as_node)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Control of node `id`.
    pub fn control_of(&self, id: EntityId) -> Option<&Control> {
        self.node(id).and_then(|n| self.signature.control(&n.control))
    }

    /// Returns the link at `id`.
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    /// All links in allocation order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    /// All edges in allocation order.
    pub fn edges(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.links
            .iter()
            .filter(|(_, l)| l.is_edge())
            .map(|(id, _)| id)
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// Outer names with their links, ascending by name.
    pub fn outer_names(&self) -> &BTreeMap<String, LinkId> {
        &self.outer_names
    }

    /// Inner names with the link each one is connected to, ascending by name.
    pub fn inner_names(&self) -> &BTreeMap<String, Option<LinkId>> {
        &self.inner_names
    }

    /// Link connected to port `port` of node `node`.
    pub fn link_of_port(&self, node: EntityId, port: usize) -> Option<LinkId> {
        self.node(node).and_then(|n| n.ports.get(port).copied().flatten())
    }

    /// Points attached to `link`.
    pub fn points_of(&self, link: LinkId) -> &[Point] {
        self.link_points
            .get(link.as_u32() as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Index of a root entity.
    pub fn root_index(&self, id: EntityId) -> Option<usize> {
        match self.entities.get(id)?.kind {
            EntityKind::Root { index } => Some(index),
            _ => None,
        }
    }

    /// Index of a site entity.
    pub fn site_index(&self, id: EntityId) -> Option<usize> {
        match self.entities.get(id)?.kind {
            EntityKind::Site { index } => Some(index),
            _ => None,
        }
    }

    /// The outer face `⟨roots, outer names⟩`.
    pub fn outer_face(&self) -> Face {
        Face {
            width: self.roots.len(),
            names: self.outer_names.keys().cloned().collect(),
        }
    }

    /// The inner face `⟨sites, inner names⟩`.
    pub fn inner_face(&self) -> Face {
        Face {
            width: self.sites.len(),
            names: self.inner_names.keys().cloned().collect(),
        }
    }

    /// No sites and no inner names.
    pub fn is_ground(&self) -> bool {
        self.sites.is_empty() && self.inner_names.is_empty()
    }

    /// Exactly one root.
    pub fn is_prime(&self) -> bool {
        self.roots.len() == 1
    }

    /// Links with no attached point.
    pub fn idle_links(&self) -> Vec<LinkId> {
        self.links
            .ids()
            .filter(|id| self.points_of(*id).is_empty())
            .collect()
    }

    /// Outer names with no attached point.
    pub fn idle_outer_names(&self) -> Vec<&str> {
        self.outer_names
            .iter()
            .filter(|(_, link)| self.points_of(**link).is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// No idle root and no idle outer name.
    pub fn is_epimorphic(&self) -> bool {
        self.roots.iter().all(|r| !self.children(*r).is_empty()) && self.idle_outer_names().is_empty()
    }

    /// No two sites are siblings and no two inner names share a link.
    pub fn is_monomorphic(&self) -> bool {
        self.sites_are_not_siblings() && {
            let mut seen = std::collections::HashSet::new();
            self.inner_names
                .values()
                .flatten()
                .all(|link| seen.insert(*link))
        }
    }

    /// No two sites share a parent (inner-injective place graph).
    pub fn sites_are_not_siblings(&self) -> bool {
        let mut parents = std::collections::HashSet::new();
        self.sites
            .iter()
            .filter_map(|s| self.parent(*s))
            .all(|p| parents.insert(p))
    }

    /// No site is a child of a root and no inner name is present.
    pub fn is_guarding(&self) -> bool {
        self.sites_under_roots().is_empty() && self.inner_names.is_empty()
    }

    /// Sites that are direct children of a root.
    pub fn sites_under_roots(&self) -> Vec<EntityId> {
        self.sites
            .iter()
            .copied()
            .filter(|s| self.parent(*s).map_or(false, |p| self.entities[p].is_root()))
            .collect()
    }

    /// Returns `true` if every node strictly above `id` (up to its root) is active.
    pub fn is_active_at(&self, id: EntityId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if let Some(control) = self.control_of(p) {
                if !control.kind.is_active() {
                    return false;
                }
            }
            current = self.parent(p);
        }
        true
    }

    /// Entities below `id` in breadth-first order, excluding `id`.
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut queue: VecDeque<EntityId> = self.children(id).iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            out.push(next);
            queue.extend(self.children(next).iter().copied());
        }
        out
    }

    /// The root above `id` (or `id` itself for a root).
    pub fn root_of(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Some(p) = self.parent(current) {
            current = p;
        }
        current
    }
}

impl fmt::Display for Bigraph {
    /// Renders roots with their nested contents, followed by the link map.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn place(b: &Bigraph, id: EntityId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match &b.entities[id].kind {
                EntityKind::Root { index } => write!(f, "{}", index)?,
                EntityKind::Site { index } => return write!(f, "[{}]", index),
                EntityKind::Node(data) => {
                    write!(f, "{}", data.control)?;
                    if !data.ports.is_empty() {
                        write!(f, "{{")?;
                        for (i, port) in data.ports.iter().enumerate() {
                            if i > 0 {
                                write!(f, ",")?;
                            }
                            match port.map(|l| (l, b.links.get(l))) {
                                Some((_, Some(Link::Outer(name)))) => write!(f, "{}", name)?,
                                Some((l, Some(Link::Edge))) => write!(f, "{}", l)?,
                                _ => write!(f, "-")?,
                            }
                        }
                        write!(f, "}}")?;
                    }
                }
            }
            let children = b.children(id);
            if !children.is_empty() {
                write!(f, ".(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    place(b, *child, f)?;
                }
                write!(f, ")")?;
            }
            Ok(())
        }

        for (i, root) in self.roots.iter().enumerate() {
            if i > 0 {
                write!(f, " || ")?;
            }
            place(self, *root, f)?;
        }
        write!(f, " : {} -> {}", self.inner_face(), self.outer_face())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fixture_context;

    /// Closures are epi and mono; substitutions merging names are not mono.
    #[test]
    fn linkings() {
        let ctx = fixture_context();
        let closure = ctx.closure(&["x", "y"]).unwrap();
        assert!(closure.is_epimorphic());
        assert!(closure.is_monomorphic());

        let merge_names = ctx.substitution("y", &["x", "z"]).unwrap();
        assert!(merge_names.is_epimorphic());
        assert!(!merge_names.is_monomorphic());

        let rename = ctx.substitution("y", &["x"]).unwrap();
        assert!(rename.is_epimorphic() && rename.is_monomorphic());

        let idle = ctx.introduction(&["y"]).unwrap();
        assert!(!idle.is_epimorphic());
        assert!(idle.is_monomorphic());
    }

    /// Sibling sites break mono; an empty root breaks epi.
    #[test]
    fn placings() {
        let ctx = fixture_context();
        let join = ctx.join().unwrap();
        assert!(join.is_epimorphic());
        assert!(!join.is_monomorphic());
        assert!(!ctx.barren().unwrap().is_epimorphic());
        let swap = ctx.symmetry(2).unwrap();
        assert!(swap.is_epimorphic() && swap.is_monomorphic());
    }

    /// A site directly under a root is not guarded; one inside a node is.
    #[test]
    fn guarding() {
        let ctx = fixture_context();
        let bare = ctx.merge(1).unwrap();
        assert!(!bare.is_guarding());
        assert_eq!(bare.sites_under_roots(), bare.sites().to_vec());

        let mut b = ctx.builder();
        let r = b.add_root();
        let p = b.add_node(r, "Place").unwrap();
        b.add_site(p).unwrap();
        assert!(b.build().unwrap().is_guarding());

        assert!(!ctx.identity_link(&["x"]).unwrap().is_guarding());
    }

    #[test]
    fn root_of_nested_entities() {
        let ctx = fixture_context();
        let mut b = ctx.builder();
        let first = b.add_root();
        let second = b.add_root();
        let place = b.add_node(second, "Place").unwrap();
        let token = b.add_node(place, "Token").unwrap();
        let bigraph = b.build().unwrap();
        assert_eq!(bigraph.root_of(token), second);
        assert_eq!(bigraph.root_of(place), second);
        assert_eq!(bigraph.root_of(first), first);
        assert_eq!(bigraph.descendants(second), vec![place, token]);
    }

    #[test]
    fn display() {
        let ctx = fixture_context();
        let mut b = ctx.builder();
        let r = b.add_root();
        let place = b.add_node(r, "Place").unwrap();
        let x = b.add_outer_name("x").unwrap();
        b.connect(place, 0, x).unwrap();
        b.add_node(place, "Token").unwrap();
        b.add_site(place).unwrap();
        b.add_root();
        let bigraph = b.build().unwrap();
        assert_eq!(
            bigraph.to_string(),
            "0.(Place{x}.(Token | [0])) || 1 : <1, {}> -> <2, {x}>"
        );
    }
}
