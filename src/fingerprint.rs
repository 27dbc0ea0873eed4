//! Fingerprinting and colour refinement for bigraphs.
//!
//! Provides deterministic structural hashing with domain separation and
//! length prefixing, and a Weisfeiler–Lehman style refinement that assigns
//! every place-graph entity an isomorphism-invariant colour. The canonical
//! encoder orders siblings by these colours before it serializes.
//!
//! # Citations
//! - Weisfeiler–Lehman graph isomorphism test: Weisfeiler & Lehman, "A reduction of a graph to a canonical form" (1968)
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)

use crate::arena::EntityId;
use crate::core::{Bigraph, EntityKind, Link, Point};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// Domain separation prefix is applied as `b"BRS:<domain>:v1" || length_prefix(data) || data`.
    /// Length prefix is a 64-bit little-endian count of bytes.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"BRS:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Lower-case hex rendering of all 32 bytes.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Digest of a canonical string, used as a compact state key.
pub fn state_digest(canonical: &str) -> HashValue {
    HashValue::hash_with_domain(b"STATE", canonical.as_bytes())
}

/// Length-prefixed byte accumulator for colour hashing.
#[derive(Default)]
struct ColourData(Vec<u8>);

impl ColourData {
    fn tag(mut self, tag: &[u8]) -> Self {
        self.push_bytes(tag);
        self
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        self.0.extend_from_slice(bytes);
    }

    fn push_u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn push_hash(&mut self, hash: &HashValue) {
        self.0.extend_from_slice(&hash.0);
    }

    fn finish(self, domain: &[u8]) -> HashValue {
        HashValue::hash_with_domain(domain, &self.0)
    }
}

/// Knobs shared by colour refinement and the canonical encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColourOptions {
    /// Treat outer names as anonymous links, like edges.
    pub anonymous_outer_names: bool,
    /// Ignore root indices (roots are interchangeable).
    pub unordered_roots: bool,
}

impl ColourOptions {
    /// Returns `true` if the link is rendered by a numbered placeholder rather than by name.
    pub fn is_anonymous(&self, link: &Link) -> bool {
        match link {
            Link::Edge => true,
            Link::Outer(_) => self.anonymous_outer_names,
        }
    }
}

/// Bottom-up colour of every entity: control, port kinds and the sorted
/// colours of its children. Two subtrees that touch no anonymous link share
/// this colour exactly when they are isomorphic.
pub fn subtree_colours(bigraph: &Bigraph, options: ColourOptions) -> BTreeMap<EntityId, HashValue> {
    let mut colours = BTreeMap::new();
    for root in bigraph.roots() {
        subtree_colour(bigraph, *root, options, &mut colours);
    }
    colours
}

fn subtree_colour(
    bigraph: &Bigraph,
    id: EntityId,
    options: ColourOptions,
    colours: &mut BTreeMap<EntityId, HashValue>,
) -> HashValue {
    let mut child_colours: Vec<HashValue> = bigraph
        .children(id)
        .iter()
        .map(|child| subtree_colour(bigraph, *child, options, colours))
        .collect();
    child_colours.sort();

    let mut data = ColourData::default();
    match &bigraph.entities[id].kind {
        EntityKind::Root { index } => {
            data = data.tag(b"root");
            data.push_u64(if options.unordered_roots { 0 } else { *index as u64 + 1 });
        }
        EntityKind::Site { index } => {
            data = data.tag(b"site");
            data.push_u64(*index as u64);
        }
        EntityKind::Node(node) => {
            data = data.tag(b"node");
            data.push_bytes(node.control.as_bytes());
            for port in &node.ports {
                match port.and_then(|l| bigraph.link(l)) {
                    None => data.push_bytes(b"_"),
                    Some(link) if options.is_anonymous(link) => data.push_bytes(b"~"),
                    Some(Link::Outer(name)) => {
                        data.push_bytes(b"o");
                        data.push_bytes(name.as_bytes());
                    }
                    Some(Link::Edge) => data.push_bytes(b"~"),
                }
            }
        }
    }
    data.push_u64(child_colours.len() as u64);
    for colour in &child_colours {
        data.push_hash(colour);
    }
    let colour = data.finish(b"SUBTREE");
    colours.insert(id, colour);
    colour
}

/// Refines subtree colours with link and parent context until the colour
/// partition is stable.
///
/// Each round a node's colour absorbs, per port, the sorted colours of the
/// other points on the same anonymous link, together with its parent's and
/// children's colours. Refinement stops once the number of distinct colours no
/// longer grows.
///
/// # Determinism guarantee
/// Entities are visited in id order and every multiset is sorted before hashing.
pub fn refine_colours(bigraph: &Bigraph, options: ColourOptions) -> BTreeMap<EntityId, HashValue> {
    refine_from(bigraph, options, subtree_colours(bigraph, options))
}

/// Refines an arbitrary starting colouring, such as one where a single
/// entity was given a colour of its own.
pub fn refine_from(
    bigraph: &Bigraph,
    options: ColourOptions,
    mut colours: BTreeMap<EntityId, HashValue>,
) -> BTreeMap<EntityId, HashValue> {
    let mut classes = colours.values().collect::<BTreeSet<_>>().len();
    let max_rounds = colours.len().max(1);

    for round in 0..max_rounds {
        let mut next = BTreeMap::new();
        for (&id, colour) in &colours {
            let mut data = ColourData::default().tag(b"refine");
            data.push_u64(round as u64);
            data.push_hash(colour);
            match bigraph.parent(id).and_then(|p| colours.get(&p)) {
                Some(parent) => data.push_hash(parent),
                None => data.push_bytes(b"-"),
            }
            let mut child_colours: Vec<&HashValue> = bigraph
                .children(id)
                .iter()
                .filter_map(|c| colours.get(c))
                .collect();
            child_colours.sort();
            for c in child_colours {
                data.push_hash(c);
            }
            if let Some(node) = bigraph.node(id) {
                for (port, link) in node.ports.iter().enumerate() {
                    let link = match link {
                        Some(l) => *l,
                        None => continue,
                    };
                    let anonymous = bigraph.link(link).map_or(false, |l| options.is_anonymous(l));
                    if !anonymous {
                        continue;
                    }
                    let mut peers: Vec<(HashValue, u64)> = bigraph
                        .points_of(link)
                        .iter()
                        .filter_map(|point| match point {
                            Point::Port { node: other, port: p } if !(*other == id && *p == port) => {
                                colours.get(other).map(|c| (*c, *p as u64))
                            }
                            Point::Port { .. } => None,
                            Point::Inner(_) => Some((HashValue::zero(), u64::MAX)),
                        })
                        .collect();
                    peers.sort();
                    data.push_u64(port as u64);
                    data.push_u64(peers.len() as u64);
                    for (c, p) in &peers {
                        data.push_hash(c);
                        data.push_u64(*p);
                    }
                }
            }
            next.insert(id, data.finish(b"REFINE"));
        }
        let next_classes = next.values().collect::<BTreeSet<_>>().len();
        colours = next;
        if next_classes <= classes {
            break;
        }
        classes = next_classes;
    }
    colours
}

/// Gives `id` a colour no other entity has, derived from its current colour
/// and the search `depth` at which it was singled out.
pub fn individualize(colours: &mut BTreeMap<EntityId, HashValue>, id: EntityId, depth: usize) {
    if let Some(colour) = colours.get_mut(&id) {
        let mut data = ColourData::default().tag(b"individual");
        data.push_hash(colour);
        data.push_u64(depth as u64);
        *colour = data.finish(b"INDIVIDUAL");
    }
}
