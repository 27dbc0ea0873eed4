//! Incremental, validated construction of bigraphs.
//!
//! `BigraphBuilder` is the only way to assemble a [`Bigraph`] from parts. Every
//! mutation is checked against the signature before it is applied, and
//! [`BigraphBuilder::build`] verifies the remaining structural invariants.

use crate::arena::{Arena, EntityId, LinkId};
use crate::core::{Bigraph, Entity, EntityKind, Link, NodeData, Point};
use crate::signature::Signature;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Error type for bigraph construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BigraphError {
    /// The control is not part of the signature.
    #[error("control `{0}` is not in the signature")]
    UnknownControl(String),
    /// Port index outside the control's arity.
    #[error("port {port} out of range for node {node} (arity {arity})")]
    PortOutOfRange {
        node: EntityId,
        port: usize,
        arity: usize,
    },
    /// Port already connected to a link.
    #[error("port {port} of node {node} is already linked")]
    PortAlreadyLinked { node: EntityId, port: usize },
    /// Atomic nodes and sites cannot have children.
    #[error("entity {0} cannot contain children")]
    NotAPlace(EntityId),
    /// Referenced entity does not exist.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    /// Referenced link does not exist.
    #[error("unknown link {0}")]
    UnknownLink(LinkId),
    /// Outer or inner name declared twice.
    #[error("name `{0}` is declared more than once")]
    DuplicateName(String),
    /// Site indices do not form `0..n`.
    #[error("site indices are not a permutation of 0..{0}")]
    BadSiteIndices(usize),
}

/// Builder for [`Bigraph`] values.
///
/// # Example
///
/// ```
/// use bigraphs::builder::BigraphBuilder;
/// use bigraphs::signature::{Control, Signature};
///
/// let sig = Signature::new([Control::active("Room", 1), Control::atomic("Agent", 1)]).unwrap();
/// let mut b = BigraphBuilder::new(sig);
/// let root = b.add_root();
/// let room = b.add_node(root, "Room").unwrap();
/// let agent = b.add_node(room, "Agent").unwrap();
/// let net = b.add_outer_name("net").unwrap();
/// b.connect(room, 0, net).unwrap();
/// b.connect(agent, 0, net).unwrap();
/// let bigraph = b.build().unwrap();
/// assert!(bigraph.is_ground() && bigraph.is_prime());
/// ```
#[derive(Debug, Clone)]
pub struct BigraphBuilder {
    signature: Arc<Signature>,
    entities: Arena<EntityId, Entity>,
    links: Arena<LinkId, Link>,
    roots: Vec<EntityId>,
    sites: Vec<(usize, EntityId)>,
    outer_names: BTreeMap<String, LinkId>,
    inner_names: BTreeMap<String, Option<LinkId>>,
}

impl BigraphBuilder {
    /// Starts an empty bigraph over `signature`.
    pub fn new(signature: Signature) -> Self {
        Self::with_signature(Arc::new(signature))
    }

    /// Starts an empty bigraph over a shared signature.
    pub fn with_signature(signature: Arc<Signature>) -> Self {
        Self {
            signature,
            entities: Arena::new(),
            links: Arena::new(),
            roots: Vec::new(),
            sites: Vec::new(),
            outer_names: BTreeMap::new(),
            inner_names: BTreeMap::new(),
        }
    }

    /// The signature being built against.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Appends a root; its index is the number of roots added before it.
    pub fn add_root(&mut self) -> EntityId {
        let id = self.entities.allocate(Entity {
            kind: EntityKind::Root {
                index: self.roots.len(),
            },
            parent: None,
            children: Vec::new(),
        });
        self.roots.push(id);
        id
    }

    fn check_place(&self, parent: EntityId) -> Result<(), BigraphError> {
        let entity = self
            .entities
            .get(parent)
            .ok_or(BigraphError::UnknownEntity(parent))?;
        match &entity.kind {
            EntityKind::Root { .. } => Ok(()),
            EntityKind::Site { .. } => Err(BigraphError::NotAPlace(parent)),
            EntityKind::Node(data) => match self.signature.control(&data.control) {
                Some(control) if control.kind.is_atomic() => Err(BigraphError::NotAPlace(parent)),
                _ => Ok(()),
            },
        }
    }

    fn attach(&mut self, parent: EntityId, kind: EntityKind) -> EntityId {
        let id = self.entities.allocate(Entity {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(p) = self.entities.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Adds a node with control `control` below `parent`, all ports open.
    pub fn add_node(&mut self, parent: EntityId, control: &str) -> Result<EntityId, BigraphError> {
        let arity = self
            .signature
            .control(control)
            .ok_or_else(|| BigraphError::UnknownControl(control.to_string()))?
            .arity;
        self.check_place(parent)?;
        Ok(self.attach(
            parent,
            EntityKind::Node(NodeData {
                control: control.to_string(),
                ports: vec![None; arity],
            }),
        ))
    }

    /// Adds a site below `parent` with the next free index.
    pub fn add_site(&mut self, parent: EntityId) -> Result<EntityId, BigraphError> {
        let index = self.sites.len();
        self.add_site_with_index(parent, index)
    }

    /// Adds a site below `parent` with an explicit index.
    ///
    /// Indices are validated as a whole by [`build`](Self::build).
    pub fn add_site_with_index(&mut self, parent: EntityId, index: usize) -> Result<EntityId, BigraphError> {
        self.check_place(parent)?;
        let id = self.attach(parent, EntityKind::Site { index });
        self.sites.push((index, id));
        Ok(id)
    }

    /// Declares an outer name and returns its link.
    pub fn add_outer_name(&mut self, name: &str) -> Result<LinkId, BigraphError> {
        if self.outer_names.contains_key(name) {
            return Err(BigraphError::DuplicateName(name.to_string()));
        }
        let id = self.links.allocate(Link::Outer(name.to_string()));
        self.outer_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Returns the link of an already declared outer name.
    pub fn outer_name(&self, name: &str) -> Option<LinkId> {
        self.outer_names.get(name).copied()
    }

    /// Adds a fresh edge.
    pub fn add_edge(&mut self) -> LinkId {
        self.links.allocate(Link::Edge)
    }

    /// Declares an inner name, optionally connected to `link`.
    pub fn add_inner_name(&mut self, name: &str, link: Option<LinkId>) -> Result<(), BigraphError> {
        if self.inner_names.contains_key(name) {
            return Err(BigraphError::DuplicateName(name.to_string()));
        }
        if let Some(l) = link {
            if !self.links.contains(l) {
                return Err(BigraphError::UnknownLink(l));
            }
        }
        self.inner_names.insert(name.to_string(), link);
        Ok(())
    }

    /// Connects port `port` of `node` to `link`.
    pub fn connect(&mut self, node: EntityId, port: usize, link: LinkId) -> Result<(), BigraphError> {
        if !self.links.contains(link) {
            return Err(BigraphError::UnknownLink(link));
        }
        let entity = self
            .entities
            .get_mut(node)
            .ok_or(BigraphError::UnknownEntity(node))?;
        let data = match &mut entity.kind {
            EntityKind::Node(data) => data,
            _ => return Err(BigraphError::UnknownEntity(node)),
        };
        let arity = data.ports.len();
        let slot = data
            .ports
            .get_mut(port)
            .ok_or(BigraphError::PortOutOfRange { node, port, arity })?;
        if slot.is_some() {
            return Err(BigraphError::PortAlreadyLinked { node, port });
        }
        *slot = Some(link);
        Ok(())
    }

    /// Finalizes the bigraph.
    ///
    /// Sites are ordered by index; indices must be exactly `0..n`.
    pub fn build(self) -> Result<Bigraph, BigraphError> {
        let BigraphBuilder {
            signature,
            mut entities,
            links,
            roots,
            mut sites,
            outer_names,
            inner_names,
        } = self;

        sites.sort();
        if sites.iter().enumerate().any(|(i, (index, _))| *index != i) {
            return Err(BigraphError::BadSiteIndices(sites.len()));
        }
        let sites: Vec<EntityId> = sites.into_iter().map(|(_, id)| id).collect();
        for (position, site) in sites.iter().enumerate() {
            if let Some(entity) = entities.get_mut(*site) {
                entity.kind = EntityKind::Site { index: position };
            }
        }

        let mut link_points: Vec<Vec<Point>> = vec![Vec::new(); links.len()];
        for (id, entity) in entities.iter() {
            if let EntityKind::Node(data) = &entity.kind {
                for (port, link) in data.ports.iter().enumerate() {
                    if let Some(l) = link {
                        link_points[l.as_u32() as usize].push(Point::Port { node: id, port });
                    }
                }
            }
        }
        for (name, link) in &inner_names {
            if let Some(l) = link {
                link_points[l.as_u32() as usize].push(Point::Inner(name.clone()));
            }
        }

        Ok(Bigraph {
            signature,
            entities,
            links,
            roots,
            sites,
            outer_names,
            inner_names,
            link_points,
        })
    }
}
