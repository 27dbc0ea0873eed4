//! Backtracking matcher.
//!
//! Redex roots are placed on host entities of the agent (roots, or non-atomic
//! nodes in an active context); redex nodes are then assigned to agent
//! children one at a time, checking controls and link constraints as they go.
//!
//! Link rules: a redex outer name may map to any agent link, several names
//! may share one; a redex edge maps to its own agent edge whose points are
//! exactly the images of the redex edge's points.

use super::{MatchDecomposition, MatchError, Matcher};
use crate::arena::{EntityId, LinkId};
use crate::builder::{BigraphBuilder, BigraphError};
use crate::core::{Bigraph, Link, Point};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Exhaustive backtracking matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveMatcher;

impl NaiveMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Matcher for NaiveMatcher {
    fn find_occurrences(&self, agent: &Bigraph, redex: &Bigraph) -> Result<Vec<MatchDecomposition>, MatchError> {
        if !agent.is_ground() {
            return Err(MatchError::AgentNotGround);
        }
        if agent.signature() != redex.signature() {
            return Err(MatchError::IncompatibleSignature);
        }
        check_redex(redex)?;

        let search = Search { agent, redex };
        let mut found = Vec::new();
        let goals: Vec<Goal> = (0..redex.roots().len()).rev().map(Goal::Host).collect();
        search.run(Partial::default(), goals, &mut found);
        log::trace!("naive matcher: {} occurrences", found.len());

        found
            .into_iter()
            .map(|partial| decompose(agent, redex, partial))
            .collect()
    }
}

fn check_redex(redex: &Bigraph) -> Result<(), MatchError> {
    if redex.roots().is_empty() {
        return Err(MatchError::UnsupportedRedex("redex has no roots".into()));
    }
    if !redex.inner_names().is_empty() {
        return Err(MatchError::UnsupportedRedex("redex has inner names".into()));
    }
    if !redex.idle_links().is_empty() {
        return Err(MatchError::UnsupportedRedex("redex has idle links".into()));
    }
    if !redex.sites_under_roots().is_empty() {
        return Err(MatchError::UnsupportedRedex("redex has a site under a root".into()));
    }
    if !redex.sites_are_not_siblings() {
        return Err(MatchError::UnsupportedRedex("redex has sibling sites".into()));
    }
    Ok(())
}

/// Pending obligations of the search.
#[derive(Debug, Clone, Copy)]
enum Goal {
    /// Choose a host for the redex root with this index. Roots are hosted
    /// in index order, so `hosts[i]` is the host of root `i`.
    Host(usize),
    /// Match the children of a redex entity inside an agent entity.
    Children { pattern: EntityId, target: EntityId },
    /// Map one redex node onto a free child of `parent`.
    Assign { pattern: EntityId, parent: EntityId },
}

/// A partial embedding.
#[derive(Debug, Clone, Default)]
struct Partial {
    nodes: BTreeMap<EntityId, EntityId>,
    used: HashSet<EntityId>,
    links: HashMap<LinkId, LinkId>,
    edge_images: HashSet<LinkId>,
    name_images: HashSet<LinkId>,
    hosts: Vec<EntityId>,
}

struct Search<'a> {
    agent: &'a Bigraph,
    redex: &'a Bigraph,
}

impl<'a> Search<'a> {
    fn run(&self, partial: Partial, mut goals: Vec<Goal>, found: &mut Vec<Partial>) {
        let goal = match goals.pop() {
            Some(goal) => goal,
            None => {
                if self.is_complete(&partial) {
                    found.push(partial);
                }
                return;
            }
        };
        match goal {
            Goal::Host(index) => {
                let root = match self.redex.roots().get(index) {
                    Some(root) => *root,
                    None => return,
                };
                for host in self.host_candidates() {
                    if partial.used.contains(&host) {
                        continue;
                    }
                    let mut next = partial.clone();
                    next.hosts.push(host);
                    let mut next_goals = goals.clone();
                    next_goals.push(Goal::Children {
                        pattern: root,
                        target: host,
                    });
                    self.run(next, next_goals, found);
                }
            }
            Goal::Children { pattern, target } => {
                let nodes: Vec<EntityId> = self
                    .redex
                    .children(pattern)
                    .iter()
                    .copied()
                    .filter(|c| self.redex.node(*c).is_some())
                    .collect();
                let has_site = self
                    .redex
                    .children(pattern)
                    .iter()
                    .any(|c| self.redex.site_index(*c).is_some());
                let exact = self.redex.node(pattern).is_some() && !has_site;
                if exact && self.agent.children(target).len() != nodes.len() {
                    return;
                }
                if nodes.len() > self.agent.children(target).len() {
                    return;
                }
                for node in nodes.into_iter().rev() {
                    goals.push(Goal::Assign {
                        pattern: node,
                        parent: target,
                    });
                }
                self.run(partial, goals, found);
            }
            Goal::Assign { pattern, parent } => {
                let control = match self.redex.node(pattern) {
                    Some(node) => &node.control,
                    None => return,
                };
                for &candidate in self.agent.children(parent) {
                    if partial.used.contains(&candidate) {
                        continue;
                    }
                    if self.agent.node(candidate).map(|n| &n.control) != Some(control) {
                        continue;
                    }
                    let mut next = partial.clone();
                    if !self.bind_ports(pattern, candidate, &mut next) {
                        continue;
                    }
                    next.used.insert(candidate);
                    next.nodes.insert(pattern, candidate);
                    let mut next_goals = goals.clone();
                    next_goals.push(Goal::Children {
                        pattern,
                        target: candidate,
                    });
                    self.run(next, next_goals, found);
                }
            }
        }
    }

    /// Agent roots and non-atomic nodes whose whole ancestry is active.
    fn host_candidates(&self) -> Vec<EntityId> {
        let mut hosts = self.agent.roots().to_vec();
        hosts.extend(self.agent.nodes().filter_map(|(id, _)| {
            let control = self.agent.control_of(id)?;
            (control.kind.is_active() && self.agent.is_active_at(id)).then_some(id)
        }));
        hosts
    }

    fn bind_ports(&self, pattern: EntityId, candidate: EntityId, partial: &mut Partial) -> bool {
        let (redex_ports, agent_ports) = match (self.redex.node(pattern), self.agent.node(candidate)) {
            (Some(r), Some(a)) => (&r.ports, &a.ports),
            _ => return false,
        };
        if redex_ports.len() != agent_ports.len() {
            return false;
        }
        for (redex_port, agent_port) in redex_ports.iter().zip(agent_ports) {
            let (rl, al) = match (redex_port, agent_port) {
                (None, None) => continue,
                (Some(rl), Some(al)) => (*rl, *al),
                _ => return false,
            };
            if let Some(bound) = partial.links.get(&rl) {
                if *bound != al {
                    return false;
                }
                continue;
            }
            match self.redex.link(rl) {
                Some(Link::Edge) => {
                    let agent_edge = matches!(self.agent.link(al), Some(Link::Edge));
                    if !agent_edge || partial.edge_images.contains(&al) || partial.name_images.contains(&al) {
                        return false;
                    }
                    partial.edge_images.insert(al);
                }
                Some(Link::Outer(_)) => {
                    if partial.edge_images.contains(&al) {
                        return false;
                    }
                    partial.name_images.insert(al);
                }
                None => return false,
            }
            partial.links.insert(rl, al);
        }
        true
    }

    fn is_complete(&self, partial: &Partial) -> bool {
        let edges_closed = partial.links.iter().all(|(rl, al)| {
            !matches!(self.redex.link(*rl), Some(Link::Edge))
                || self.agent.points_of(*al).len() == self.redex.points_of(*rl).len()
        });
        let hosts_free = partial.hosts.iter().all(|host| {
            let mut current = Some(*host);
            while let Some(id) = current {
                if partial.used.contains(&id) {
                    return false;
                }
                current = self.agent.parent(id);
            }
            true
        });
        edges_closed && hosts_free
    }
}

/// How an agent link appears in an extracted bigraph.
enum LinkTarget {
    Edge,
    Name(String),
}

/// Copies agent subtrees into a fresh builder, skipping matched nodes and
/// opening a site under every host.
struct Copier<'a> {
    agent: &'a Bigraph,
    skip: &'a HashSet<EntityId>,
    hosts: &'a [EntityId],
    builder: BigraphBuilder,
    links: HashMap<LinkId, LinkId>,
}

impl<'a> Copier<'a> {
    fn new(agent: &'a Bigraph, skip: &'a HashSet<EntityId>, hosts: &'a [EntityId]) -> Self {
        Self {
            agent,
            skip,
            hosts,
            builder: BigraphBuilder::with_signature(Arc::clone(agent.signature_arc())),
            links: HashMap::new(),
        }
    }

    fn link(&mut self, agent_link: LinkId, target: LinkTarget) -> Result<LinkId, BigraphError> {
        if let Some(link) = self.links.get(&agent_link) {
            return Ok(*link);
        }
        let link = match target {
            LinkTarget::Edge => self.builder.add_edge(),
            LinkTarget::Name(name) => match self.builder.outer_name(&name) {
                Some(link) => link,
                None => self.builder.add_outer_name(&name)?,
            },
        };
        self.links.insert(agent_link, link);
        Ok(link)
    }

    fn copy_children(
        &mut self,
        src: EntityId,
        dst: EntityId,
        resolve: &dyn Fn(LinkId) -> LinkTarget,
    ) -> Result<(), BigraphError> {
        let agent = self.agent;
        for &child in agent.children(src) {
            if !self.skip.contains(&child) {
                self.copy_entity(child, dst, resolve)?;
            }
        }
        for (index, host) in self.hosts.iter().enumerate() {
            if *host == src {
                self.builder.add_site_with_index(dst, index)?;
            }
        }
        Ok(())
    }

    fn copy_entity(
        &mut self,
        src: EntityId,
        dst: EntityId,
        resolve: &dyn Fn(LinkId) -> LinkTarget,
    ) -> Result<(), BigraphError> {
        let agent = self.agent;
        let node = match agent.node(src) {
            Some(node) => node,
            None => return Ok(()),
        };
        let copy = self.builder.add_node(dst, &node.control)?;
        for (port, link) in node.ports.iter().enumerate() {
            if let Some(link) = link {
                let target = self.link(*link, resolve(*link))?;
                self.builder.connect(copy, port, target)?;
            }
        }
        self.copy_children(src, copy, resolve)
    }
}

fn decompose(agent: &Bigraph, redex: &Bigraph, partial: Partial) -> Result<MatchDecomposition, MatchError> {
    let no_skip = HashSet::new();

    // Names under which parameters see outside links: the redex outer name
    // the link is bound to, else a fresh `_p<n>`.
    let mut exposed: BTreeMap<LinkId, String> = BTreeMap::new();
    for (name, rl) in redex.outer_names() {
        if let Some(al) = partial.links.get(rl) {
            exposed.entry(*al).or_insert_with(|| name.clone());
        }
    }
    let mut fresh = 0usize;
    let mut fresh_name = |exposed: &BTreeMap<LinkId, String>| loop {
        let candidate = format!("_p{}", fresh);
        fresh += 1;
        if !redex.outer_names().contains_key(&candidate) && !exposed.values().any(|v| *v == candidate) {
            return candidate;
        }
    };

    let mut parameters = Vec::with_capacity(redex.sites().len());
    for &site in redex.sites() {
        let image = redex
            .parent(site)
            .and_then(|p| partial.nodes.get(&p).copied())
            .ok_or_else(|| MatchError::UnsupportedRedex("site without a matched parent".into()))?;
        let held: Vec<EntityId> = agent
            .children(image)
            .iter()
            .copied()
            .filter(|c| !partial.used.contains(c))
            .collect();
        let mut region: HashSet<EntityId> = HashSet::new();
        for &c in &held {
            region.insert(c);
            region.extend(agent.descendants(c));
        }
        let is_local = |link: LinkId| {
            matches!(agent.link(link), Some(Link::Edge))
                && agent.points_of(link).iter().all(|p| match p {
                    Point::Port { node, .. } => region.contains(node),
                    Point::Inner(_) => false,
                })
        };
        for &id in &region {
            if let Some(node) = agent.node(id) {
                for link in node.ports.iter().flatten() {
                    if !is_local(*link) && !exposed.contains_key(link) {
                        let name = fresh_name(&exposed);
                        exposed.insert(*link, name);
                    }
                }
            }
        }

        let resolve = |link: LinkId| {
            if is_local(link) {
                LinkTarget::Edge
            } else {
                LinkTarget::Name(exposed.get(&link).cloned().unwrap_or_default())
            }
        };
        let mut copier = Copier::new(agent, &no_skip, &[]);
        let root = copier.builder.add_root();
        for &c in &held {
            copier.copy_entity(c, root, &resolve)?;
        }
        parameters.push(copier.builder.build()?);
    }

    // Context inner names: every redex outer name plus every parameter name.
    let mut inner: BTreeMap<String, LinkId> = BTreeMap::new();
    for (name, rl) in redex.outer_names() {
        if let Some(al) = partial.links.get(rl) {
            inner.insert(name.clone(), *al);
        }
    }
    for parameter in &parameters {
        for name in parameter.outer_names().keys() {
            if let Some((al, _)) = exposed.iter().find(|(_, n)| *n == name) {
                inner.insert(name.clone(), *al);
            }
        }
    }

    let resolve = |link: LinkId| match agent.link(link) {
        Some(Link::Outer(name)) => LinkTarget::Name(name.clone()),
        _ => LinkTarget::Edge,
    };
    let mut copier = Copier::new(agent, &partial.used, &partial.hosts);
    for name in agent.outer_names().keys() {
        copier.builder.add_outer_name(name)?;
    }
    for &root in agent.roots() {
        let copy = copier.builder.add_root();
        copier.copy_children(root, copy, &resolve)?;
    }
    for (name, al) in &inner {
        let link = copier.link(*al, resolve(*al))?;
        copier.builder.add_inner_name(name, Some(link))?;
    }
    let context = copier.builder.build()?;

    Ok(MatchDecomposition {
        context,
        redex_image: redex.clone(),
        parameters,
        node_mapping: partial.nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalForm;
    use crate::rule::InstantiationMap;
    use crate::signature::{Control, Signature};
    use crate::testing::{fire_rule, fixture_context, petri_agent};

    /// The firing redex occurs once per token in the left place.
    #[test]
    fn finds_fire_occurrences() {
        let ctx = fixture_context();
        let rule = fire_rule(&ctx);
        let matcher = NaiveMatcher::new();
        let found = matcher.find_occurrences(&petri_agent(&ctx, 2, 0), rule.redex()).unwrap();
        assert_eq!(found.len(), 2);
        for m in &found {
            assert_eq!(m.node_mapping.len(), 4);
            assert_eq!(m.parameters.len(), 2);
            assert_eq!(m.parameters[0].node_count(), 1);
            assert_eq!(m.parameters[1].node_count(), 0);
            assert_eq!(m.context.sites().len(), 1);
            assert_eq!(m.context.node_count(), 0);
            let names: Vec<&str> = m.context.inner_names().keys().map(String::as_str).collect();
            assert_eq!(names, vec!["l", "r"]);
        }
        assert!(matcher
            .find_occurrences(&petri_agent(&ctx, 0, 2), rule.redex())
            .unwrap()
            .is_empty());
    }

    /// Each redex root is hosted separately and keeps its own pattern.
    #[test]
    fn multi_root_redex() {
        let ctx = fixture_context();
        let mut b = ctx.builder();
        let token_root = b.add_root();
        let token = b.add_node(token_root, "Token").unwrap();
        let transition_root = b.add_root();
        let transition = b.add_node(transition_root, "Transition").unwrap();
        let a = b.add_outer_name("a").unwrap();
        let c = b.add_outer_name("c").unwrap();
        b.connect(transition, 0, a).unwrap();
        b.connect(transition, 1, c).unwrap();
        let redex = b.build().unwrap();

        let agent = petri_agent(&ctx, 1, 0);
        let found = NaiveMatcher.find_occurrences(&agent, &redex).unwrap();
        assert_eq!(found.len(), 1);
        let mapping = &found[0].node_mapping;
        assert_eq!(agent.node(mapping[&token]).map(|n| n.control.as_str()), Some("Token"));
        assert_eq!(agent.node(mapping[&transition]).map(|n| n.control.as_str()), Some("Transition"));
        assert_eq!(found[0].context.sites().len(), 2);
    }

    /// Recomposing an occurrence with the redex itself restores the agent.
    #[test]
    fn decomposition_recomposes() {
        let ctx = fixture_context();
        let rule = fire_rule(&ctx);
        let agent = petri_agent(&ctx, 2, 1);
        let found = NaiveMatcher.find_occurrences(&agent, rule.redex()).unwrap();
        assert!(!found.is_empty());
        let canon = CanonicalForm::default();
        for m in &found {
            let back = m.react(&m.redex_image, &InstantiationMap::identity(2)).unwrap();
            assert_eq!(canon.encode(&back).unwrap(), canon.encode(&agent).unwrap());
        }
    }

    /// Non-ground agents are rejected.
    #[test]
    fn agent_must_be_ground() {
        let ctx = fixture_context();
        let rule = fire_rule(&ctx);
        assert_eq!(
            NaiveMatcher.find_occurrences(rule.redex(), rule.redex()).unwrap_err(),
            MatchError::AgentNotGround
        );
    }

    /// Passive controls hide their contents from matching.
    #[test]
    fn passive_context_blocks_matches() {
        let count = |box_control: Control| {
            let sig = Signature::new([box_control, Control::atomic("Ball", 0)]).unwrap();
            let mut b = BigraphBuilder::new(sig.clone());
            let r = b.add_root();
            let boxed = b.add_node(r, "Box").unwrap();
            b.add_node(boxed, "Ball").unwrap();
            let agent = b.build().unwrap();

            let mut b = BigraphBuilder::new(sig);
            let r = b.add_root();
            b.add_node(r, "Ball").unwrap();
            let redex = b.build().unwrap();
            NaiveMatcher.find_occurrences(&agent, &redex).unwrap().len()
        };
        assert_eq!(count(Control::active("Box", 0)), 1);
        assert_eq!(count(Control::passive("Box", 0)), 0);
    }

    /// Redex edges only match agent edges with no extra points.
    #[test]
    fn edges_must_close() {
        let ctx = fixture_context();
        let redex = {
            let mut b = ctx.builder();
            let r = b.add_root();
            let e = b.add_edge();
            let y = b.add_outer_name("y").unwrap();
            let p = b.add_node(r, "Place").unwrap();
            b.connect(p, 0, e).unwrap();
            b.add_site(p).unwrap();
            let t = b.add_node(r, "Transition").unwrap();
            b.connect(t, 0, e).unwrap();
            b.connect(t, 1, y).unwrap();
            b.build().unwrap()
        };
        let found = NaiveMatcher.find_occurrences(&petri_agent(&ctx, 1, 0), &redex).unwrap();
        assert_eq!(found.len(), 1);
        // The parameter keeps the token; `y` reaches the right place.
        assert_eq!(found[0].parameters[0].node_count(), 1);
        assert_eq!(found[0].context.node_count(), 1);

        // A third point on the left edge defeats the match.
        let mut b = ctx.builder();
        let r = b.add_root();
        let e1 = b.add_edge();
        let e2 = b.add_edge();
        let a = b.add_node(r, "Place").unwrap();
        b.connect(a, 0, e1).unwrap();
        let t = b.add_node(r, "Transition").unwrap();
        b.connect(t, 0, e1).unwrap();
        b.connect(t, 1, e2).unwrap();
        let extra = b.add_node(r, "Transition").unwrap();
        b.connect(extra, 0, e1).unwrap();
        b.connect(extra, 1, e2).unwrap();
        let crowded = b.build().unwrap();
        assert!(NaiveMatcher.find_occurrences(&crowded, &redex).unwrap().is_empty());
    }

    /// Parameter links that leave the parameter are named for the context.
    #[test]
    fn parameter_names_reach_context() {
        let ctx = fixture_context();
        // Place.(Place[e]) | Place[e]: the inner place sits in the parameter
        // of a `Place.($0)` redex and shares an edge with the outer sibling.
        let mut b = ctx.builder();
        let r = b.add_root();
        let e = b.add_edge();
        let outer = b.add_node(r, "Place").unwrap();
        let inner = b.add_node(outer, "Place").unwrap();
        b.connect(inner, 0, e).unwrap();
        let x = b.add_outer_name("x").unwrap();
        b.connect(outer, 0, x).unwrap();
        let sibling = b.add_node(r, "Place").unwrap();
        b.connect(sibling, 0, e).unwrap();
        let agent = b.build().unwrap();

        let mut b = ctx.builder();
        let r = b.add_root();
        let z = b.add_outer_name("z").unwrap();
        let p = b.add_node(r, "Place").unwrap();
        b.connect(p, 0, z).unwrap();
        b.add_site(p).unwrap();
        let redex = b.build().unwrap();

        let found = NaiveMatcher.find_occurrences(&agent, &redex).unwrap();
        let with_param = found
            .iter()
            .find(|m| m.parameters[0].node_count() == 1)
            .expect("outer place matches");
        assert_eq!(with_param.parameters[0].outer_names().len(), 1);
        assert!(with_param.context.inner_names().contains_key("_p0"));
        assert!(with_param.context.inner_names().contains_key("z"));
        let back = with_param
            .react(&with_param.redex_image, &InstantiationMap::identity(1))
            .unwrap();
        let canon = CanonicalForm::default();
        assert_eq!(canon.encode(&back).unwrap(), canon.encode(&agent).unwrap());
    }
}
