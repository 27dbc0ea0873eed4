//! Arena storage for bigraph entities and links.
//!
//! Provides dense, totally ordered identifiers (`EntityId`, `LinkId`) and an
//! append-only `Arena` indexed by them. Bigraphs are immutable values, so the
//! arena never frees slots: an identifier stays valid for the lifetime of the
//! bigraph that issued it.
//!
//! # Determinism
//! - Identifier ordering is by the inner `u32`.
//! - Iteration order is allocation order (index `0..len`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Conversion between a typed identifier and a raw slot index.
pub trait ArenaIndex: Copy + Ord {
    /// Builds an identifier from a slot index.
    fn from_index(index: usize) -> Self;

    /// Returns the slot index.
    fn index(self) -> usize;
}

/// Identifier of a place-graph entity (root, node or site).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u32`.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl ArenaIndex for EntityId {
    #[inline]
    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a link (edge or outer name).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(u32);

impl LinkId {
    /// Creates a new `LinkId` from a raw `u32`.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl ArenaIndex for LinkId {
    #[inline]
    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// Contiguous, append-only storage addressed by a typed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arena<I, T> {
    slots: Vec<T>,
    _index: PhantomData<I>,
}

impl<I: ArenaIndex, T> Arena<I, T> {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _index: PhantomData,
        }
    }

    /// Creates an empty arena with room for `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _index: PhantomData,
        }
    }

    /// Appends `data` and returns its identifier.
    pub fn allocate(&mut self, data: T) -> I {
        let id = I::from_index(self.slots.len());
        self.slots.push(data);
        id
    }

    /// Returns a reference to the data stored at `id`, if present.
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index())
    }

    /// Returns a mutable reference to the data stored at `id`, if present.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index())
    }

    /// Returns `true` if `id` addresses a slot of this arena.
    pub fn contains(&self, id: I) -> bool {
        id.index() < self.slots.len()
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing was allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over all slots in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, data)| (I::from_index(idx), data))
    }

    /// Iterates over all identifiers in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = I> {
        (0..self.slots.len()).map(I::from_index)
    }
}

impl<I: ArenaIndex, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaIndex, T> std::ops::Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        &self.slots[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_basic() {
        let mut arena: Arena<EntityId, &'static str> = Arena::new();
        assert!(arena.is_empty());

        let id1 = arena.allocate("root");
        assert_eq!(id1.as_u32(), 0);
        let id2 = arena.allocate("node");
        assert_eq!(id2.as_u32(), 1);

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(id1), Some(&"root"));
        assert_eq!(arena[id2], "node");
        assert!(!arena.contains(EntityId::new(2)));
        assert_eq!(arena.get(EntityId::new(7)), None);
    }

    #[test]
    fn deterministic_iteration() {
        let mut arena: Arena<LinkId, i32> = Arena::new();
        for i in 0..4 {
            arena.allocate(i * 10);
        }
        if let Some(slot) = arena.get_mut(LinkId::new(2)) {
            *slot = 99;
        }
        let collected: Vec<_> = arena.iter().map(|(id, &val)| (id.as_u32(), val)).collect();
        assert_eq!(collected, vec![(0, 0), (1, 10), (2, 99), (3, 30)]);
        assert_eq!(arena.ids().count(), 4);
    }

    #[test]
    fn display_prefixes() {
        assert_eq!(EntityId::new(3).to_string(), "v3");
        assert_eq!(LinkId::new(5).to_string(), "l5");
    }
}
