//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a plain slot index into one world's entity table. Slots
//! of destroyed entities go onto a LIFO free-list and are handed out again
//! before the high-water mark advances, so an id is only meaningful together
//! with the [`World`](crate::world::World) that issued it and only while that
//! entity is alive.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signature::Signature;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Identifier of an entity within a single world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Construct an `EntityId` from a raw slot index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The slot index, for addressing per-entity arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw `u32` representation.
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Owns the entity table: one [`Signature`] per possible slot, the free-list
/// and the high-water mark.
///
/// The table is allocated up front for the configured capacity, so slot
/// lookups never reallocate.
#[derive(Debug)]
pub struct EntityAllocator {
    /// One record per slot, `len() == capacity`.
    signatures: Vec<Signature>,
    /// Recyclable slots (LIFO).
    free_indices: Vec<u32>,
    /// Slots `0..high_water` have been handed out at least once.
    high_water: u32,
    alive: usize,
}

impl EntityAllocator {
    /// Create an allocator able to hold `capacity` simultaneously alive entities.
    pub fn new(capacity: u32) -> Self {
        Self {
            signatures: vec![Signature::EMPTY; capacity as usize],
            free_indices: Vec::new(),
            high_water: 0,
            alive: 0,
        }
    }

    /// Allocate an id, preferring recycled slots.
    ///
    /// The returned slot is alive and active with no components. Returns
    /// `None` when every slot is in use.
    pub fn allocate(&mut self) -> Option<EntityId> {
        let index = match self.free_indices.pop() {
            Some(index) => index,
            None if (self.high_water as usize) < self.signatures.len() => {
                let index = self.high_water;
                self.high_water += 1;
                index
            }
            None => return None,
        };
        self.signatures[index as usize] = Signature::spawned();
        self.alive += 1;
        Some(EntityId(index))
    }

    /// Release an id back to the free-list, wiping its record.
    ///
    /// Returns `false` if the entity was not alive.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        self.signatures[id.index()] = Signature::EMPTY;
        self.free_indices.push(id.0);
        self.alive -= 1;
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.signature(id).is_some_and(Signature::is_alive)
    }

    /// The record for `id`'s slot, `None` if the id is outside the table.
    pub fn signature(&self, id: EntityId) -> Option<Signature> {
        self.signatures.get(id.index()).copied()
    }

    pub(crate) fn signature_mut(&mut self, id: EntityId) -> Option<&mut Signature> {
        self.signatures.get_mut(id.index())
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// One past the highest slot ever handed out.
    pub fn high_water_mark(&self) -> u32 {
        self.high_water
    }

    pub fn capacity(&self) -> u32 {
        self.signatures.len() as u32
    }

    /// Alive ids in ascending order.
    pub fn iter_alive(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.matching(Signature::required(&[], false))
    }

    /// Ids in `0..high_water` whose record matches `required`.
    pub fn matching(&self, required: Signature) -> impl Iterator<Item = EntityId> + '_ {
        self.signatures[..self.high_water as usize]
            .iter()
            .enumerate()
            .filter(move |(_, signature)| signature.matches(required))
            .map(|(index, _)| EntityId(index as u32))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
