//! Packed per-type component storage.
//!
//! A [`ComponentStore`] keeps every instance of one component type in a
//! dense, gap-free `Vec`, with a parallel owner column and a sparse map from
//! entity index to dense slot. Adding appends; removing swap-removes, moving
//! the last instance into the freed slot and patching its sparse entry.
//!
//! Removal therefore relocates one unrelated instance. Any borrow of an
//! instance ends before the next mutation of the store, so the world hands
//! out fresh borrows on every lookup and query instead of stable pointers.

use std::any::Any;

use crate::component::{short_type_name, Component};
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Dense array of `T` instances addressed by entity id.
#[derive(Debug)]
pub struct ComponentStore<T> {
    dense: Vec<T>,
    /// `owners[slot]` is the entity owning `dense[slot]`.
    owners: Vec<EntityId>,
    /// Indexed by entity index. Only meaningful when `owners` confirms it.
    sparse: Vec<usize>,
}

impl<T: Component> ComponentStore<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            sparse: Vec::new(),
        }
    }

    #[inline]
    fn slot(&self, entity: EntityId) -> Option<usize> {
        let slot = *self.sparse.get(entity.index())?;
        (self.owners.get(slot) == Some(&entity)).then_some(slot)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    /// Store `value` for `entity`, overwriting any instance it already owns.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        if let Some(slot) = self.slot(entity) {
            self.dense[slot] = value;
            return &mut self.dense[slot];
        }
        let index = entity.index();
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, 0);
        }
        let slot = self.dense.len();
        self.sparse[index] = slot;
        self.dense.push(value);
        self.owners.push(entity);
        &mut self.dense[slot]
    }

    /// Store a fresh `T::from_entity(entity)`.
    pub fn add(&mut self, entity: EntityId) -> &mut T {
        self.insert(entity, T::from_entity(entity))
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slot(entity).map(|slot| &self.dense[slot])
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slot(entity).map(|slot| &mut self.dense[slot])
    }

    /// Swap-remove `entity`'s instance and hand it back.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.slot(entity)?;
        let removed = self.dense.swap_remove(slot);
        self.owners.swap_remove(slot);
        if let Some(&moved) = self.owners.get(slot) {
            self.sparse[moved.index()] = slot;
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Owners in dense order.
    pub fn entities(&self) -> &[EntityId] {
        &self.owners
    }

    /// Instances in dense order.
    pub fn as_slice(&self) -> &[T] {
        &self.dense
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.dense
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.owners.iter().copied().zip(self.dense.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.owners.iter().copied().zip(self.dense.iter_mut())
    }

    /// Borrow the index columns and the instances disjointly.
    pub(crate) fn split_mut(&mut self) -> (&[usize], &[EntityId], &mut [T]) {
        (&self.sparse, &self.owners, &mut self.dense)
    }

    /// Borrow `source` shared and `target` exclusively. Both must be present
    /// and distinct.
    fn pair_mut(&mut self, source: EntityId, target: EntityId) -> Option<(&T, &mut T)> {
        let (s, t) = (self.slot(source)?, self.slot(target)?);
        if s == t {
            return None;
        }
        if s < t {
            let (head, tail) = self.dense.split_at_mut(t);
            Some((&head[s], &mut tail[0]))
        } else {
            let (head, tail) = self.dense.split_at_mut(s);
            Some((&tail[0], &mut head[t]))
        }
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ErasedStore -- what the world needs without knowing T
// ---------------------------------------------------------------------------

pub(crate) trait ErasedStore: 'static {
    /// Append a fresh `T::from_entity(entity)`.
    fn add_default(&mut self, entity: EntityId);

    fn remove_entity(&mut self, entity: EntityId) -> bool;

    fn get_dyn(&self, entity: EntityId) -> Option<&dyn Component>;

    /// Copy `source`'s instance onto `target_entity` in another world,
    /// adding the component there first if needed.
    fn copy_into(
        &self,
        source: EntityId,
        target: &mut World,
        target_entity: EntityId,
    ) -> Result<(), EcsError>;

    /// Copy `source`'s instance onto `target`'s, both in this store.
    fn duplicate_within(&mut self, source: EntityId, target: EntityId) -> Result<(), EcsError>;

    fn store_any(&self) -> &dyn Any;

    fn store_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn add_default(&mut self, entity: EntityId) {
        self.add(entity);
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove(entity).is_some()
    }

    fn get_dyn(&self, entity: EntityId) -> Option<&dyn Component> {
        self.get(entity).map(|component| component as &dyn Component)
    }

    fn copy_into(
        &self,
        source: EntityId,
        target: &mut World,
        target_entity: EntityId,
    ) -> Result<(), EcsError> {
        let value = self.get(source).ok_or_else(|| EcsError::MissingComponent {
            entity: source,
            component: short_type_name::<T>(),
        })?;
        if !target.has_component::<T>(target_entity) {
            target.add_component::<T>(target_entity)?;
        }
        let slot = target
            .get_component_mut::<T>(target_entity)
            .ok_or_else(|| EcsError::MissingComponent {
                entity: target_entity,
                component: short_type_name::<T>(),
            })?;
        slot.copy_from(value)
    }

    fn duplicate_within(&mut self, source: EntityId, target: EntityId) -> Result<(), EcsError> {
        let (value, slot) = self
            .pair_mut(source, target)
            .ok_or_else(|| EcsError::MissingComponent {
                entity: target,
                component: short_type_name::<T>(),
            })?;
        slot.copy_from(value)
    }

    fn store_any(&self) -> &dyn Any {
        self
    }

    fn store_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Mass(u32);
    crate::impl_component!(Mass);

    fn e(i: u32) -> EntityId {
        EntityId::new(i)
    }

    fn assert_dense(store: &ComponentStore<Mass>) {
        assert_eq!(store.dense.len(), store.owners.len());
        for (slot, owner) in store.owners.iter().enumerate() {
            assert_eq!(store.sparse[owner.index()], slot);
        }
    }

    #[test]
    fn add_get_contains() {
        let mut store = ComponentStore::<Mass>::new();
        store.add(e(3)).0 = 7;
        assert!(store.contains(e(3)));
        assert!(!store.contains(e(0)));
        assert!(!store.contains(e(100)));
        assert_eq!(store.get(e(3)), Some(&Mass(7)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_overwrites_existing() {
        let mut store = ComponentStore::<Mass>::new();
        store.insert(e(1), Mass(1));
        store.insert(e(1), Mass(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(e(1)), Some(&Mass(2)));
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut store = ComponentStore::<Mass>::new();
        for i in 0..4 {
            store.insert(e(i), Mass(i * 10));
        }
        assert_eq!(store.remove(e(1)), Some(Mass(10)));
        assert_eq!(store.entities(), &[e(0), e(3), e(2)]);
        assert_eq!(store.get(e(3)), Some(&Mass(30)));
        assert_eq!(store.get(e(1)), None);
        assert_dense(&store);
    }

    #[test]
    fn remove_last_and_missing() {
        let mut store = ComponentStore::<Mass>::new();
        store.insert(e(0), Mass(0));
        store.insert(e(1), Mass(1));
        assert_eq!(store.remove(e(1)), Some(Mass(1)));
        assert_eq!(store.remove(e(1)), None);
        assert_eq!(store.remove(e(9)), None);
        assert_eq!(store.as_slice(), &[Mass(0)]);
        assert_dense(&store);
    }

    #[test]
    fn stale_sparse_entry_does_not_alias() {
        let mut store = ComponentStore::<Mass>::new();
        store.insert(e(5), Mass(5));
        store.remove(e(5));
        store.insert(e(2), Mass(2));
        // sparse[5] still says 0, but slot 0 belongs to e(2).
        assert!(!store.contains(e(5)));
        assert_eq!(store.get(e(2)), Some(&Mass(2)));
    }

    #[test]
    fn duplicate_within_copies_value() {
        let mut store = ComponentStore::<Mass>::new();
        store.insert(e(0), Mass(42));
        store.insert(e(1), Mass(0));
        store.duplicate_within(e(0), e(1)).unwrap();
        assert_eq!(store.get(e(1)), Some(&Mass(42)));
        store.insert(e(1), Mass(9));
        store.duplicate_within(e(1), e(0)).unwrap();
        assert_eq!(store.get(e(0)), Some(&Mass(9)));
        assert!(store.duplicate_within(e(0), e(7)).is_err());
    }

    #[test]
    fn iter_mut_visits_every_instance() {
        let mut store = ComponentStore::<Mass>::new();
        for i in 0..5 {
            store.insert(e(i * 2), Mass(i));
        }
        for (_, mass) in store.iter_mut() {
            mass.0 += 100;
        }
        let total: u32 = store.iter().map(|(_, m)| m.0).sum();
        assert_eq!(total, 500 + 10);
    }
}
