//! Multi-type filtering over a world's entities.
//!
//! A query is a tuple of one to four [`QueryItem`]s, each `&T` or `&mut T`.
//! Filtering builds one required [`Signature`] (alive, every item's presence
//! bit, and optionally active), scans the entity table up to the high-water
//! mark with a single `matches` per slot, and materializes the matching
//! entities together with borrows of their components.
//!
//! ## Borrowing
//!
//! [`World::filter_entities`] takes `&mut World` and hands every store out of
//! a slot list at most once, so distinct component types are borrowed
//! disjointly. A `&mut T` store is further split into one `&mut T` per dense
//! slot, each handed out to the single entity owning it. Asking for the same
//! component type twice in one mutable query panics.
//!
//! [`World::filter_entities_ref`] takes `&World` and only accepts read-only
//! queries.

use crate::component::{short_type_name, Component, ComponentRegistry, ComponentTypeId};
use crate::entity::EntityId;
use crate::signature::Signature;
use crate::store::{ComponentStore, ErasedStore};
use crate::world::World;

// ---------------------------------------------------------------------------
// Store access
// ---------------------------------------------------------------------------

enum StoreSlot<'w> {
    /// Registered but never instantiated.
    Missing,
    Ready(&'w mut Box<dyn ErasedStore>),
    /// Already handed to an earlier item of the same query.
    Taken,
}

/// Exclusive access to every store of a world, each takeable once.
pub struct StoreSlots<'w> {
    registry: &'w ComponentRegistry,
    slots: Vec<StoreSlot<'w>>,
}

impl<'w> StoreSlots<'w> {
    pub(crate) fn new(
        registry: &'w ComponentRegistry,
        stores: &'w mut [Option<Box<dyn ErasedStore>>],
    ) -> Self {
        let slots = stores
            .iter_mut()
            .map(|store| match store {
                Some(store) => StoreSlot::Ready(store),
                None => StoreSlot::Missing,
            })
            .collect();
        Self { registry, slots }
    }

    /// Take `T`'s store. `None` if `T` is unregistered or has no store yet.
    ///
    /// # Panics
    ///
    /// If `T`'s store was already taken by this query.
    pub fn take<T: Component>(&mut self) -> Option<&'w mut ComponentStore<T>> {
        let type_id = self.registry.lookup::<T>()?;
        let slot = self.slots.get_mut(type_id.index())?;
        match std::mem::replace(slot, StoreSlot::Taken) {
            StoreSlot::Ready(store) => {
                let store: &'w mut dyn ErasedStore = &mut **store;
                store.store_any_mut().downcast_mut::<ComponentStore<T>>()
            }
            StoreSlot::Missing => {
                *slot = StoreSlot::Missing;
                None
            }
            StoreSlot::Taken => panic!(
                "query accesses component {} more than once",
                short_type_name::<T>()
            ),
        }
    }
}

/// Shared access to every store of a world.
pub struct SharedStores<'w> {
    registry: &'w ComponentRegistry,
    stores: &'w [Option<Box<dyn ErasedStore>>],
}

impl<'w> SharedStores<'w> {
    pub(crate) fn new(
        registry: &'w ComponentRegistry,
        stores: &'w [Option<Box<dyn ErasedStore>>],
    ) -> Self {
        Self { registry, stores }
    }

    pub fn get<T: Component>(&self) -> Option<&'w ComponentStore<T>> {
        let type_id = self.registry.lookup::<T>()?;
        let store: &'w dyn ErasedStore = &**self.stores.get(type_id.index())?.as_ref()?;
        store.store_any().downcast_ref::<ComponentStore<T>>()
    }
}

// ---------------------------------------------------------------------------
// QueryItem trait -- describes one element in a query tuple
// ---------------------------------------------------------------------------

/// A single element of a query: `&T` (read) or `&mut T` (write).
pub trait QueryItem {
    /// The component type this item reads or writes.
    type Component: Component;
    /// Per-query state, created once before the scan.
    type Fetch<'w>;
    /// The output type yielded per entity.
    type Item<'w>;

    fn fetch_init<'w>(stores: &mut StoreSlots<'w>) -> Option<Self::Fetch<'w>>;

    /// Fetch the item for one matching entity.
    fn fetch<'w>(fetch: &mut Self::Fetch<'w>, entity: EntityId) -> Option<Self::Item<'w>>;
}

/// A [`QueryItem`] that can be fetched through a shared world borrow.
pub trait ReadOnlyQueryItem: QueryItem {
    fn fetch_init_shared<'w>(stores: &SharedStores<'w>) -> Option<Self::Fetch<'w>>;
}

impl<T: Component> QueryItem for &T {
    type Component = T;
    type Fetch<'w> = &'w ComponentStore<T>;
    type Item<'w> = &'w T;

    fn fetch_init<'w>(stores: &mut StoreSlots<'w>) -> Option<Self::Fetch<'w>> {
        stores.take::<T>().map(|store| &*store)
    }

    fn fetch<'w>(fetch: &mut Self::Fetch<'w>, entity: EntityId) -> Option<Self::Item<'w>> {
        let store: &'w ComponentStore<T> = *fetch;
        store.get(entity)
    }
}

impl<T: Component> ReadOnlyQueryItem for &T {
    fn fetch_init_shared<'w>(stores: &SharedStores<'w>) -> Option<Self::Fetch<'w>> {
        stores.get::<T>()
    }
}

/// Fetch state of a `&mut T` item: the store's index columns and one
/// takeable borrow per dense slot.
pub struct MutFetch<'w, T> {
    sparse: &'w [usize],
    owners: &'w [EntityId],
    slots: Vec<Option<&'w mut T>>,
}

impl<T: Component> QueryItem for &mut T {
    type Component = T;
    type Fetch<'w> = MutFetch<'w, T>;
    type Item<'w> = &'w mut T;

    fn fetch_init<'w>(stores: &mut StoreSlots<'w>) -> Option<Self::Fetch<'w>> {
        let (sparse, owners, dense) = stores.take::<T>()?.split_mut();
        Some(MutFetch {
            sparse,
            owners,
            slots: dense.iter_mut().map(Some).collect(),
        })
    }

    fn fetch<'w>(fetch: &mut Self::Fetch<'w>, entity: EntityId) -> Option<Self::Item<'w>> {
        let slot = *fetch.sparse.get(entity.index())?;
        if fetch.owners.get(slot) != Some(&entity) {
            return None;
        }
        fetch.slots.get_mut(slot)?.take()
    }
}

// ---------------------------------------------------------------------------
// Query trait -- describes a tuple of QueryItems
// ---------------------------------------------------------------------------

/// A tuple of query items: `(&A,)`, `(&mut A, &B)`, and so on up to four.
pub trait Query {
    type Fetch<'w>;
    /// The per-entity output type.
    type Item<'w>;

    /// Ids of every component type in the query, `None` if any is unregistered.
    fn component_ids(registry: &ComponentRegistry) -> Option<Vec<ComponentTypeId>>;

    fn fetch_init<'w>(stores: &mut StoreSlots<'w>) -> Option<Self::Fetch<'w>>;

    fn fetch<'w>(fetch: &mut Self::Fetch<'w>, entity: EntityId) -> Option<Self::Item<'w>>;
}

/// A [`Query`] made only of shared borrows.
pub trait ReadOnlyQuery: Query {
    fn fetch_init_shared<'w>(stores: &SharedStores<'w>) -> Option<Self::Fetch<'w>>;
}

macro_rules! impl_query_tuple {
    ($($name:ident),+) => {
        impl<$($name: QueryItem),+> Query for ($($name,)+) {
            type Fetch<'w> = ($($name::Fetch<'w>,)+);
            type Item<'w> = ($($name::Item<'w>,)+);

            fn component_ids(registry: &ComponentRegistry) -> Option<Vec<ComponentTypeId>> {
                Some(vec![$(registry.lookup::<$name::Component>()?),+])
            }

            fn fetch_init<'w>(stores: &mut StoreSlots<'w>) -> Option<Self::Fetch<'w>> {
                Some(($($name::fetch_init(stores)?,)+))
            }

            #[allow(non_snake_case)]
            fn fetch<'w>(fetch: &mut Self::Fetch<'w>, entity: EntityId) -> Option<Self::Item<'w>> {
                let ($($name,)+) = fetch;
                Some(($($name::fetch($name, entity)?,)+))
            }
        }

        impl<$($name: ReadOnlyQueryItem),+> ReadOnlyQuery for ($($name,)+) {
            fn fetch_init_shared<'w>(stores: &SharedStores<'w>) -> Option<Self::Fetch<'w>> {
                Some(($($name::fetch_init_shared(stores)?,)+))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);

// ---------------------------------------------------------------------------
// World entry points
// ---------------------------------------------------------------------------

impl World {
    fn matching_entities<Q: Query>(&self, only_active: bool) -> Vec<EntityId> {
        let Some(component_ids) = Q::component_ids(&self.registry) else {
            return Vec::new();
        };
        let required = Signature::required(&component_ids, only_active);
        self.allocator.matching(required).collect()
    }

    /// Every alive entity owning all of `Q`'s component types, with its
    /// components, in ascending id order. With `only_active`, inactive
    /// entities are skipped.
    ///
    /// An unregistered type in `Q` yields an empty result.
    ///
    /// ```
    /// use arbor_ecs::prelude::*;
    ///
    /// #[derive(Debug, Default, Clone, PartialEq)]
    /// struct Position(f32);
    /// #[derive(Debug, Default, Clone, PartialEq)]
    /// struct Velocity(f32);
    /// arbor_ecs::impl_component!(Position, Velocity);
    ///
    /// let mut world = World::new();
    /// let e = world.create_entity().unwrap();
    /// world.insert_component(e, Position(1.0)).unwrap();
    /// world.insert_component(e, Velocity(0.5)).unwrap();
    ///
    /// for (_, (pos, vel)) in world.filter_entities::<(&mut Position, &Velocity)>(true) {
    ///     pos.0 += vel.0;
    /// }
    /// assert_eq!(world.get_component::<Position>(e), Some(&Position(1.5)));
    /// ```
    ///
    /// # Panics
    ///
    /// If `Q` names the same component type twice.
    pub fn filter_entities<Q: Query>(&mut self, only_active: bool) -> Vec<(EntityId, Q::Item<'_>)> {
        let matched = self.matching_entities::<Q>(only_active);
        if matched.is_empty() {
            return Vec::new();
        }
        let mut stores = StoreSlots::new(&self.registry, &mut self.stores);
        let Some(mut fetch) = Q::fetch_init(&mut stores) else {
            return Vec::new();
        };
        matched
            .into_iter()
            .filter_map(|entity| Q::fetch(&mut fetch, entity).map(|item| (entity, item)))
            .collect()
    }

    /// [`filter_entities`](Self::filter_entities) through a shared borrow.
    pub fn filter_entities_ref<Q: ReadOnlyQuery>(
        &self,
        only_active: bool,
    ) -> Vec<(EntityId, Q::Item<'_>)> {
        let matched = self.matching_entities::<Q>(only_active);
        if matched.is_empty() {
            return Vec::new();
        }
        let stores = SharedStores::new(&self.registry, &self.stores);
        let Some(mut fetch) = Q::fetch_init_shared(&stores) else {
            return Vec::new();
        };
        matched
            .into_iter()
            .filter_map(|entity| Q::fetch(&mut fetch, entity).map(|item| (entity, item)))
            .collect()
    }

    /// Ids of every entity [`filter_entities`](Self::filter_entities) would
    /// yield, without borrowing any component.
    pub fn entities_with<Q: Query>(&self, only_active: bool) -> Vec<EntityId> {
        self.matching_entities::<Q>(only_active)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
