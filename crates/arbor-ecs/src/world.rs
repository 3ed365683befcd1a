//! The [`World`] is the top-level container for the ECS. It owns the entity
//! table, the component registry, and one lazily created store per
//! component type.
//!
//! An entity's [`Signature`] is the single source of truth for which
//! components it owns: a set presence bit means the matching store holds an
//! instance for that entity. A mismatch between the two is an internal bug
//! and panics rather than being repaired.

use crate::component::{short_type_name, Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
use crate::config::WorldConfig;
use crate::entity::{EntityAllocator, EntityId};
use crate::signature::Signature;
use crate::store::{ComponentStore, ErasedStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level ECS container.
///
/// Worlds are plain values: create as many as needed and pass them
/// explicitly. Entities can be copied between worlds with
/// [`copy_entity_from`](Self::copy_entity_from).
pub struct World {
    config: WorldConfig,
    /// Entity table and id recycling.
    pub(crate) allocator: EntityAllocator,
    /// Component type registry.
    pub(crate) registry: ComponentRegistry,
    /// Indexed by `ComponentTypeId`; `None` until the first instance is added.
    pub(crate) stores: Vec<Option<Box<dyn ErasedStore>>>,
    /// Bumped whenever scene topology may have changed.
    topology_generation: u64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.allocator.alive_count())
            .field("capacity", &self.allocator.capacity())
            .field("component_types", &self.registry.len())
            .finish()
    }
}

impl World {
    /// Create an empty world with the default [`WorldConfig`].
    pub fn new() -> Self {
        Self::from_valid_config(WorldConfig::default())
    }

    /// Create an empty world with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidConfig`] if the configuration does not validate.
    pub fn with_config(config: WorldConfig) -> Result<Self, EcsError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: WorldConfig) -> Self {
        Self {
            allocator: EntityAllocator::new(config.max_entities),
            registry: ComponentRegistry::new(),
            stores: Vec::new(),
            topology_generation: 0,
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Register a component type, returning its id. Re-registering is a no-op.
    ///
    /// Registration order decides bit positions; [`add_component`](Self::add_component)
    /// registers implicitly, so calling this up front only pins the order.
    ///
    /// # Errors
    ///
    /// [`EcsError::TooManyComponentTypes`] past the type limit.
    pub fn register_component<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        let id = self.registry.register::<T>()?;
        if self.stores.len() <= id.index() {
            self.stores.resize_with(id.index() + 1, || None);
        }
        Ok(id)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity: alive, active, without components.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when `max_entities` entities are alive.
    pub fn create_entity(&mut self) -> Result<EntityId, EcsError> {
        let Some(entity) = self.allocator.allocate() else {
            tracing::error!(
                max_entities = self.config.max_entities,
                "entity capacity exhausted"
            );
            return Err(EcsError::CapacityExceeded {
                max_entities: self.config.max_entities,
            });
        };
        self.mark_topology_changed();
        tracing::trace!(%entity, "created entity");
        Ok(entity)
    }

    /// Destroy an entity: remove every component (running removal hooks, in
    /// ascending type id order), then recycle the id.
    ///
    /// # Errors
    ///
    /// [`EcsError::DeadEntity`] if the entity is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.live_signature(entity)?;
        // Re-read each round: removal hooks may touch this entity's components.
        while let Some(type_id) = self.signature_of(entity).components().next() {
            self.remove_component_by_id(entity, type_id);
        }
        self.allocator.deallocate(entity);
        self.mark_topology_changed();
        tracing::trace!(%entity, "destroyed entity");
        Ok(())
    }

    /// Check whether an entity is alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Whether the entity is alive and active.
    pub fn is_active(&self, entity: EntityId) -> bool {
        self.live_signature(entity)
            .is_ok_and(|signature| signature.is_active())
    }

    /// Toggle whether the entity takes part in active-only queries.
    ///
    /// # Errors
    ///
    /// [`EcsError::DeadEntity`] if the entity is not alive.
    pub fn set_active(&mut self, entity: EntityId, active: bool) -> Result<(), EcsError> {
        self.live_signature(entity)?;
        self.signature_mut(entity).set_active(active);
        Ok(())
    }

    /// The entity's record, `None` if it is not alive.
    pub fn signature(&self, entity: EntityId) -> Option<Signature> {
        self.live_signature(entity).ok()
    }

    pub(crate) fn live_signature(&self, entity: EntityId) -> Result<Signature, EcsError> {
        self.allocator
            .signature(entity)
            .filter(|signature| signature.is_alive())
            .ok_or(EcsError::DeadEntity { entity })
    }

    /// Record of an id known to be inside the table; empty if out of range.
    fn signature_of(&self, entity: EntityId) -> Signature {
        self.allocator.signature(entity).unwrap_or_default()
    }

    fn signature_mut(&mut self, entity: EntityId) -> &mut Signature {
        self.allocator
            .signature_mut(entity)
            .unwrap_or_else(|| panic!("{entity} is outside the entity table"))
    }

    /// Alive entities in ascending id order, up to the high-water mark.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.allocator.iter_alive()
    }

    /// Total number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// One past the highest id ever handed out.
    pub fn high_water_mark(&self) -> u32 {
        self.allocator.high_water_mark()
    }

    /// Maximum number of simultaneously alive entities.
    pub fn capacity(&self) -> u32 {
        self.allocator.capacity()
    }

    /// Number of registered component types.
    pub fn component_count(&self) -> usize {
        self.registry.len()
    }

    /// Counter bumped by every change that can invalidate a
    /// [`SceneHierarchy`](crate::scene::SceneHierarchy): entity creation and
    /// destruction, hierarchy node attach/detach, and reparenting.
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    pub(crate) fn mark_topology_changed(&mut self) {
        self.topology_generation = self.topology_generation.wrapping_add(1);
    }

    // -- component stores ---------------------------------------------------

    fn info(&self, type_id: ComponentTypeId) -> &ComponentInfo {
        self.registry.info(type_id)
    }

    /// The store for a type whose presence bit is set somewhere.
    fn store_mut(&mut self, type_id: ComponentTypeId) -> &mut dyn ErasedStore {
        match self.stores.get_mut(type_id.index()).and_then(Option::as_mut) {
            Some(store) => &mut **store,
            None => panic!(
                "component store for {} is missing although an entity has its presence bit set",
                self.registry.name_of(type_id)
            ),
        }
    }

    fn store_ref(&self, type_id: ComponentTypeId) -> &dyn ErasedStore {
        match self.stores.get(type_id.index()).and_then(Option::as_ref) {
            Some(store) => &**store,
            None => panic!(
                "component store for {} is missing although an entity has its presence bit set",
                self.registry.name_of(type_id)
            ),
        }
    }

    fn store_or_create(&mut self, type_id: ComponentTypeId) -> &mut dyn ErasedStore {
        let index = type_id.index();
        if self.stores.len() <= index {
            self.stores.resize_with(index + 1, || None);
        }
        if self.stores[index].is_none() {
            let info = self.registry.info(type_id);
            tracing::debug!(component = %info.name, "created component store");
            self.stores[index] = Some((info.new_store)(self.config.initial_store_capacity));
        }
        self.store_mut(type_id)
    }

    /// Typed read access to a component store, if one has been created.
    pub fn store<T: Component>(&self) -> Option<&ComponentStore<T>> {
        let type_id = self.registry.lookup::<T>()?;
        self.stores
            .get(type_id.index())?
            .as_ref()?
            .store_any()
            .downcast_ref::<ComponentStore<T>>()
    }

    fn typed_store_mut<T: Component>(
        &mut self,
        type_id: ComponentTypeId,
    ) -> Option<&mut ComponentStore<T>> {
        self.stores
            .get_mut(type_id.index())?
            .as_mut()?
            .store_any_mut()
            .downcast_mut::<ComponentStore<T>>()
    }

    // -- component access ---------------------------------------------------

    /// Attach a fresh `T::from_entity(entity)` and return it.
    ///
    /// Registers `T` and creates its store on first use, then runs
    /// [`Component::on_add`]. The returned reference is valid until the next
    /// mutation of the world.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity is not alive.
    /// - [`EcsError::ComponentAlreadyPresent`] if it already has a `T`.
    /// - [`EcsError::TooManyComponentTypes`] if `T` cannot be registered.
    /// - Any error returned by `T`'s `on_add` hook (the component stays attached).
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        self.insert_with(entity, T::from_entity)
    }

    /// Attach a caller-built `value`. Same rules as [`add_component`](Self::add_component).
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<&mut T, EcsError> {
        self.insert_with(entity, move |_| value)
    }

    fn insert_with<T: Component>(
        &mut self,
        entity: EntityId,
        make: impl FnOnce(EntityId) -> T,
    ) -> Result<&mut T, EcsError> {
        let signature = self.live_signature(entity)?;
        let type_id = self.register_component::<T>()?;
        if signature.contains(type_id) {
            return Err(EcsError::ComponentAlreadyPresent {
                entity,
                component: self.registry.name_of(type_id).to_owned(),
            });
        }

        self.store_or_create(type_id);
        match self.typed_store_mut::<T>(type_id) {
            Some(store) => store.insert(entity, make(entity)),
            None => panic!("component store for {} holds a different type", short_type_name::<T>()),
        };
        self.signature_mut(entity).insert(type_id);
        tracing::trace!(%entity, component = self.registry.name_of(type_id), "added component");

        T::on_add(self, entity)?;
        self.get_component_mut::<T>(entity)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: short_type_name::<T>(),
            })
    }

    /// Type-erased add used when duplicating entities.
    fn add_component_by_id(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
    ) -> Result<(), EcsError> {
        self.store_or_create(type_id).add_default(entity);
        self.signature_mut(entity).insert(type_id);
        let on_add = self.info(type_id).on_add;
        on_add(self, entity)
    }

    /// Get an immutable reference to a component on an entity.
    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let type_id = self.registry.lookup::<T>()?;
        if !self.signature_of(entity).contains(type_id) {
            return None;
        }
        self.store::<T>()?.get(entity)
    }

    /// Get a mutable reference to a component on an entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let type_id = self.registry.lookup::<T>()?;
        if !self.signature_of(entity).contains(type_id) {
            return None;
        }
        self.typed_store_mut::<T>(type_id)?.get_mut(entity)
    }

    /// Check whether an entity has a given component type. `false` for
    /// unregistered types and dead entities.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.registry
            .lookup::<T>()
            .is_some_and(|type_id| self.signature_of(entity).contains(type_id))
    }

    /// Detach and drop the entity's `T`, running [`Component::on_remove`]
    /// first. Returns `Ok(false)` if it had none.
    ///
    /// Swap-removal moves another entity's `T` into the freed slot.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if the entity is not alive.
    /// - Any error from `T`'s [`Component::check_remove`]; nothing is
    ///   removed in that case.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<bool, EcsError> {
        self.live_signature(entity)?;
        let Some(type_id) = self.registry.lookup::<T>() else {
            return Ok(false);
        };
        if !self.signature_of(entity).contains(type_id) {
            return Ok(false);
        }
        T::check_remove(self, entity)?;
        Ok(self.remove_component_by_id(entity, type_id))
    }

    fn remove_component_by_id(&mut self, entity: EntityId, type_id: ComponentTypeId) -> bool {
        if !self.signature_of(entity).contains(type_id) {
            return false;
        }
        let on_remove = self.info(type_id).on_remove;
        on_remove(self, entity);
        // The hook may already have detached it.
        if !self.signature_of(entity).contains(type_id) {
            return true;
        }

        if !self.store_mut(type_id).remove_entity(entity) {
            panic!(
                "{entity} has the {} presence bit set but its store holds no instance",
                self.registry.name_of(type_id)
            );
        }
        self.signature_mut(entity).remove(type_id);
        tracing::trace!(%entity, component = self.registry.name_of(type_id), "removed component");
        true
    }

    /// Every component on the entity as a trait object, in type id order.
    pub fn components_of(&self, entity: EntityId) -> Vec<(ComponentTypeId, &dyn Component)> {
        self.signature_of(entity)
            .components()
            .filter_map(|type_id| {
                self.store_ref(type_id)
                    .get_dyn(entity)
                    .map(|component| (type_id, component))
            })
            .collect()
    }

    // -- copying ------------------------------------------------------------

    /// Create an entity in this world with a copy of every component
    /// `entity` has in `source`, via [`Component::copy_from`].
    ///
    /// Component types are matched by Rust type, not by id, so the two worlds
    /// may have registered them in different orders. The activity flag is
    /// copied too. On error the partially built entity is destroyed.
    ///
    /// # Errors
    ///
    /// [`EcsError::DeadEntity`] if `entity` is not alive in `source`, plus
    /// any error from creation, hooks, or `copy_from`.
    pub fn copy_entity_from(
        &mut self,
        source: &World,
        entity: EntityId,
    ) -> Result<EntityId, EcsError> {
        let signature = source.live_signature(entity)?;
        let copy = self.create_entity()?;
        for type_id in signature.components() {
            let result = source.store_ref(type_id).copy_into(entity, self, copy);
            if let Err(error) = result {
                self.destroy_entity(copy)?;
                return Err(error);
            }
        }
        self.set_active(copy, signature.is_active())?;
        tracing::trace!(source = %entity, %copy, "copied entity from another world");
        Ok(copy)
    }

    /// Create a copy of `entity` in this world. The copy gets every
    /// component of the original and the same parent, making it a sibling.
    ///
    /// # Errors
    ///
    /// Same as [`copy_entity_from`](Self::copy_entity_from).
    pub fn duplicate_entity(&mut self, entity: EntityId) -> Result<EntityId, EcsError> {
        let signature = self.live_signature(entity)?;
        let copy = self.create_entity()?;
        if let Err(error) = self.duplicate_components(signature, entity, copy) {
            self.destroy_entity(copy)?;
            return Err(error);
        }
        self.set_active(copy, signature.is_active())?;
        if let Some(parent) = self.parent_of(entity) {
            self.set_parent(copy, Some(parent))?;
        }
        Ok(copy)
    }

    fn duplicate_components(
        &mut self,
        signature: Signature,
        entity: EntityId,
        copy: EntityId,
    ) -> Result<(), EcsError> {
        for type_id in signature.components() {
            if !self.signature_of(copy).contains(type_id) {
                self.add_component_by_id(copy, type_id)?;
            }
            self.store_mut(type_id).duplicate_within(entity, copy)?;
        }
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
