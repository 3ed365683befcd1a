//! Borrowed entity handles.
//!
//! [`EntityRef`] and [`EntityMut`] pair an [`EntityId`] with a borrow of the
//! world that issued it, so per-entity code reads `entity.get::<T>()`
//! instead of threading the id through every call. Handles are only handed
//! out for alive entities and never outlive the borrow.

use crate::component::Component;
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

/// Shared view of one alive entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'w> {
    world: &'w World,
    id: EntityId,
}

impl<'w> EntityRef<'w> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn world(&self) -> &'w World {
        self.world
    }

    pub fn is_active(&self) -> bool {
        self.world.is_active(self.id)
    }

    pub fn get<T: Component>(&self) -> Option<&'w T> {
        self.world.get_component::<T>(self.id)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.id)
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.world.parent_of(self.id)
    }

    pub fn children(&self) -> &'w [EntityId] {
        self.world.children_of(self.id)
    }
}

/// Exclusive view of one alive entity.
#[derive(Debug)]
pub struct EntityMut<'w> {
    world: &'w mut World,
    id: EntityId,
}

impl<'w> EntityMut<'w> {
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Reborrow as a shared handle.
    pub fn as_readonly(&self) -> EntityRef<'_> {
        EntityRef {
            world: &*self.world,
            id: self.id,
        }
    }

    pub fn add<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        self.world.add_component::<T>(self.id)
    }

    pub fn insert<T: Component>(&mut self, value: T) -> Result<&mut T, EcsError> {
        self.world.insert_component(self.id, value)
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        self.world.get_component::<T>(self.id)
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.get_component_mut::<T>(self.id)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.id)
    }

    pub fn remove<T: Component>(&mut self) -> Result<bool, EcsError> {
        self.world.remove_component::<T>(self.id)
    }

    pub fn set_active(&mut self, active: bool) -> Result<(), EcsError> {
        self.world.set_active(self.id, active)
    }

    pub fn set_parent(&mut self, parent: Option<EntityId>) -> Result<(), EcsError> {
        self.world.set_parent(self.id, parent)
    }

    /// Destroy the entity, consuming the handle.
    pub fn destroy(self) -> Result<(), EcsError> {
        self.world.destroy_entity(self.id)
    }
}

impl World {
    /// Shared handle to `id`, `None` if it is not alive.
    pub fn entity(&self, id: EntityId) -> Option<EntityRef<'_>> {
        self.is_alive(id).then_some(EntityRef { world: self, id })
    }

    /// Exclusive handle to `id`, `None` if it is not alive.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<EntityMut<'_>> {
        if !self.is_alive(id) {
            return None;
        }
        Some(EntityMut { world: self, id })
    }

    /// Create an entity and return an exclusive handle to it.
    ///
    /// # Errors
    ///
    /// Same as [`create_entity`](Self::create_entity).
    pub fn spawn(&mut self) -> Result<EntityMut<'_>, EcsError> {
        let id = self.create_entity()?;
        Ok(EntityMut { world: self, id })
    }
}
