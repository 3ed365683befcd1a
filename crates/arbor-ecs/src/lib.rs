//! Arbor ECS -- sparse-set Entity Component System with a scene hierarchy.
//!
//! Every component type gets its own densely packed store, addressed through
//! a sparse entity-index map. Each entity slot carries a [`Signature`]
//! recording whether it is alive, whether it is active, and which component
//! types it owns, so filtering an entity against a query is a single mask
//! comparison. Entity ids are small integers recycled through a LIFO
//! free-list.
//!
//! On top of the core, the [`hierarchy`] module links entities into
//! parent/child trees and notifies observer components when an entity is
//! reparented, and the [`scene`] module builds read-only snapshots of those
//! trees.
//!
//! # Quick Start
//!
//! ```
//! use arbor_ecs::prelude::*;
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! arbor_ecs::impl_component!(Position, Velocity);
//!
//! let mut world = World::new();
//! let entity = world.create_entity().unwrap();
//! world.add_component::<Position>(entity).unwrap();
//! world.insert_component(entity, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//!
//! for (_, (pos, vel)) in world.filter_entities::<(&mut Position, &Velocity)>(true) {
//!     pos.x += vel.dx;
//! }
//! assert_eq!(world.get_component::<Position>(entity), Some(&Position { x: 1.0, y: 0.0 }));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod config;
pub mod entity;
pub mod handle;
pub mod hierarchy;
pub mod query;
pub mod scene;
pub mod signature;
pub mod store;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity is not alive (destroyed, or never created).
    #[error("entity {entity} is not alive")]
    DeadEntity { entity: entity::EntityId },

    /// Every entity slot is in use.
    #[error("entity capacity exhausted: {max_entities} entities are alive")]
    CapacityExceeded { max_entities: u32 },

    /// The component type limit was reached.
    #[error("cannot register component '{name}': at most {max} component types are supported")]
    TooManyComponentTypes { name: String, max: usize },

    /// The entity already owns a component of this type.
    #[error("entity {entity} already has component '{component}'")]
    ComponentAlreadyPresent {
        entity: entity::EntityId,
        component: String,
    },

    /// The entity does not own a component it was expected to own.
    #[error("entity {entity} has no component '{component}'")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// A component was asked to copy from an instance of another type.
    #[error("cannot copy a '{found}' into a '{expected}'")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Reparenting would make an entity its own ancestor.
    #[error("cannot parent {child} under {parent}: it would create a cycle")]
    HierarchyCycle {
        child: entity::EntityId,
        parent: entity::EntityId,
    },

    /// A component refused to be removed from its entity.
    #[error("cannot remove component '{component}' from entity {entity}: {reason}")]
    RemovalRejected {
        entity: entity::EntityId,
        component: String,
        reason: String,
    },

    /// A [`WorldConfig`](config::WorldConfig) failed validation.
    #[error("invalid world configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentRegistry, ComponentTypeId};
    pub use crate::config::WorldConfig;
    pub use crate::entity::EntityId;
    pub use crate::handle::{EntityMut, EntityRef};
    pub use crate::hierarchy::{Hierarchy, HierarchyChange, HierarchyObserver};
    pub use crate::query::{Query, QueryItem, ReadOnlyQuery};
    pub use crate::scene::{SceneHierarchy, SceneNode};
    pub use crate::signature::Signature;
    pub use crate::store::ComponentStore;
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
