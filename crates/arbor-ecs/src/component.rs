//! Component type contract, registration and metadata.
//!
//! Every type stored in a [`World`](crate::world::World) implements
//! [`Component`]: it can be built from the entity it is attached to, and it
//! can copy state from another instance of the *same concrete type*, failing
//! with [`EcsError::TypeMismatch`] otherwise.
//!
//! Registration in a [`ComponentRegistry`] assigns a [`ComponentTypeId`].
//! Ids are handed out from 0 in registration order and select both the
//! presence bit in an entity's [`Signature`](crate::signature::Signature) and
//! the component store that holds the instances.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityId;
use crate::signature::MAX_COMPONENT_TYPES;
use crate::store::{ComponentStore, ErasedStore};
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this type's presence bit and store.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Component contract
// ---------------------------------------------------------------------------

/// Upcast to [`Any`] through a trait object. Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Fully qualified name of the concrete type.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A typed payload attached to at most one entity at a time.
///
/// `on_add` runs right after an instance has been stored and its presence
/// bit set; `on_remove` runs while the instance is still present, right
/// before it is dropped. Both receive the whole world, which is how
/// hierarchical components subscribe to the entity's
/// [`Hierarchy`](crate::hierarchy::Hierarchy) node.
///
/// Plain `Default + Clone` data types can use [`impl_component!`](crate::impl_component).
pub trait Component: AsAny + 'static {
    /// Build a fresh instance bound to `entity`.
    fn from_entity(entity: EntityId) -> Self
    where
        Self: Sized;

    /// Overwrite `self` with the state of `source`.
    ///
    /// # Errors
    ///
    /// [`EcsError::TypeMismatch`] if `source` is not the same concrete type.
    fn copy_from(&mut self, source: &dyn Component) -> Result<(), EcsError>;

    /// Hook run after the component was attached to `entity`.
    fn on_add(_world: &mut World, _entity: EntityId) -> Result<(), EcsError>
    where
        Self: Sized,
    {
        Ok(())
    }

    /// Hook run before an explicit [`World::remove_component`]. An error
    /// vetoes the removal. Not consulted when the entity is destroyed.
    fn check_remove(_world: &World, _entity: EntityId) -> Result<(), EcsError>
    where
        Self: Sized,
    {
        Ok(())
    }

    /// Hook run before the component is detached from `entity`.
    fn on_remove(_world: &mut World, _entity: EntityId)
    where
        Self: Sized,
    {
    }
}

/// Downcast `source` to `T`, or report a [`EcsError::TypeMismatch`].
pub fn downcast_source<T: Component>(source: &dyn Component) -> Result<&T, EcsError> {
    source
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| EcsError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            found: source.type_name(),
        })
}

/// [`Component::copy_from`] for `Clone` types.
pub fn copy_cloned<T: Component + Clone>(
    target: &mut T,
    source: &dyn Component,
) -> Result<(), EcsError> {
    target.clone_from(downcast_source::<T>(source)?);
    Ok(())
}

/// Implement [`Component`] for `Default + Clone` types: instances start from
/// `Default::default()` and copy by cloning.
///
/// ```
/// use arbor_ecs::prelude::*;
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Health(u32);
/// arbor_ecs::impl_component!(Health);
///
/// let mut world = World::new();
/// let e = world.create_entity().unwrap();
/// world.add_component::<Health>(e).unwrap().0 = 10;
/// assert_eq!(world.get_component::<Health>(e), Some(&Health(10)));
/// ```
#[macro_export]
macro_rules! impl_component {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::component::Component for $ty {
                fn from_entity(_entity: $crate::entity::EntityId) -> Self {
                    <$ty as ::core::default::Default>::default()
                }

                fn copy_from(
                    &mut self,
                    source: &dyn $crate::component::Component,
                ) -> ::core::result::Result<(), $crate::EcsError> {
                    $crate::component::copy_cloned(self, source)
                }
            }
        )+
    };
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type, plus the type-erased entry
/// points the world needs to create its store and run its hooks.
#[derive(Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Short type name (module path stripped).
    pub name: String,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
    pub(crate) on_add: fn(&mut World, EntityId) -> Result<(), EcsError>,
    pub(crate) on_remove: fn(&mut World, EntityId),
    pub(crate) new_store: fn(usize) -> Box<dyn ErasedStore>,
}

impl fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

fn new_store<T: Component>(capacity: usize) -> Box<dyn ErasedStore> {
    Box::new(ComponentStore::<T>::with_capacity(capacity))
}

/// `std::any::type_name` without the module path, keeping generic arguments.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let (path, generics) = full.split_at(full.find('<').unwrap_or(full.len()));
    let base = path.rsplit("::").next().unwrap_or(path);
    format!("{base}{generics}")
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// Re-registering a type returns its existing id. Ids are stable for the
/// lifetime of the registry and are never persisted.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its id.
    ///
    /// # Errors
    ///
    /// [`EcsError::TooManyComponentTypes`] once [`MAX_COMPONENT_TYPES`]
    /// distinct types are registered.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }

        let name = short_type_name::<T>();
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            tracing::error!(component = %name, max = MAX_COMPONENT_TYPES, "component type limit reached");
            return Err(EcsError::TooManyComponentTypes {
                name,
                max: MAX_COMPONENT_TYPES,
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        tracing::debug!(component = %name, id = id.0, "registered component type");
        self.infos.push(ComponentInfo {
            id,
            name,
            type_id: rust_type_id,
            on_add: T::on_add,
            on_remove: T::on_remove,
            new_store: new_store::<T>,
        });
        self.by_type.insert(rust_type_id, id);
        Ok(id)
    }

    /// Look up a component type by its Rust `TypeId`.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Info for an id this registry handed out.
    pub(crate) fn info(&self, id: ComponentTypeId) -> &ComponentInfo {
        self.infos.get(id.index()).unwrap_or_else(|| {
            panic!("{id:?} was not issued by this registry ({} types registered)", self.infos.len())
        })
    }

    /// Short name of a registered type, `"<unregistered>"` otherwise.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id).map_or("<unregistered>", |info| info.name.as_str())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.infos.iter().map(|info| info.name.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
