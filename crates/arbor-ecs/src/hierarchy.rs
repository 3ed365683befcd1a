//! Parent/child links between entities, with change notification.
//!
//! The hierarchy is an ordinary component, [`Hierarchy`], built only on the
//! world's public contract. Components that care about their entity's place
//! in the tree implement [`HierarchyObserver`] and call [`subscribe`] from
//! their `on_add` hook (and [`unsubscribe`] from `on_remove`). Every
//! [`World::set_parent`] on the entity then calls each subscribed
//! observer exactly once, in subscription order.
//!
//! While any observer is subscribed, removing the entity's `Hierarchy`
//! directly is refused with [`EcsError::RemovalRejected`]; destroying the
//! entity always succeeds.
//!
//! Links are world-scoped entity ids, so copying a `Hierarchy` between
//! entities copies neither links nor listeners. [`World::copy_subtree_from`]
//! copies a whole subtree and relinks it in the target world.

use std::any::TypeId;
use std::fmt;

use crate::component::{downcast_source, Component};
use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// A reparenting event, delivered to the child's observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyChange {
    /// The entity whose parent changed.
    pub entity: EntityId,
    pub old_parent: Option<EntityId>,
    pub new_parent: Option<EntityId>,
}

/// A component that wants to hear about its entity's hierarchy changes.
pub trait HierarchyObserver: Component + Sized {
    fn on_hierarchy_change(&mut self, change: &HierarchyChange);
}

#[derive(Clone, Copy)]
struct Listener {
    type_id: TypeId,
    name: &'static str,
    notify: fn(&mut World, &HierarchyChange),
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn notify<T: HierarchyObserver>(world: &mut World, change: &HierarchyChange) {
    if let Some(observer) = world.get_component_mut::<T>(change.entity) {
        observer.on_hierarchy_change(change);
    }
}

/// Register `T` as a listener on `entity`'s hierarchy node, creating the
/// node if needed. Subscribing the same type twice is a no-op.
///
/// # Errors
///
/// [`EcsError::DeadEntity`] if the entity is not alive, or a registration
/// error for [`Hierarchy`].
pub fn subscribe<T: HierarchyObserver>(world: &mut World, entity: EntityId) -> Result<(), EcsError> {
    let node = world.hierarchy_node_mut(entity)?;
    if !node.has_listener::<T>() {
        node.listeners.push(Listener {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            notify: notify::<T>,
        });
    }
    Ok(())
}

/// Remove `T` from `entity`'s listeners. Does nothing if the entity has no
/// hierarchy node (for instance while it is being destroyed).
pub fn unsubscribe<T: HierarchyObserver>(world: &mut World, entity: EntityId) {
    if let Some(node) = world.get_component_mut::<Hierarchy>(entity) {
        node.listeners.retain(|listener| listener.type_id != TypeId::of::<T>());
    }
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Hierarchy node of one entity.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    entity: EntityId,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    listeners: Vec<Listener>,
}

impl Hierarchy {
    /// The entity this node belongs to.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in attachment order.
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listener<T: HierarchyObserver>(&self) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.type_id == TypeId::of::<T>())
    }
}

impl Component for Hierarchy {
    fn from_entity(entity: EntityId) -> Self {
        Self {
            entity,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Only checks the source type; links and listeners are tied to the
    /// source entity and are not copied.
    fn copy_from(&mut self, source: &dyn Component) -> Result<(), EcsError> {
        downcast_source::<Hierarchy>(source)?;
        Ok(())
    }

    fn on_add(world: &mut World, _entity: EntityId) -> Result<(), EcsError> {
        world.mark_topology_changed();
        Ok(())
    }

    /// A node with subscribed observers stays until they unsubscribe, so
    /// they keep hearing every parent change of the entity.
    fn check_remove(world: &World, entity: EntityId) -> Result<(), EcsError> {
        match world.get_component::<Hierarchy>(entity) {
            Some(node) if !node.listeners.is_empty() => {
                let observers: Vec<&str> = node.listeners.iter().map(|listener| listener.name).collect();
                tracing::warn!(%entity, ?observers, "rejected removal of observed hierarchy node");
                Err(EcsError::RemovalRejected {
                    entity,
                    component: "Hierarchy".to_owned(),
                    reason: format!("observed by {}", observers.join(", ")),
                })
            }
            _ => Ok(()),
        }
    }

    fn on_remove(world: &mut World, entity: EntityId) {
        let Some(node) = world.get_component::<Hierarchy>(entity) else {
            return;
        };
        let parent = node.parent;
        let children = node.children.clone();

        if let Some(parent) = parent {
            if let Some(parent_node) = world.get_component_mut::<Hierarchy>(parent) {
                parent_node.children.retain(|&child| child != entity);
            }
        }
        for child in children {
            if let Err(error) = world.set_parent(child, None) {
                tracing::warn!(%entity, %child, %error, "failed to orphan child of removed hierarchy node");
            }
        }
        world.mark_topology_changed();
    }
}

// ---------------------------------------------------------------------------
// World operations
// ---------------------------------------------------------------------------

impl World {
    /// `entity`'s hierarchy node, attached on demand.
    fn hierarchy_node_mut(&mut self, entity: EntityId) -> Result<&mut Hierarchy, EcsError> {
        if !self.has_component::<Hierarchy>(entity) {
            return self.add_component::<Hierarchy>(entity);
        }
        self.get_component_mut::<Hierarchy>(entity)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: "Hierarchy".to_owned(),
            })
    }

    /// Move `child` under `parent` (appended last), or make it a root with
    /// `None`. Both entities get a [`Hierarchy`] node if they lack one.
    ///
    /// After the links are updated, every observer subscribed on `child` is
    /// notified once, even if the parent did not actually change.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DeadEntity`] if either entity is not alive.
    /// - [`EcsError::HierarchyCycle`] if `parent` is `child` or one of its
    ///   descendants. Nothing is changed in that case.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), EcsError> {
        self.live_signature(child)?;
        if let Some(parent) = parent {
            self.live_signature(parent)?;
            if parent == child || self.ancestors(parent).contains(&child) {
                tracing::warn!(%child, %parent, "rejected reparent that would create a cycle");
                return Err(EcsError::HierarchyCycle { child, parent });
            }
        }

        let old_parent = self.hierarchy_node_mut(child)?.parent;
        if let Some(old_parent) = old_parent {
            if let Some(node) = self.get_component_mut::<Hierarchy>(old_parent) {
                node.children.retain(|&c| c != child);
            }
        }
        if let Some(parent) = parent {
            self.hierarchy_node_mut(parent)?.children.push(child);
        }
        let node = self.hierarchy_node_mut(child)?;
        node.parent = parent;
        let listeners = node.listeners.clone();
        self.mark_topology_changed();
        tracing::trace!(%child, ?old_parent, new_parent = ?parent, "reparented entity");

        let change = HierarchyChange {
            entity: child,
            old_parent,
            new_parent: parent,
        };
        for listener in listeners {
            (listener.notify)(self, &change);
        }
        Ok(())
    }

    /// The entity's parent, `None` for roots and entities without a node.
    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.get_component::<Hierarchy>(entity)?.parent
    }

    /// The entity's children in attachment order.
    pub fn children_of(&self, entity: EntityId) -> &[EntityId] {
        self.get_component::<Hierarchy>(entity)
            .map(Hierarchy::children)
            .unwrap_or_default()
    }

    /// Parent, grandparent, and so on up to the root.
    pub fn ancestors(&self, entity: EntityId) -> Vec<EntityId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent_of(entity);
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.parent_of(parent);
        }
        ancestors
    }

    /// Copy `root` and all of its descendants from `source`, rebuilding the
    /// parent/child links between the copies. The copied root has no parent.
    ///
    /// # Errors
    ///
    /// Any error from [`copy_entity_from`](Self::copy_entity_from) or
    /// [`set_parent`](Self::set_parent). Entities copied before the failure
    /// are kept.
    pub fn copy_subtree_from(&mut self, source: &World, root: EntityId) -> Result<EntityId, EcsError> {
        let copy = self.copy_entity_from(source, root)?;

        // Copy in pre-order, remembering (depth, child copy, parent copy).
        let mut links = Vec::new();
        let mut pending: Vec<(usize, EntityId, EntityId)> = source
            .children_of(root)
            .iter()
            .rev()
            .map(|&child| (1, child, copy))
            .collect();
        while let Some((depth, original, parent_copy)) = pending.pop() {
            let child_copy = self.copy_entity_from(source, original)?;
            links.push((depth, child_copy, parent_copy));
            pending.extend(
                source
                    .children_of(original)
                    .iter()
                    .rev()
                    .map(|&child| (depth + 1, child, child_copy)),
            );
        }

        // Deepest links first: each parent is still a root when its children
        // attach, so the cycle check stays constant-time. The stable sort
        // keeps siblings in source order.
        links.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, child_copy, parent_copy) in links {
            self.set_parent(child_copy, Some(parent_copy))?;
        }
        Ok(copy)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
