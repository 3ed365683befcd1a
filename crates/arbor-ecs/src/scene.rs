//! Read-only tree snapshot of a world's hierarchy, for outliners and
//! debug dumps.
//!
//! A [`SceneHierarchy`] is built explicitly and never follows the world on
//! its own. [`SceneHierarchy::is_stale`] tells whether the world's topology
//! moved on since the last build.

use serde::Serialize;

use crate::entity::EntityId;
use crate::world::World;
use crate::EcsError;

/// One entity and its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneNode {
    pub entity: EntityId,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        let mut len = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            len += 1;
            stack.extend(node.children.iter());
        }
        len
    }

    fn find(&self, entity: EntityId) -> Option<&SceneNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.entity == entity {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    fn walk(&self, out: &mut Vec<(usize, EntityId)>) {
        let mut stack = vec![(0, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node.entity));
            stack.extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        }
    }
}

// Tear down deep subtrees without recursing once per level.
impl Drop for SceneNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

/// Snapshot the subtree under `root`, children in attachment order.
fn build_subtree(world: &World, root: EntityId) -> SceneNode {
    // (entity, next child to visit, finished children)
    let mut stack: Vec<(EntityId, usize, Vec<SceneNode>)> = vec![(root, 0, Vec::new())];
    let mut built = None;
    while let Some((entity, next, _)) = stack.last_mut() {
        if let Some(&child) = world.children_of(*entity).get(*next) {
            *next += 1;
            stack.push((child, 0, Vec::new()));
            continue;
        }
        if let Some((entity, _, children)) = stack.pop() {
            let node = SceneNode { entity, children };
            match stack.last_mut() {
                Some((_, _, siblings)) => siblings.push(node),
                None => built = Some(node),
            }
        }
    }
    built.unwrap_or_else(|| SceneNode {
        entity: root,
        children: Vec::new(),
    })
}

/// Forest of every alive entity, rooted at the entities without a parent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneHierarchy {
    roots: Vec<SceneNode>,
    /// Topology generation of the world at the last build.
    #[serde(skip)]
    built_at: Option<u64>,
}

impl SceneHierarchy {
    /// Snapshot `world`. Roots come in ascending entity id order; children
    /// keep their attachment order.
    pub fn build(world: &World) -> Self {
        let mut scene = Self::default();
        scene.rebuild(world);
        scene
    }

    /// Replace the snapshot with the current state of `world`.
    pub fn rebuild(&mut self, world: &World) {
        self.roots = world
            .entities()
            .filter(|&entity| world.parent_of(entity).is_none())
            .map(|root| build_subtree(world, root))
            .collect();
        self.built_at = Some(world.topology_generation());
        tracing::debug!(
            roots = self.roots.len(),
            generation = world.topology_generation(),
            "rebuilt scene hierarchy"
        );
    }

    pub fn roots(&self) -> &[SceneNode] {
        &self.roots
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.roots.iter().map(SceneNode::subtree_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The node for `entity`, if it was part of the snapshot.
    pub fn find(&self, entity: EntityId) -> Option<&SceneNode> {
        self.roots.iter().find_map(|root| root.find(entity))
    }

    /// Pre-order traversal as `(depth, entity)` pairs, roots at depth 0.
    pub fn depth_first(&self) -> Vec<(usize, EntityId)> {
        let mut out = Vec::with_capacity(self.len());
        for root in &self.roots {
            root.walk(&mut out);
        }
        out
    }

    /// Whether `world` changed topology since this snapshot was built.
    /// Always `true` for a snapshot that was never built.
    pub fn is_stale(&self, world: &World) -> bool {
        self.built_at != Some(world.topology_generation())
    }

    /// Pretty-printed JSON of the node tree. Serialization nests one level
    /// per tree level.
    ///
    /// # Errors
    ///
    /// [`EcsError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, EcsError> {
        Ok(serde_json::to_string_pretty(&self.roots)?)
    }
}
