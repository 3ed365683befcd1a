//! Per-entity liveness, activity and component-presence record.
//!
//! Every identifier slot in a [`World`](crate::world::World) owns one
//! [`Signature`]. The two highest bits mark *alive* and *active*; the
//! remaining [`MAX_COMPONENT_TYPES`] bits mark which component types the
//! entity currently owns. A query is itself expressed as a `Signature`, so
//! matching an entity against it is a single AND-and-compare.

use std::fmt;

use crate::component::ComponentTypeId;

/// Upper bound on the number of distinct component types a world can register.
pub const MAX_COMPONENT_TYPES: usize = 62;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Bounded bit set over the liveness flags and registered component types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signature(u64);

impl Signature {
    const ALIVE: u64 = 1 << 63;
    const ACTIVE: u64 = 1 << 62;
    const COMPONENTS: u64 = Self::ACTIVE - 1;

    /// A dead slot: no flags, no components.
    pub const EMPTY: Self = Self(0);

    /// Record for a freshly created entity: alive, active, no components.
    pub(crate) const fn spawned() -> Self {
        Self(Self::ALIVE | Self::ACTIVE)
    }

    /// Build the mask an entity must match to be yielded by a query over
    /// `components`. Liveness is always required; activity only when
    /// `only_active` is set.
    pub fn required(components: &[ComponentTypeId], only_active: bool) -> Self {
        let mut signature = Self(Self::ALIVE);
        if only_active {
            signature.0 |= Self::ACTIVE;
        }
        for &id in components {
            signature.insert(id);
        }
        signature
    }

    #[inline]
    fn bit(id: ComponentTypeId) -> u64 {
        debug_assert!(id.index() < MAX_COMPONENT_TYPES);
        1 << id.index()
    }

    #[inline]
    pub fn is_alive(self) -> bool {
        self.0 & Self::ALIVE != 0
    }

    #[inline]
    pub fn is_active(self) -> bool {
        self.0 & Self::ACTIVE != 0
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        if active {
            self.0 |= Self::ACTIVE;
        } else {
            self.0 &= !Self::ACTIVE;
        }
    }

    /// Whether the component type `id` is present.
    #[inline]
    pub fn contains(self, id: ComponentTypeId) -> bool {
        self.0 & Self::bit(id) != 0
    }

    pub(crate) fn insert(&mut self, id: ComponentTypeId) {
        self.0 |= Self::bit(id);
    }

    pub(crate) fn remove(&mut self, id: ComponentTypeId) {
        self.0 &= !Self::bit(id);
    }

    /// `true` if every flag and component set in `required` is also set here.
    #[inline]
    pub fn matches(self, required: Signature) -> bool {
        self.0 & required.0 == required.0
    }

    /// Number of component types present.
    pub fn component_count(self) -> u32 {
        (self.0 & Self::COMPONENTS).count_ones()
    }

    /// Present component types in ascending id order.
    pub fn components(self) -> impl Iterator<Item = ComponentTypeId> {
        let mut bits = self.0 & Self::COMPONENTS;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros();
            bits &= bits - 1;
            Some(ComponentTypeId(index))
        })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("alive", &self.is_alive())
            .field("active", &self.is_active())
            .field("components", &self.components().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
