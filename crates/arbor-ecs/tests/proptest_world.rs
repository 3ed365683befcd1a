//! Property tests for world operations.
//!
//! Random operation sequences run against a [`World`] and a plain shadow
//! model side by side; after every step the world must agree with the model
//! on liveness, component contents, id recycling and filtering.

use std::collections::BTreeMap;

use arbor_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Pos(i32);

#[derive(Debug, Default, Clone, PartialEq)]
struct Vel(i32);

arbor_ecs::impl_component!(Pos, Vel);

const CAPACITY: u32 = 16;

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum WorldOp {
    Create,
    Destroy(usize),
    InsertPos(usize, i32),
    InsertVel(usize, i32),
    RemovePos(usize),
    RemoveVel(usize),
    SetActive(usize, bool),
    Filter(bool),
}

fn world_op_strategy() -> impl Strategy<Value = WorldOp> {
    prop_oneof![
        3 => Just(WorldOp::Create),
        1 => (0..64usize).prop_map(WorldOp::Destroy),
        2 => (0..64usize, -1000..1000i32).prop_map(|(i, v)| WorldOp::InsertPos(i, v)),
        2 => (0..64usize, -1000..1000i32).prop_map(|(i, v)| WorldOp::InsertVel(i, v)),
        1 => (0..64usize).prop_map(WorldOp::RemovePos),
        1 => (0..64usize).prop_map(WorldOp::RemoveVel),
        1 => (0..64usize, proptest::bool::ANY).prop_map(|(i, a)| WorldOp::SetActive(i, a)),
        1 => proptest::bool::ANY.prop_map(WorldOp::Filter),
    ]
}

#[derive(Debug, Default, Clone)]
struct Shadow {
    pos: Option<i32>,
    vel: Option<i32>,
    active: bool,
}

#[derive(Debug, Default)]
struct Model {
    alive: BTreeMap<EntityId, Shadow>,
    free: Vec<EntityId>,
    high_water: u32,
}

impl Model {
    fn pick(&self, idx: usize) -> Option<EntityId> {
        if self.alive.is_empty() {
            return None;
        }
        self.alive.keys().nth(idx % self.alive.len()).copied()
    }

    fn next_id(&self) -> Option<EntityId> {
        match self.free.last() {
            Some(&id) => Some(id),
            None if self.high_water < CAPACITY => Some(EntityId::new(self.high_water)),
            None => None,
        }
    }
}

fn new_world() -> World {
    World::with_config(WorldConfig::default().with_max_entities(CAPACITY)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn random_ops_match_shadow_model(ops in prop::collection::vec(world_op_strategy(), 1..80)) {
        let mut world = new_world();
        let mut model = Model::default();

        for op in ops {
            match op {
                WorldOp::Create => match (world.create_entity(), model.next_id()) {
                    (Ok(id), Some(expected)) => {
                        // Recycled ids come back last-in first-out.
                        prop_assert_eq!(id, expected);
                        if model.free.pop().is_none() {
                            model.high_water += 1;
                        }
                        model.alive.insert(id, Shadow { active: true, ..Shadow::default() });
                    }
                    (Err(EcsError::CapacityExceeded { .. }), None) => {}
                    (result, expected) => {
                        prop_assert!(false, "create returned {:?}, model expected {:?}", result, expected);
                    }
                },
                WorldOp::Destroy(idx) => {
                    if let Some(id) = model.pick(idx) {
                        world.destroy_entity(id).unwrap();
                        model.alive.remove(&id);
                        model.free.push(id);
                        prop_assert!(world.destroy_entity(id).is_err());
                    }
                }
                WorldOp::InsertPos(idx, v) => {
                    if let Some(id) = model.pick(idx) {
                        let shadow = model.alive.get_mut(&id).unwrap();
                        let result = world.insert_component(id, Pos(v));
                        if shadow.pos.is_some() {
                            let rejected = matches!(result, Err(EcsError::ComponentAlreadyPresent { .. }));
                            prop_assert!(rejected, "re-adding Pos returned {:?}", result);
                        } else {
                            prop_assert!(result.is_ok());
                            shadow.pos = Some(v);
                        }
                    }
                }
                WorldOp::InsertVel(idx, v) => {
                    if let Some(id) = model.pick(idx) {
                        let shadow = model.alive.get_mut(&id).unwrap();
                        let result = world.insert_component(id, Vel(v));
                        prop_assert_eq!(result.is_ok(), shadow.vel.is_none());
                        shadow.vel.get_or_insert(v);
                    }
                }
                WorldOp::RemovePos(idx) => {
                    if let Some(id) = model.pick(idx) {
                        let shadow = model.alive.get_mut(&id).unwrap();
                        prop_assert_eq!(world.remove_component::<Pos>(id).unwrap(), shadow.pos.take().is_some());
                    }
                }
                WorldOp::RemoveVel(idx) => {
                    if let Some(id) = model.pick(idx) {
                        let shadow = model.alive.get_mut(&id).unwrap();
                        prop_assert_eq!(world.remove_component::<Vel>(id).unwrap(), shadow.vel.take().is_some());
                    }
                }
                WorldOp::SetActive(idx, active) => {
                    if let Some(id) = model.pick(idx) {
                        world.set_active(id, active).unwrap();
                        model.alive.get_mut(&id).unwrap().active = active;
                    }
                }
                WorldOp::Filter(only_active) => {
                    let expected: Vec<(EntityId, i32, i32)> = model
                        .alive
                        .iter()
                        .filter(|(_, s)| s.active || !only_active)
                        .filter_map(|(&id, s)| Some((id, s.pos?, s.vel?)))
                        .collect();
                    let actual: Vec<(EntityId, i32, i32)> = world
                        .filter_entities::<(&Pos, &Vel)>(only_active)
                        .into_iter()
                        .map(|(id, (pos, vel))| (id, pos.0, vel.0))
                        .collect();
                    prop_assert_eq!(actual, expected);
                }
            }

            // Liveness and counts agree with the model.
            prop_assert_eq!(world.entity_count(), model.alive.len());
            prop_assert_eq!(world.high_water_mark(), model.high_water);
            let alive: Vec<EntityId> = world.entities().collect();
            let expected_alive: Vec<EntityId> = model.alive.keys().copied().collect();
            prop_assert_eq!(alive, expected_alive);
            for &id in &model.free {
                prop_assert!(!world.is_alive(id));
            }

            // Stores are dense: one instance per owner, no leftovers.
            let pos_owners = model.alive.values().filter(|s| s.pos.is_some()).count();
            let vel_owners = model.alive.values().filter(|s| s.vel.is_some()).count();
            prop_assert_eq!(world.store::<Pos>().map_or(0, |s| s.len()), pos_owners);
            prop_assert_eq!(world.store::<Vel>().map_or(0, |s| s.len()), vel_owners);

            for (&id, shadow) in &model.alive {
                prop_assert_eq!(world.get_component::<Pos>(id).map(|p| p.0), shadow.pos);
                prop_assert_eq!(world.get_component::<Vel>(id).map(|v| v.0), shadow.vel);
                prop_assert_eq!(world.is_active(id), shadow.active);
            }
        }
    }

    /// A recycled id never carries components from its previous life.
    #[test]
    fn recycled_ids_start_empty(count in 1..16usize, victims in prop::collection::vec(0..16usize, 1..8)) {
        let mut world = new_world();
        let mut ids: Vec<EntityId> = Vec::new();
        for i in 0..count {
            let id = world.create_entity().unwrap();
            world.insert_component(id, Pos(i as i32)).unwrap();
            ids.push(id);
        }

        let mut destroyed = Vec::new();
        for victim in victims {
            if ids.is_empty() {
                break;
            }
            let id = ids.remove(victim % ids.len());
            world.destroy_entity(id).unwrap();
            destroyed.push(id);
        }

        for _ in 0..destroyed.len() {
            let id = world.create_entity().unwrap();
            prop_assert!(destroyed.contains(&id));
            prop_assert!(!world.has_component::<Pos>(id));
            prop_assert_eq!(world.signature(id).map(|s| s.component_count()), Some(0));
        }
        for (i, &id) in ids.iter().enumerate() {
            prop_assert!(world.get_component::<Pos>(id).is_some(), "survivor {} lost its Pos", i);
        }
    }

    /// Swap-removal never disturbs the other entities' values.
    #[test]
    fn removal_preserves_other_values(count in 2..16usize, victim in 0..16usize) {
        let mut world = new_world();
        let ids: Vec<EntityId> = (0..count)
            .map(|i| {
                let id = world.create_entity().unwrap();
                world.insert_component(id, Pos(i as i32 * 10)).unwrap();
                id
            })
            .collect();

        let victim = victim % count;
        world.remove_component::<Pos>(ids[victim]).unwrap();

        for (i, &id) in ids.iter().enumerate() {
            let expected = (i != victim).then_some(i as i32 * 10);
            prop_assert_eq!(world.get_component::<Pos>(id).map(|p| p.0), expected);
        }
    }
}
