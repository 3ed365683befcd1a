//! Copying entities between worlds and within one world.

use arbor_ecs::component::downcast_source;
use arbor_ecs::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Label(String);

#[derive(Debug, Default, Clone, PartialEq)]
struct Health(u32);

arbor_ecs::impl_component!(Position, Label, Health);

/// Refuses to be copied, to exercise rollback.
#[derive(Debug, Default)]
struct Locked;

impl Component for Locked {
    fn from_entity(_entity: EntityId) -> Self {
        Locked
    }

    fn copy_from(&mut self, source: &dyn Component) -> Result<(), EcsError> {
        downcast_source::<Locked>(source)?;
        Err(EcsError::InvalidConfig("locked components cannot be copied".into()))
    }
}

#[test]
fn cross_world_copy_is_faithful() {
    let mut source = World::new();
    let e = source.create_entity().unwrap();
    source.insert_component(e, Position { x: 3.0, y: -1.5 }).unwrap();
    source.insert_component(e, Label("crate".into())).unwrap();

    let mut target = World::new();
    let copy = target.copy_entity_from(&source, e).unwrap();

    assert_eq!(
        target.get_component::<Position>(copy),
        source.get_component::<Position>(e)
    );
    assert_eq!(
        target.get_component::<Label>(copy),
        source.get_component::<Label>(e)
    );
    assert!(!target.has_component::<Health>(copy));
    assert_eq!(
        target.signature(copy).unwrap().component_count(),
        source.signature(e).unwrap().component_count()
    );
}

#[test]
fn copies_are_independent_of_the_source() {
    let mut source = World::new();
    let e = source.create_entity().unwrap();
    source.insert_component(e, Health(10)).unwrap();

    let mut target = World::new();
    let copy = target.copy_entity_from(&source, e).unwrap();
    target.get_component_mut::<Health>(copy).unwrap().0 = 1;
    source.destroy_entity(e).unwrap();

    assert_eq!(target.get_component::<Health>(copy), Some(&Health(1)));
}

#[test]
fn copy_preserves_inactive_flag() {
    let mut source = World::new();
    let e = source.create_entity().unwrap();
    source.set_active(e, false).unwrap();

    let mut target = World::new();
    let copy = target.copy_entity_from(&source, e).unwrap();
    assert!(!target.is_active(copy));
    assert!(target.entities_with::<(&Health,)>(true).is_empty());
}

#[test]
fn failed_copy_leaves_no_entity_behind() {
    let mut source = World::new();
    let e = source.create_entity().unwrap();
    source.insert_component(e, Health(1)).unwrap();
    source.add_component::<Locked>(e).unwrap();

    let mut target = World::new();
    assert!(target.copy_entity_from(&source, e).is_err());
    assert_eq!(target.entity_count(), 0);
    assert!(target.store::<Health>().map_or(true, |store| store.is_empty()));
}

#[test]
fn copy_into_full_world_fails() {
    let mut source = World::new();
    let e = source.create_entity().unwrap();

    let mut target = World::with_config(WorldConfig::default().with_max_entities(1)).unwrap();
    target.create_entity().unwrap();
    assert!(matches!(
        target.copy_entity_from(&source, e),
        Err(EcsError::CapacityExceeded { .. })
    ));
}

#[test]
fn copy_between_worlds_with_different_registration_order() {
    let mut source = World::new();
    source.register_component::<Label>().unwrap();
    source.register_component::<Health>().unwrap();
    let e = source.create_entity().unwrap();
    source.insert_component(e, Health(4)).unwrap();
    source.insert_component(e, Label("x".into())).unwrap();

    let mut target = World::new();
    target.register_component::<Health>().unwrap();
    target.register_component::<Position>().unwrap();
    let copy = target.copy_entity_from(&source, e).unwrap();

    assert_eq!(target.get_component::<Health>(copy), Some(&Health(4)));
    assert_eq!(target.get_component::<Label>(copy), Some(&Label("x".into())));
    assert!(!target.has_component::<Position>(copy));
}

#[test]
fn copy_from_rejects_mismatched_type() {
    let mut position = Position::default();
    let err = position.copy_from(&Label("nope".into())).unwrap_err();
    assert!(matches!(err, EcsError::TypeMismatch { .. }));
    assert_eq!(position, Position::default());
}

#[test]
fn duplicate_within_world() {
    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.insert_component(e, Label("orig".into())).unwrap();

    let dup = world.duplicate_entity(e).unwrap();
    assert_eq!(world.get_component::<Label>(dup), Some(&Label("orig".into())));
    world.get_component_mut::<Label>(dup).unwrap().0.push_str("-copy");
    assert_eq!(world.get_component::<Label>(e), Some(&Label("orig".into())));
}

#[test]
fn failed_duplicate_is_rolled_back() {
    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.add_component::<Locked>(e).unwrap();

    assert!(world.duplicate_entity(e).is_err());
    assert_eq!(world.entity_count(), 1);
    assert_eq!(world.store::<Locked>().unwrap().len(), 1);
}

#[test]
fn subtree_copy_instantiates_prefab() {
    let mut prefab = World::new();
    let root = prefab.create_entity().unwrap();
    let arm = prefab.create_entity().unwrap();
    let hand = prefab.create_entity().unwrap();
    prefab.insert_component(hand, Label("hand".into())).unwrap();
    prefab.set_parent(arm, Some(root)).unwrap();
    prefab.set_parent(hand, Some(arm)).unwrap();

    let mut scene = World::new();
    let first = scene.copy_subtree_from(&prefab, root).unwrap();
    let second = scene.copy_subtree_from(&prefab, root).unwrap();
    assert_ne!(first, second);
    assert_eq!(scene.entity_count(), 6);

    let hand_copy = scene.children_of(scene.children_of(second)[0])[0];
    assert_eq!(scene.get_component::<Label>(hand_copy), Some(&Label("hand".into())));
    assert_eq!(scene.ancestors(hand_copy).last(), Some(&second));
}
