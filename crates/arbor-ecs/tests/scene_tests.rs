//! Scene hierarchy snapshots.

use arbor_ecs::prelude::*;

/// root
/// ├── a
/// │   ├── a1
/// │   └── a2
/// └── b
/// lone
fn build_world() -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let ids: Vec<EntityId> = (0..6).map(|_| world.create_entity().unwrap()).collect();
    let &[root, a, a1, a2, b, _lone] = ids.as_slice() else {
        unreachable!()
    };
    world.set_parent(a, Some(root)).unwrap();
    world.set_parent(a1, Some(a)).unwrap();
    world.set_parent(a2, Some(a)).unwrap();
    world.set_parent(b, Some(root)).unwrap();
    (world, ids)
}

#[test]
fn roots_are_parentless_alive_entities_in_id_order() {
    let (world, ids) = build_world();
    let scene = SceneHierarchy::build(&world);
    let roots: Vec<EntityId> = scene.roots().iter().map(|node| node.entity).collect();
    assert_eq!(roots, vec![ids[0], ids[5]]);
    assert_eq!(scene.len(), 6);
}

#[test]
fn depth_first_follows_child_order() {
    let (world, ids) = build_world();
    let scene = SceneHierarchy::build(&world);
    assert_eq!(
        scene.depth_first(),
        vec![
            (0, ids[0]),
            (1, ids[1]),
            (2, ids[2]),
            (2, ids[3]),
            (1, ids[4]),
            (0, ids[5]),
        ]
    );
}

#[test]
fn destroyed_entities_disappear_after_rebuild() {
    let (mut world, ids) = build_world();
    let mut scene = SceneHierarchy::build(&world);
    world.destroy_entity(ids[1]).unwrap();
    assert!(scene.is_stale(&world));
    assert!(scene.find(ids[1]).is_some());

    scene.rebuild(&world);
    assert!(scene.find(ids[1]).is_none());
    // a's children became roots.
    let roots: Vec<EntityId> = scene.roots().iter().map(|node| node.entity).collect();
    assert_eq!(roots, vec![ids[0], ids[2], ids[3], ids[5]]);
}

#[test]
fn component_changes_do_not_mark_stale() {
    #[derive(Debug, Default, Clone)]
    struct Tint(u8);
    arbor_ecs::impl_component!(Tint);

    let (mut world, ids) = build_world();
    let scene = SceneHierarchy::build(&world);
    world.add_component::<Tint>(ids[2]).unwrap().0 = 3;
    world.set_active(ids[2], false).unwrap();
    assert!(!scene.is_stale(&world));
    assert_eq!(world.get_component::<Tint>(ids[2]).map(|t| t.0), Some(3));
}

#[test]
fn json_dump_is_nested() {
    let (world, ids) = build_world();
    let json = SceneHierarchy::build(&world).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let roots = value.as_array().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0]["children"][0]["children"][1]["entity"], ids[3].to_raw());
    assert_eq!(roots[1]["children"].as_array().map(Vec::len), Some(0));
}
