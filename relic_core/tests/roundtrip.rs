//! End-to-end capture/restore scenarios over real scenes.

use glam::Vec3;
use relic_core::{
    Asset, AssetKind, FieldAccess, FieldData, FileBlobStore, Identifier, LoadContext,
    MeshRenderer, SaveContext, Scene, SceneStateEngine, StateRecord, StoreFormat, Transform,
    impl_component,
};
use relic_ids::{AssetID, NodeID};

/// Host-defined component holding a reference to another node.
#[derive(Debug, Clone, Default)]
struct Follower {
    target: NodeID,
}

impl FieldAccess for Follower {
    fn capture_fields(&self, data: &mut FieldData, cx: &mut SaveContext) {
        if !self.target.is_nil() {
            cx.store_node_reference(data, "target", self.target);
        }
    }

    fn apply_fields(&mut self, data: &FieldData, cx: &mut LoadContext) {
        if let Some(id) = cx.resolve_node_reference(data, "target") {
            self.target = id;
        }
    }
}

impl_component!(Follower, reflect);

fn fresh_engine() -> SceneStateEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SceneStateEngine::new()
}

fn engine_with_follower() -> SceneStateEngine {
    let mut engine = fresh_engine();
    engine.register_reflected::<Follower>();
    engine
}

#[test]
fn roundtrip_restores_fields_and_hierarchy() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let player = scene.spawn("Player");
    scene.attach(player, Box::new(Transform::default()));
    let weapon = scene.spawn_child(player, "Weapon");
    scene.attach(
        weapon,
        Box::new(MeshRenderer {
            mesh: Some(Asset::new(AssetID::from_parts(1, 0), "Sword", AssetKind::Mesh)),
            material: None,
        }),
    );
    scene.ensure_identity(player, &engine.prefabs);

    scene
        .node_mut(player)
        .unwrap()
        .component_mut::<Transform>()
        .unwrap()
        .position = Vec3::new(3.0, 1.0, -2.0);
    let snapshot = engine.capture(&scene);

    // Scramble live state after the capture.
    scene
        .node_mut(player)
        .unwrap()
        .component_mut::<Transform>()
        .unwrap()
        .position = Vec3::ZERO;
    scene
        .node_mut(weapon)
        .unwrap()
        .component_mut::<MeshRenderer>()
        .unwrap()
        .mesh = None;

    engine.restore(&mut scene, snapshot);

    let position = scene
        .node(player)
        .unwrap()
        .component::<Transform>()
        .unwrap()
        .position;
    assert_eq!(position, Vec3::new(3.0, 1.0, -2.0));
    let mesh = scene
        .node(weapon)
        .unwrap()
        .component::<MeshRenderer>()
        .unwrap()
        .mesh
        .clone()
        .unwrap();
    assert_eq!(mesh.name, "Sword");
}

#[test]
fn forward_references_resolve_after_the_walk() {
    let mut scene = Scene::new();
    let mut engine = engine_with_follower();

    // Follower on the first-registered root points at the second root, so the
    // reference target is restored after its referrer.
    let a = scene.spawn("A");
    let b = scene.spawn("B");
    scene.attach(a, Box::new(Follower { target: b }));
    scene.ensure_identity(a, &engine.prefabs);
    scene.ensure_identity(b, &engine.prefabs);

    let snapshot = engine.capture(&scene);
    scene
        .node_mut(a)
        .unwrap()
        .component_mut::<Follower>()
        .unwrap()
        .target = NodeID::nil();

    engine.restore(&mut scene, snapshot);
    let target = scene.node(a).unwrap().component::<Follower>().unwrap().target;
    assert_eq!(target, b);
}

#[test]
fn reference_to_child_survives_roundtrip() {
    let mut scene = Scene::new();
    let mut engine = engine_with_follower();

    let root = scene.spawn("Rig");
    let head = scene.spawn_child(root, "Head");
    scene.attach(root, Box::new(Follower { target: head }));
    scene.ensure_identity(root, &engine.prefabs);

    let snapshot = engine.capture(&scene);
    scene
        .node_mut(root)
        .unwrap()
        .component_mut::<Follower>()
        .unwrap()
        .target = NodeID::nil();

    engine.restore(&mut scene, snapshot);
    let target = scene.node(root).unwrap().component::<Follower>().unwrap().target;
    assert_eq!(target, head);
}

#[test]
fn references_outside_the_captured_set_are_dropped() {
    let mut scene = Scene::new();
    let mut engine = engine_with_follower();

    let a = scene.spawn("A");
    let loose = scene.spawn("Loose");
    scene.attach(a, Box::new(Follower { target: loose }));
    scene.ensure_identity(a, &engine.prefabs);
    let pid = scene.node(a).unwrap().persistent_id().unwrap().to_string();

    // "Loose" is never registered, so its identity is never interned and the
    // reference field cannot be finalized.
    let snapshot = engine.capture(&scene);
    let root = snapshot.root_named(&pid).unwrap();
    assert!(root.components[0].fields.get("target").is_none());
}

#[test]
fn matched_nodes_are_reused_not_rebuilt() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let root = scene.spawn("Root");
    let a = scene.spawn_child(root, "A");
    let c = scene.spawn_child(root, "C");
    scene.ensure_identity(root, &engine.prefabs);

    let snapshot = engine.capture(&scene);
    let count_before = scene.len();
    engine.restore(&mut scene, snapshot);

    // Same IDs, no extra nodes.
    assert_eq!(scene.len(), count_before);
    assert_eq!(scene.node(root).unwrap().children, vec![a, c]);
}

#[test]
fn missing_sibling_is_created_in_position() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let root = scene.spawn("Root");
    let a = scene.spawn_child(root, "A");
    let b = scene.spawn_child(root, "B");
    let c = scene.spawn_child(root, "C");
    scene.ensure_identity(root, &engine.prefabs);
    let snapshot = engine.capture(&scene);

    // Live tree loses B; the snapshot still has [A, B, C].
    scene.destroy_subtree(b);
    engine.restore(&mut scene, snapshot);

    let children = scene.node(root).unwrap().children.clone();
    assert_eq!(children.len(), 3);
    // A and C kept their identities; B is a fresh node in the middle.
    assert_eq!(children[0], a);
    assert_eq!(scene.node(children[1]).unwrap().name, "B");
    assert_ne!(children[1], b);
    assert_eq!(children[2], c);
}

#[test]
fn missing_component_is_attached_in_order() {
    let mut scene = Scene::new();
    let mut engine = engine_with_follower();

    let root = scene.spawn("Root");
    scene.attach(root, Box::new(Transform::default()));
    scene.attach(root, Box::new(Follower::default()));
    scene.ensure_identity(root, &engine.prefabs);
    let snapshot = engine.capture(&scene);

    // Drop the leading Transform; the Follower slides to slot 0.
    scene.node_mut(root).unwrap().components.remove(0);
    engine.restore(&mut scene, snapshot);

    let node = scene.node(root).unwrap();
    assert_eq!(node.components.len(), 2);
    assert!(node.component::<Transform>().is_some());
    assert!(node.component::<Follower>().is_some());
}

#[test]
fn non_persistent_nodes_are_destroyed_on_restore() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let root = scene.spawn("Root");
    scene.ensure_identity(root, &engine.prefabs);
    let particles = scene.spawn("Particles");
    scene.node_mut(particles).unwrap().non_persistent = true;
    scene.set_active(particles, true);

    let snapshot = engine.capture(&scene);
    engine.restore(&mut scene, snapshot);

    assert!(scene.node(particles).is_none());
    assert!(scene.node(root).is_some());
}

#[test]
fn registered_nodes_absent_from_snapshot_follow_their_flag() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let root = scene.spawn("Root");
    scene.ensure_identity(root, &engine.prefabs);
    let snapshot = engine.capture(&scene);

    // Two newcomers the snapshot knows nothing about.
    let doomed = scene.spawn("Doomed");
    scene.ensure_identity(doomed, &engine.prefabs);
    let survivor = scene.spawn("Survivor");
    scene.ensure_identity(survivor, &engine.prefabs);
    if let Some(state) = scene.node_mut(survivor).unwrap().state.as_mut() {
        state.destroy_on_clear = false;
    }

    engine.restore(&mut scene, snapshot);
    assert!(scene.node(doomed).is_none());
    assert!(scene.node(survivor).is_some());
}

#[test]
fn prefab_bound_subtree_is_manufactured() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let proto = scene.spawn("Enemy");
    scene.attach(proto, Box::new(Transform::default()));
    let key = engine.prefabs.store_as_key(proto, "Enemy");

    let instance = scene.instantiate_prefab(&engine.prefabs, &key).unwrap();
    scene.ensure_identity(instance, &engine.prefabs);
    scene
        .node_mut(instance)
        .unwrap()
        .component_mut::<Transform>()
        .unwrap()
        .position = Vec3::new(10.0, 0.0, 4.0);
    let pid = scene
        .node(instance)
        .unwrap()
        .persistent_id()
        .unwrap()
        .to_string();

    let snapshot = engine.capture(&scene);
    assert_eq!(snapshot.states[&pid].identifier, Identifier::PrefabBound);

    // The instance is gone entirely; only the prototype remains.
    scene.destroy_subtree(instance);
    engine.restore(&mut scene, snapshot);

    let rebuilt = scene.node_by_persistent_id(&pid).expect("manufactured");
    assert_ne!(rebuilt, instance);
    assert_ne!(rebuilt, proto);
    let position = scene
        .node(rebuilt)
        .unwrap()
        .component::<Transform>()
        .unwrap()
        .position;
    assert_eq!(position, Vec3::new(10.0, 0.0, 4.0));
}

#[test]
fn instance_bound_subtrees_are_not_manufactured() {
    let mut scene = Scene::new();
    let mut engine = fresh_engine();

    let root = scene.spawn("Hero");
    scene.ensure_identity(root, &engine.prefabs);
    let pid = scene.node(root).unwrap().persistent_id().unwrap().to_string();
    let mut snapshot = engine.capture(&scene);

    scene.destroy_subtree(root);
    // Keep the record alive so the engine sees the identifier.
    snapshot.states.insert(
        pid.clone(),
        StateRecord {
            identifier: Identifier::InstanceBound,
            persistent_id: pid.clone(),
            prefab_key: String::new(),
            destroy_on_clear: true,
        },
    );
    engine.restore(&mut scene, snapshot);
    assert!(scene.node_by_persistent_id(&pid).is_none());
}

#[test]
fn quick_save_and_load_through_both_formats() {
    for format in [StoreFormat::Json, StoreFormat::Binary] {
        let dir = std::env::temp_dir().join(format!(
            "relic_roundtrip_{}_{}",
            format.extension(),
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let store = FileBlobStore::new(&dir, format);

        let mut scene = Scene::new();
        let mut engine = fresh_engine();
        let root = scene.spawn("Player");
        scene.attach(root, Box::new(Transform::default()));
        scene.ensure_identity(root, &engine.prefabs);
        scene
            .node_mut(root)
            .unwrap()
            .component_mut::<Transform>()
            .unwrap()
            .position = Vec3::splat(7.0);

        engine.quick_save(&scene, &store, "slot1").unwrap();
        scene
            .node_mut(root)
            .unwrap()
            .component_mut::<Transform>()
            .unwrap()
            .position = Vec3::ZERO;

        assert!(engine.quick_load(&mut scene, &store, "slot1").unwrap());
        let position = scene
            .node(root)
            .unwrap()
            .component::<Transform>()
            .unwrap()
            .position;
        assert_eq!(position, Vec3::splat(7.0));

        assert!(!engine.quick_load(&mut scene, &store, "empty").unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
