//! Snapshot engine: walks registered stateful subtrees into snapshots and
//! reconciles snapshots back onto the live tree.
//!
//! Both directions are two-phase. Capture interns every object before any
//! field data is written, then a finalize pass patches pending reference
//! placeholders into stable keys. Restore binds snapshot keys to reconciled
//! objects as it walks, then re-dispatches the reference fields that could
//! not resolve until the whole tree existed.

use indexmap::IndexMap;
use log::{debug, warn};

use relic_ids::NodeID;

use crate::catalog::{AssetCatalog, PrefabCatalog};
use crate::convert::{
    ApplyFn, CaptureFn, ComponentFactories, ConverterRegistry, DeferredApply, DispatchKind,
    Handler, LoadContext, SaveContext,
};
use crate::error::Result;
use crate::identity::{IdentityTable, ObjRef};
use crate::nodes::component::Component;
use crate::scene::Scene;
use crate::snapshot::{ComponentSnapshot, Identifier, NodeSnapshot, SceneSnapshot, StateRecord};
use crate::store::BlobStore;
use crate::value::{self, FieldData, FieldValue};

pub struct SceneStateEngine {
    registry: ConverterRegistry,
    factories: ComponentFactories,
    pub prefabs: PrefabCatalog,
    pub assets: AssetCatalog,
}

impl SceneStateEngine {
    pub fn new() -> Self {
        Self {
            registry: ConverterRegistry::with_builtins(),
            factories: ComponentFactories::with_builtins(),
            prefabs: PrefabCatalog::new(),
            assets: AssetCatalog::new(),
        }
    }

    /// Register a converter pair for a host-defined component type, plus its
    /// factory so snapshots can manufacture it on nodes that lack it.
    pub fn register_component<C: Component + Default>(&mut self, capture: CaptureFn, apply: ApplyFn) {
        self.registry.register_for::<C>(capture, apply);
        self.factories.register::<C>();
    }

    /// Register a `FieldAccess` component with no bespoke converter; it will
    /// go through the fallback pair.
    pub fn register_reflected<C: Component + Default>(&mut self) {
        self.factories.register::<C>();
    }

    // ---- Capture ----

    /// Snapshot every registered stateful subtree, in registration order.
    /// The identity table lives only for this call; each capture starts from
    /// a clean slate.
    pub fn capture(&mut self, scene: &Scene) -> SceneSnapshot {
        let mut identities = IdentityTable::new();
        let mut snapshot = SceneSnapshot::default();

        let roots: Vec<(String, NodeID)> = scene
            .registered()
            .map(|(pid, id)| (pid.clone(), id))
            .collect();

        for (pid, id) in &roots {
            let mut cx = SaveContext {
                identities: &mut identities,
                prefabs: &self.prefabs,
                assets: &mut self.assets,
            };
            if let Some(snap) = capture_node(&self.registry, scene, *id, &mut cx) {
                snapshot.roots.push((pid.clone(), snap));
            }
            if let Some(state) = scene.node(*id).and_then(|n| n.state.clone()) {
                snapshot.states.insert(pid.clone(), state);
            }
        }

        for (_, root) in &mut snapshot.roots {
            finalize_capture(root, &identities);
        }
        snapshot
    }

    // ---- Restore ----

    /// Merge a snapshot onto the live scene.
    ///
    /// Non-persistent nodes and registered nodes absent from the snapshot
    /// (when flagged destroy-on-clear) are destroyed first. Each snapshot
    /// root then reconciles onto the live node registered under the same
    /// durable identifier, or is manufactured from its prototype when the
    /// identifier is prefab-bound and nothing live answers to it.
    pub fn restore(&mut self, scene: &mut Scene, mut snapshot: SceneSnapshot) {
        scene.purge_non_persistent();
        scene.purge_missing(&snapshot.states);

        let mut identities = IdentityTable::new();
        let mut deferred: Vec<DeferredApply> = Vec::new();

        for (pid, root_snap) in &mut snapshot.roots {
            let id = match scene.node_by_persistent_id(pid) {
                Some(id) => {
                    // Adopt the persisted lifecycle record.
                    if let Some(state) = snapshot.states.get(pid.as_str()) {
                        scene.override_state(id, state.clone());
                    }
                    id
                }
                None => match self.manufacture(scene, pid, &snapshot.states) {
                    Some(id) => id,
                    None => continue,
                },
            };
            let mut cx = LoadContext {
                identities: &mut identities,
                prefabs: &self.prefabs,
                assets: &self.assets,
                deferred: &mut deferred,
                current: ObjRef::Node(id),
                finalizing: false,
            };
            restore_node(&self.registry, &self.factories, scene, id, root_snap, &mut cx);
        }

        self.finalize_restore(scene, &mut identities, deferred);
    }

    /// Rebuild a missing stateful subtree from its cataloged prototype.
    /// Instance-bound identifiers cannot be manufactured; their data stays in
    /// the snapshot untouched until something live claims the identifier.
    fn manufacture(
        &self,
        scene: &mut Scene,
        pid: &str,
        states: &IndexMap<String, StateRecord>,
    ) -> Option<NodeID> {
        let state = states.get(pid)?;
        if state.identifier != Identifier::PrefabBound {
            return None;
        }
        let Some(id) = scene.instantiate_prefab(&self.prefabs, &state.prefab_key) else {
            warn!(
                "prototype '{}' for '{pid}' is not cataloged; subtree skipped",
                state.prefab_key
            );
            return None;
        };
        scene.override_state(id, state.clone());
        Some(id)
    }

    /// Post-walk pass: re-dispatch every reference field that was deferred
    /// because its target did not exist yet. A key still unresolvable now
    /// refers to something outside the snapshot and is dropped.
    fn finalize_restore(
        &self,
        scene: &mut Scene,
        identities: &mut IdentityTable,
        deferred: Vec<DeferredApply>,
    ) {
        let mut sink: Vec<DeferredApply> = Vec::new();
        for item in deferred {
            let ObjRef::Component(node_id, slot) = item.owner else {
                continue;
            };
            let mut mini = FieldData::default();
            mini.insert(item.field.clone(), FieldValue::Ref(item.key.clone()));
            let mut cx = LoadContext {
                identities: &mut *identities,
                prefabs: &self.prefabs,
                assets: &self.assets,
                deferred: &mut sink,
                current: item.owner,
                finalizing: true,
            };
            let Some(node) = scene.node_mut(node_id) else {
                continue;
            };
            let Some(component) = node.components.get_mut(slot as usize) else {
                continue;
            };
            let ty = component.as_any().type_id();
            let capable = component.field_access().is_some();
            if let Some(Handler::Apply(apply)) = self.registry.dispatch(DispatchKind::Apply, ty, capable)
            {
                apply(component.as_mut(), &mini, &mut cx);
            }
        }
    }

    // ---- Persistence shortcuts ----

    pub fn quick_save<S: BlobStore>(&mut self, scene: &Scene, store: &S, slot: &str) -> Result<()> {
        let snapshot = self.capture(scene);
        store.save(slot, &snapshot)
    }

    /// Returns `false` when no blob exists under `slot`.
    pub fn quick_load<S: BlobStore>(
        &mut self,
        scene: &mut Scene,
        store: &S,
        slot: &str,
    ) -> Result<bool> {
        match store.load(slot)? {
            Some(snapshot) => {
                self.restore(scene, snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for SceneStateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Capture walk ----

fn capture_node(
    registry: &ConverterRegistry,
    scene: &Scene,
    id: NodeID,
    cx: &mut SaveContext,
) -> Option<NodeSnapshot> {
    let node = scene.node(id)?;
    // Interned before any field data is written, so self- and back-references
    // within the subtree always find a key.
    let key = cx.identities.intern(ObjRef::Node(id));
    let mut snap = NodeSnapshot::new(&node.name, key);
    value::put(&mut snap.fields, "active", &node.active);
    value::put(&mut snap.fields, "layer", &node.layer);

    for (slot, component) in node.components.iter().enumerate() {
        let obj = ObjRef::Component(id, slot as u32);
        let ckey = cx.identities.intern(obj);
        let mut csnap =
            ComponentSnapshot::new(component.type_name(), component.qualified_name(), ckey);
        let ty = component.as_any().type_id();
        let capable = component.field_access().is_some();
        if let Some(Handler::Capture(capture)) = registry.dispatch(DispatchKind::Capture, ty, capable)
        {
            capture(component.as_ref(), &mut csnap.fields, cx);
        }
        snap.components.push(csnap);
    }

    for &child in &node.children {
        if let Some(child_snap) = capture_node(registry, scene, child, cx) {
            snap.children.push(child_snap);
        }
    }
    Some(snap)
}

fn finalize_capture(snap: &mut NodeSnapshot, identities: &IdentityTable) {
    patch_pending(&mut snap.fields, identities);
    for component in &mut snap.components {
        patch_pending(&mut component.fields, identities);
    }
    for child in &mut snap.children {
        finalize_capture(child, identities);
    }
}

fn patch_pending(data: &mut FieldData, identities: &IdentityTable) {
    let pending: Vec<(String, ObjRef)> = data
        .iter()
        .filter_map(|(field, v)| match v {
            FieldValue::Pending(obj) => Some((field.clone(), *obj)),
            _ => None,
        })
        .collect();
    for (field, obj) in pending {
        match identities.key_of(obj) {
            Some(key) => {
                data.insert(field, FieldValue::Ref(key.to_string()));
            }
            None => {
                debug!("reference in field '{field}' points outside the captured set; dropped");
                data.shift_remove(&field);
            }
        }
    }
}

// ---- Restore walk ----

/// Reconcile one snapshot node onto a live node, then its components and
/// children positionally.
///
/// Both lists use the same left-to-right scan: snapshot entry `i` matches the
/// pre-existing entry at `i` minus the number of entries created so far, by
/// name for children and by qualified type name for components. A mismatch
/// creates the snapshot's entry at that position and leaves the live entry
/// for a later snapshot entry to claim. Surplus live entries are kept.
fn restore_node(
    registry: &ConverterRegistry,
    factories: &ComponentFactories,
    scene: &mut Scene,
    id: NodeID,
    snap: &mut NodeSnapshot,
    cx: &mut LoadContext,
) {
    snap.init(cx.identities, ObjRef::Node(id));

    if let Some(node) = scene.node_mut(id) {
        node.name = snap.name.clone();
        if let Some(layer) = value::get(&snap.fields, "layer") {
            node.layer = layer;
        }
    }
    if let Some(active) = value::get(&snap.fields, "active") {
        scene.set_active(id, active);
    }

    // The pre-existing component list, fixed before reconciliation; created
    // components append and never disturb these positions.
    let existing: Vec<String> = scene
        .node(id)
        .map(|n| {
            n.components
                .iter()
                .map(|c| c.qualified_name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut appended = 0usize;
    for (i, csnap) in snap.components.iter_mut().enumerate() {
        let cursor = i - appended;
        let slot = if cursor >= existing.len() || existing[cursor] != csnap.qualified_type_name {
            appended += 1;
            match factories.construct(&csnap.qualified_type_name) {
                Some(built) => scene.attach(id, built),
                None => {
                    warn!(
                        "no factory for component '{}'; snapshot entry skipped",
                        csnap.qualified_type_name
                    );
                    continue;
                }
            }
        } else {
            cursor
        };

        let obj = ObjRef::Component(id, slot as u32);
        csnap.init(cx.identities, obj);
        cx.current = obj;
        let Some(node) = scene.node_mut(id) else {
            return;
        };
        let Some(component) = node.components.get_mut(slot) else {
            continue;
        };
        let ty = component.as_any().type_id();
        let capable = component.field_access().is_some();
        if let Some(Handler::Apply(apply)) = registry.dispatch(DispatchKind::Apply, ty, capable) {
            apply(component.as_mut(), &csnap.fields, cx);
        }
    }

    // Same scan over children, matched by name.
    let existing_children: Vec<(NodeID, String)> = scene
        .node(id)
        .map(|n| {
            n.children
                .iter()
                .filter_map(|&c| scene.node(c).map(|cn| (c, cn.name.clone())))
                .collect()
        })
        .unwrap_or_default();

    let mut created = 0usize;
    for (i, child_snap) in snap.children.iter_mut().enumerate() {
        let cursor = i - created;
        let child_id = if cursor >= existing_children.len()
            || existing_children[cursor].1 != child_snap.name
        {
            created += 1;
            scene.spawn_child_at(id, &child_snap.name, i)
        } else {
            existing_children[cursor].0
        };
        restore_node(registry, factories, scene, child_id, child_snap, cx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Transform;
    use glam::Vec3;

    #[test]
    fn capture_skips_unregistered_nodes() {
        let mut scene = Scene::new();
        let mut engine = SceneStateEngine::new();
        scene.spawn("Loose");
        let snapshot = engine.capture(&scene);
        assert!(snapshot.roots.is_empty());
        assert!(snapshot.states.is_empty());
    }

    #[test]
    fn capture_walks_registered_subtrees() {
        let mut scene = Scene::new();
        let mut engine = SceneStateEngine::new();
        let root = scene.spawn("Player");
        scene.attach(root, Box::new(Transform::default()));
        scene.spawn_child(root, "Weapon");
        scene.ensure_identity(root, &engine.prefabs);

        let snapshot = engine.capture(&scene);
        assert_eq!(snapshot.roots.len(), 1);
        let (pid, snap) = &snapshot.roots[0];
        assert_eq!(snap.name, "Player");
        assert_eq!(snap.components.len(), 1);
        assert_eq!(snap.children.len(), 1);
        assert!(snapshot.states.contains_key(pid.as_str()));
    }

    #[test]
    fn restore_applies_component_fields_in_place() {
        let mut scene = Scene::new();
        let mut engine = SceneStateEngine::new();
        let root = scene.spawn("Player");
        scene.attach(root, Box::new(Transform::default()));
        scene.ensure_identity(root, &engine.prefabs);

        scene
            .node_mut(root)
            .unwrap()
            .component_mut::<Transform>()
            .unwrap()
            .position = Vec3::new(5.0, 0.0, 1.0);
        let snapshot = engine.capture(&scene);

        // Mutate after capture, then restore.
        scene
            .node_mut(root)
            .unwrap()
            .component_mut::<Transform>()
            .unwrap()
            .position = Vec3::ZERO;
        engine.restore(&mut scene, snapshot);

        let position = scene
            .node(root)
            .unwrap()
            .component::<Transform>()
            .unwrap()
            .position;
        assert_eq!(position, Vec3::new(5.0, 0.0, 1.0));
    }

    #[test]
    fn restore_manufactures_missing_components() {
        let mut scene = Scene::new();
        let mut engine = SceneStateEngine::new();
        let root = scene.spawn("Player");
        scene.attach(root, Box::new(Transform::default()));
        scene.ensure_identity(root, &engine.prefabs);
        let snapshot = engine.capture(&scene);

        // Lose the component; restore must rebuild it.
        scene.node_mut(root).unwrap().components.clear();
        engine.restore(&mut scene, snapshot);
        assert!(scene.node(root).unwrap().component::<Transform>().is_some());
    }
}
