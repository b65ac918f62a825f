//! Live scene world: the node arena, detached roots, the live-identity index
//! of registered stateful subtrees, and the non-persistent tracking list.

use indexmap::IndexMap;
use log::warn;
use uuid::Uuid;

use relic_ids::NodeID;

use crate::catalog::PrefabCatalog;
use crate::node_arena::NodeArena;
use crate::nodes::component::Component;
use crate::nodes::node::Node;
use crate::snapshot::{Identifier, StateRecord};

pub struct Scene {
    arena: NodeArena,
    /// Nodes with a nil parent, in creation order. Prototypes live here too.
    pub roots: Vec<NodeID>,
    /// Durable identifier -> currently-enabled identity-bearing node.
    /// Non-owning back-references, maintained by the activation protocol.
    live_index: IndexMap<String, NodeID>,
    /// Nodes flagged non-persistent, forcibly destroyed on snapshot merge.
    non_persistent: Vec<NodeID>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            roots: Vec::new(),
            live_index: IndexMap::new(),
            non_persistent: Vec::new(),
        }
    }

    // ---- Tree construction ----

    /// Create a detached root node.
    pub fn spawn(&mut self, name: &str) -> NodeID {
        let id = self.arena.alloc(Node::new(name));
        self.roots.push(id);
        id
    }

    /// Create a child at the end of the parent's child list.
    pub fn spawn_child(&mut self, parent: NodeID, name: &str) -> NodeID {
        self.spawn_child_at(parent, name, usize::MAX)
    }

    /// Create a child at the given sibling position (clamped).
    /// Panics if `parent` is not alive; creating under a destroyed node is a
    /// caller bug, as with stale arena inserts.
    pub fn spawn_child_at(&mut self, parent: NodeID, name: &str, index: usize) -> NodeID {
        let mut node = Node::new(name);
        node.parent = parent;
        let id = self.arena.alloc(node);
        let Some(parent_node) = self.arena.get_mut(parent) else {
            panic!("Scene::spawn_child_at: parent {parent:?} is not alive");
        };
        let at = index.min(parent_node.children.len());
        parent_node.children.insert(at, id);
        id
    }

    /// Attach a component, returning its attachment slot.
    /// Panics if the node is not alive.
    pub fn attach(&mut self, id: NodeID, component: Box<dyn Component>) -> usize {
        let Some(node) = self.arena.get_mut(id) else {
            panic!("Scene::attach: node {id:?} is not alive");
        };
        node.components.push(component);
        node.components.len() - 1
    }

    // ---- Access ----

    #[inline]
    pub fn node(&self, id: NodeID) -> Option<&Node> {
        self.arena.get(id)
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeID) -> Option<&mut Node> {
        self.arena.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn node_by_persistent_id(&self, persistent_id: &str) -> Option<NodeID> {
        self.live_index.get(persistent_id).copied()
    }

    /// Registered stateful subtrees in registration order.
    pub fn registered(&self) -> impl Iterator<Item = (&String, NodeID)> {
        self.live_index.iter().map(|(pid, &id)| (pid, id))
    }

    pub fn registered_count(&self) -> usize {
        self.live_index.len()
    }

    // ---- Persistent identity ----

    /// Assign the node's persistent identity on first observation.
    ///
    /// Catalog prototypes stay `Unset` and are never persisted. A node whose
    /// nearest enclosing prototype root is cataloged becomes `PrefabBound`
    /// with that key; anything else becomes `InstanceBound`. The variant is
    /// terminal while the node is alive. A freshly bound node with no durable
    /// identifier gets a minted one.
    pub fn ensure_identity(&mut self, id: NodeID, prefabs: &PrefabCatalog) {
        if prefabs.key_of(id).is_some() {
            if let Some(node) = self.arena.get_mut(id) {
                let state = node.state.get_or_insert_with(StateRecord::default);
                state.identifier = Identifier::Unset;
                state.persistent_id.clear();
                state.prefab_key.clear();
            }
            return;
        }

        let enclosing = self.nearest_prefab_key(id, prefabs);
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        let state = node.state.get_or_insert_with(StateRecord::default);
        if state.persistent_id.is_empty() {
            state.persistent_id = Uuid::new_v4().to_string();
        }
        if state.identifier == Identifier::Unset {
            state.identifier = match enclosing {
                Some(key) => {
                    state.prefab_key = key;
                    Identifier::PrefabBound
                }
                None => Identifier::InstanceBound,
            };
        }
        let active = node.active;
        if active {
            self.register(id);
        }
    }

    /// Walk from the node upward looking for a cataloged prototype root.
    fn nearest_prefab_key(&self, id: NodeID, prefabs: &PrefabCatalog) -> Option<String> {
        let mut current = id;
        while !current.is_nil() {
            let node = self.arena.get(current)?;
            if let Some(key) = &node.prefab_source {
                if prefabs.contains_key(key) {
                    return Some(key.clone());
                }
            }
            if current != id {
                if let Some(key) = prefabs.key_of(current) {
                    return Some(key.to_string());
                }
            }
            current = node.parent;
        }
        None
    }

    /// Replace the node's state record wholesale (used when a manufactured
    /// instance adopts the persisted record of the object it stands in for).
    pub fn override_state(&mut self, id: NodeID, record: StateRecord) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        node.state = Some(record);
        let active = node.active;
        if active {
            self.register(id);
        }
    }

    // ---- Activation protocol ----

    /// Enable or disable a node. Enabling an identity-bearing node registers
    /// it in the live-identity index; disabling deregisters it. Non-persistent
    /// nodes enter and leave the separate tracking list the same way.
    pub fn set_active(&mut self, id: NodeID, active: bool) {
        let Some(node) = self.arena.get_mut(id) else {
            return;
        };
        node.active = active;
        let non_persistent = node.non_persistent;
        if active {
            self.register(id);
            if non_persistent && !self.non_persistent.contains(&id) {
                self.non_persistent.push(id);
            }
        } else {
            self.deregister(id);
            self.non_persistent.retain(|&n| n != id);
        }
    }

    fn register(&mut self, id: NodeID) {
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let Some(state) = node.state.as_ref() else {
            return;
        };
        if state.identifier == Identifier::Unset || state.persistent_id.is_empty() {
            return;
        }
        let pid = state.persistent_id.clone();
        match self.live_index.get(&pid) {
            // First registrant under a given identifier wins.
            Some(&existing) if existing != id => {
                warn!("identity conflict: '{pid}' already registered to {existing:?}, rejecting {id:?}");
            }
            _ => {
                self.live_index.insert(pid, id);
            }
        }
    }

    fn deregister(&mut self, id: NodeID) {
        self.live_index.retain(|_, &mut registered| registered != id);
    }

    // ---- Destruction ----

    /// Destroy a node and its whole subtree, deregistering as it goes.
    pub fn destroy_subtree(&mut self, id: NodeID) {
        let Some(node) = self.arena.get(id) else {
            return;
        };
        let parent = node.parent;
        if parent.is_nil() {
            self.roots.retain(|&r| r != id);
        } else if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children.retain(|&c| c != id);
        }
        self.destroy_recursive(id);
    }

    fn destroy_recursive(&mut self, id: NodeID) {
        let children = self
            .arena
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.destroy_recursive(child);
        }
        self.deregister(id);
        self.non_persistent.retain(|&n| n != id);
        self.arena.remove(id);
    }

    /// Destroy every tracked non-persistent node.
    pub fn purge_non_persistent(&mut self) {
        let doomed = std::mem::take(&mut self.non_persistent);
        for id in doomed {
            self.destroy_subtree(id);
        }
    }

    /// Destroy registered nodes whose durable identifier is absent from the
    /// incoming snapshot and that are flagged destroy-on-clear. Runs before
    /// snapshot data is merged in.
    pub fn purge_missing(&mut self, states: &IndexMap<String, StateRecord>) {
        let doomed: Vec<NodeID> = self
            .live_index
            .iter()
            .filter(|&(pid, &id)| {
                !states.contains_key(pid.as_str())
                    && self
                        .arena
                        .get(id)
                        .and_then(|n| n.state.as_ref())
                        .is_some_and(|s| s.destroy_on_clear)
            })
            .map(|(_, &id)| id)
            .collect();
        for id in doomed {
            self.destroy_subtree(id);
        }
    }

    // ---- Prefab manufacture ----

    /// Deep-clone a cataloged prototype into a new detached instance.
    /// Returns `None` when the key is unknown or the prototype node is gone
    /// (stale catalog entries are filtered here, before use).
    pub fn instantiate_prefab(&mut self, prefabs: &PrefabCatalog, key: &str) -> Option<NodeID> {
        let prototype = prefabs.resolve(key)?;
        if !self.arena.contains(prototype) {
            return None;
        }
        let id = self.clone_subtree(prototype, NodeID::nil())?;
        if let Some(node) = self.arena.get_mut(id) {
            node.prefab_source = Some(key.to_string());
        }
        Some(id)
    }

    fn clone_subtree(&mut self, src: NodeID, parent: NodeID) -> Option<NodeID> {
        let (name, active, layer, non_persistent, components, children) = {
            let node = self.arena.get(src)?;
            (
                node.name.clone(),
                node.active,
                node.layer,
                node.non_persistent,
                node.components.clone(),
                node.children.clone(),
            )
        };
        let mut node = Node::new(&name);
        node.active = active;
        node.layer = layer;
        node.non_persistent = non_persistent;
        node.components = components;
        node.parent = parent;
        let id = self.arena.alloc(node);
        if parent.is_nil() {
            self.roots.push(id);
        } else if let Some(parent_node) = self.arena.get_mut(parent) {
            parent_node.children.push(id);
        }
        for child in children {
            self.clone_subtree(child, id);
        }
        Some(id)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
