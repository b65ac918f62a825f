//! Storage-ready representation of nodes, components and whole scenes.
//! A snapshot owns its children exclusively until restore; after the inverse
//! walk resolves its keys into live references it can be discarded.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::identity::{IdentityTable, ObjRef};
use crate::value::FieldData;

/// Persistent identifier variant of a stateful node.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Identifier {
    /// Authoring-time/prototype object, never persisted.
    #[default]
    Unset,
    /// Freestanding live object.
    InstanceBound,
    /// Instance manufactured from a cataloged prototype.
    PrefabBound,
}

/// Durable lifecycle metadata persisted alongside each stateful subtree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StateRecord {
    pub identifier: Identifier,
    pub persistent_id: String,
    pub prefab_key: String,
    pub destroy_on_clear: bool,
}

impl Default for StateRecord {
    fn default() -> Self {
        Self {
            identifier: Identifier::Unset,
            persistent_id: String::new(),
            prefab_key: String::new(),
            destroy_on_clear: true,
        }
    }
}

/// Serialized form of one attached component.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ComponentSnapshot {
    pub type_name: String,
    pub qualified_type_name: String,
    /// Stable key minted for the live component at capture time.
    pub ref_key: String,
    pub fields: FieldData,

    #[serde(skip)]
    initialized: bool,
}

impl ComponentSnapshot {
    pub fn new(type_name: &str, qualified_type_name: &str, ref_key: String) -> Self {
        Self {
            type_name: type_name.to_string(),
            qualified_type_name: qualified_type_name.to_string(),
            ref_key,
            fields: FieldData::default(),
            initialized: false,
        }
    }

    /// Second phase of identity binding: associate the snapshot's key with
    /// the reconciled live component. Idempotent.
    pub fn init(&mut self, identities: &mut IdentityTable, obj: ObjRef) {
        if self.initialized {
            return;
        }
        identities.bind(&self.ref_key, obj);
        self.initialized = true;
    }
}

/// Serialized form of one tree node: name, own field data, attached
/// components in attachment order, children in sibling order.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeSnapshot {
    pub name: String,
    /// Stable key minted for the live node at capture time.
    pub ref_key: String,
    pub fields: FieldData,
    pub components: Vec<ComponentSnapshot>,
    pub children: Vec<NodeSnapshot>,

    #[serde(skip)]
    initialized: bool,
}

impl NodeSnapshot {
    pub fn new(name: &str, ref_key: String) -> Self {
        Self {
            name: name.to_string(),
            ref_key,
            fields: FieldData::default(),
            components: Vec::new(),
            children: Vec::new(),
            initialized: false,
        }
    }

    /// Second phase of identity binding for the node itself. Idempotent.
    pub fn init(&mut self, identities: &mut IdentityTable, obj: ObjRef) {
        if self.initialized {
            return;
        }
        identities.bind(&self.ref_key, obj);
        self.initialized = true;
    }
}

/// One full capture of all registered stateful subtrees.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SceneSnapshot {
    /// (persistent identifier, root snapshot) pairs, in registration order.
    pub roots: Vec<(String, NodeSnapshot)>,
    /// Persistent identifier -> persisted lifecycle metadata.
    pub states: IndexMap<String, StateRecord>,
}

impl SceneSnapshot {
    pub fn root_named(&self, persistent_id: &str) -> Option<&NodeSnapshot> {
        self.roots
            .iter()
            .find(|(pid, _)| pid == persistent_id)
            .map(|(_, snap)| snap)
    }
}
