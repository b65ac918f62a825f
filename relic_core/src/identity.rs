//! Per-cycle bijection between live objects and stable string keys.
//! A table lives exactly as long as one capture or restore cycle; constructing
//! a fresh one is the reset that keeps stale keys from aliasing new objects.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use relic_ids::NodeID;

/// Reference identity of a live object: a node, or a component addressed by
/// its owning node and attachment slot. Compared by identity, never by value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ObjRef {
    Node(NodeID),
    Component(NodeID, u32),
}

impl ObjRef {
    #[inline]
    pub fn node_id(self) -> NodeID {
        match self {
            ObjRef::Node(id) => id,
            ObjRef::Component(id, _) => id,
        }
    }
}

/// Two-way map from live object identity to stable key.
///
/// During capture, `intern` mints keys on first sight. During restore the
/// snapshot already carries keys minted on the capture side; `bind` attaches
/// them to freshly reconciled objects so reference fields can resolve.
#[derive(Default)]
pub struct IdentityTable {
    by_object: FxHashMap<ObjRef, String>,
    by_key: FxHashMap<String, ObjRef>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing key for `obj` if it was seen this cycle, else mint
    /// a fresh one and record the association both ways.
    pub fn intern(&mut self, obj: ObjRef) -> String {
        if let Some(key) = self.by_object.get(&obj) {
            return key.clone();
        }
        let key = uuid::Uuid::new_v4().to_string();
        self.by_object.insert(obj, key.clone());
        self.by_key.insert(key.clone(), obj);
        key
    }

    /// Retroactively associate a snapshot-carried key with a live object.
    /// Used on the restore side, where objects come into existence after the
    /// keys referencing them were written.
    pub fn bind(&mut self, key: &str, obj: ObjRef) {
        if key.is_empty() {
            return;
        }
        self.by_key.insert(key.to_string(), obj);
        self.by_object.insert(obj, key.to_string());
    }

    pub fn resolve(&self, key: &str) -> Option<ObjRef> {
        self.by_key.get(key).copied()
    }

    pub fn key_of(&self, obj: ObjRef) -> Option<&str> {
        self.by_object.get(&obj).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
