//! Stable-key catalogs: prefab prototypes and external assets.
//! Both map an opaque string key to a live reference so object references in
//! snapshots stay portable across sessions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use relic_ids::{AssetID, NodeID};

/// Category of an external asset. Only the allow-listed categories below can
/// be stored by key; everything else is skipped during capture.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AssetKind {
    Mesh,
    Texture,
    Audio,
    Material,
    AnimationClip,
    /// Generic structured-data asset.
    Data,
    Shader,
    Scene,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Mesh => "Mesh",
            AssetKind::Texture => "Texture",
            AssetKind::Audio => "Audio",
            AssetKind::Material => "Material",
            AssetKind::AnimationClip => "AnimationClip",
            AssetKind::Data => "Data",
            AssetKind::Shader => "Shader",
            AssetKind::Scene => "Scene",
        }
    }
}

/// Lightweight handle to an external asset owned by the host.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Asset {
    pub id: AssetID,
    pub name: String,
    pub kind: AssetKind,
}

impl Asset {
    pub fn new(id: AssetID, name: &str, kind: AssetKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            kind,
        }
    }
}

const SUPPORTED_ASSET_KINDS: &[AssetKind] = &[
    AssetKind::Mesh,
    AssetKind::Texture,
    AssetKind::Audio,
    AssetKind::Material,
    AssetKind::AnimationClip,
    AssetKind::Data,
];

/// Registry of assets referenced by captured fields, keyed `Kind.Name`.
/// Entries are appended on first reference during capture; the host's
/// backing store is responsible for persisting the registry itself.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AssetCatalog {
    assets: IndexMap<String, Asset>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supports(kind: AssetKind) -> bool {
        SUPPORTED_ASSET_KINDS.contains(&kind)
    }

    /// Deterministic key for `asset`, recording the entry on first use.
    /// Returns `None` for unsupported categories; the caller omits the field.
    pub fn store_as_key(&mut self, asset: &Asset) -> Option<String> {
        if !Self::supports(asset.kind) {
            return None;
        }
        let key = Self::format_key(asset);
        self.assets.entry(key.clone()).or_insert_with(|| asset.clone());
        Some(key)
    }

    pub fn resolve(&self, key: &str) -> Option<&Asset> {
        self.assets.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.assets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn format_key(asset: &Asset) -> String {
        format!("{}.{}", asset.kind.as_str(), asset.name)
    }
}

/// Registry of pre-built prototype nodes, keyed `Node.Name.Index`.
/// Values are non-owning node IDs into the live arena; an entry whose node
/// has been destroyed is filtered out by callers before use.
#[derive(Clone, Debug, Default)]
pub struct PrefabCatalog {
    prefabs: IndexMap<String, NodeID>,
}

impl PrefabCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype under a deterministic key derived from its name,
    /// disambiguated by an explicit index when names collide. Idempotent per
    /// node identity: a prototype already cataloged keeps its key.
    pub fn store_as_key(&mut self, prototype: NodeID, name: &str) -> String {
        if let Some(key) = self.key_of(prototype) {
            return key.to_string();
        }
        let mut index = 0;
        loop {
            let key = Self::format_key(name, index);
            if !self.prefabs.contains_key(&key) {
                self.prefabs.insert(key.clone(), prototype);
                return key;
            }
            index += 1;
        }
    }

    pub fn resolve(&self, key: &str) -> Option<NodeID> {
        self.prefabs.get(key).copied()
    }

    /// Linear identity scan: is this live node one of our known prototypes?
    pub fn key_of(&self, node: NodeID) -> Option<&str> {
        self.prefabs
            .iter()
            .find(|&(_, &id)| id == node)
            .map(|(key, _)| key.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.prefabs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    pub fn format_key(name: &str, index: u32) -> String {
        format!("Node.{name}.{index}")
    }
}
