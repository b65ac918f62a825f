//! Scene-state capture and reconciliation.
//!
//! A [`Scene`] holds the live node tree. A [`SceneStateEngine`] walks the
//! registered stateful subtrees into [`SceneSnapshot`]s and merges snapshots
//! back onto the live tree, reconciling by position instead of rebuilding.
//! Object references survive the trip as stable keys minted per cycle;
//! prefab and asset references go through the engine's catalogs.

pub mod catalog;
pub mod convert;
pub mod engine;
pub mod error;
pub mod identity;
pub mod node_arena;
pub mod nodes;
pub mod scene;
pub mod snapshot;
pub mod store;
pub mod value;

pub use catalog::{Asset, AssetCatalog, AssetKind, PrefabCatalog};
pub use convert::{ComponentFactories, ConverterRegistry, LoadContext, SaveContext};
pub use engine::SceneStateEngine;
pub use error::{Result, StateError};
pub use identity::{IdentityTable, ObjRef};
pub use node_arena::NodeArena;
pub use nodes::{Animator, Component, FieldAccess, MeshRenderer, Node, Transform};
pub use scene::Scene;
pub use snapshot::{ComponentSnapshot, Identifier, NodeSnapshot, SceneSnapshot, StateRecord};
pub use store::{BlobStore, FileBlobStore, StoreFormat};
pub use value::{FieldData, FieldValue};
