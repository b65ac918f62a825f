//! Type-directed converter dispatch.
//!
//! Converters are plain function pairs keyed by `TypeId`: one extracts a
//! component's state into a field-data map, the other applies a map back.
//! Resolution is exact match, else the registered fallback when the component
//! opts into the [`FieldAccess`](crate::nodes::FieldAccess) capability, else
//! no-op (the object is still walked for hierarchy and identity, it just
//! contributes no field data).

pub mod builtin;

use std::any::TypeId;

use log::debug;
use rustc_hash::FxHashMap;

use crate::catalog::{Asset, AssetCatalog, PrefabCatalog};
use crate::identity::{IdentityTable, ObjRef};
use crate::nodes::component::Component;
use crate::value::{FieldData, FieldValue};
use relic_ids::NodeID;

pub type CaptureFn = fn(&dyn Component, &mut FieldData, &mut SaveContext);
pub type ApplyFn = fn(&mut dyn Component, &FieldData, &mut LoadContext);

#[derive(Clone, Copy)]
pub struct ConverterPair {
    pub capture: CaptureFn,
    pub apply: ApplyFn,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DispatchKind {
    Capture,
    Apply,
}

/// A resolved handler for one dispatch direction.
#[derive(Clone, Copy)]
pub enum Handler {
    Capture(CaptureFn),
    Apply(ApplyFn),
}

/// Append-only mapping from concrete component type to converter pair,
/// populated once at startup.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: FxHashMap<TypeId, ConverterPair>,
    fallback: Option<ConverterPair>,
    populated: bool,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.populate_builtins();
        registry
    }

    /// One-time population of the built-in converter set. Repeated calls are
    /// free.
    pub fn populate_builtins(&mut self) {
        if self.populated {
            return;
        }
        self.populated = true;
        builtin::register_builtin_converters(self);
    }

    pub fn register(&mut self, ty: TypeId, capture: CaptureFn, apply: ApplyFn) {
        self.converters.insert(ty, ConverterPair { capture, apply });
    }

    /// Register a converter pair for a concrete component type.
    pub fn register_for<C: Component>(&mut self, capture: CaptureFn, apply: ApplyFn) {
        self.register(TypeId::of::<C>(), capture, apply);
    }

    /// Register the pair used for any component that opts into `FieldAccess`
    /// and has no exact converter.
    pub fn register_fallback(&mut self, capture: CaptureFn, apply: ApplyFn) {
        self.fallback = Some(ConverterPair { capture, apply });
    }

    /// Exact match, else fallback when the component satisfies the fallback
    /// capability, else `None`.
    pub fn resolve(&self, ty: TypeId, fallback_capable: bool) -> Option<ConverterPair> {
        if let Some(pair) = self.converters.get(&ty) {
            return Some(*pair);
        }
        if fallback_capable {
            return self.fallback;
        }
        None
    }

    pub fn dispatch(
        &self,
        kind: DispatchKind,
        ty: TypeId,
        fallback_capable: bool,
    ) -> Option<Handler> {
        let pair = self.resolve(ty, fallback_capable)?;
        Some(match kind {
            DispatchKind::Capture => Handler::Capture(pair.capture),
            DispatchKind::Apply => Handler::Apply(pair.apply),
        })
    }
}

/// Qualified type name -> constructor, used to attach components that exist
/// in a snapshot but not on the live node. Populated once alongside the
/// converter registry.
#[derive(Default)]
pub struct ComponentFactories {
    ctors: FxHashMap<String, fn() -> Box<dyn Component>>,
    populated: bool,
}

impl ComponentFactories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut factories = Self::new();
        factories.populate_builtins();
        factories
    }

    pub fn populate_builtins(&mut self) {
        if self.populated {
            return;
        }
        self.populated = true;
        builtin::register_builtin_factories(self);
    }

    pub fn register<C: Component + Default>(&mut self) {
        let ctor: fn() -> Box<dyn Component> = || Box::new(C::default());
        // A throwaway instance is the only way to read the qualified name of
        // an object-safe trait method.
        let name = C::default().qualified_name().to_string();
        self.ctors.insert(name, ctor);
    }

    pub fn construct(&self, qualified_name: &str) -> Option<Box<dyn Component>> {
        self.ctors.get(qualified_name).map(|ctor| ctor())
    }
}

/// Per-cycle capture context handed to every capture converter.
/// Constructing one (with a fresh identity table) is the cycle reset.
pub struct SaveContext<'a> {
    pub identities: &'a mut IdentityTable,
    pub prefabs: &'a PrefabCatalog,
    pub assets: &'a mut AssetCatalog,
}

impl SaveContext<'_> {
    /// Write an object-reference field. A cataloged prototype becomes its
    /// catalog key immediately; any other live object is left pending and
    /// patched once the whole walk has interned everything.
    pub fn store_reference(&mut self, data: &mut FieldData, field: &str, target: ObjRef) {
        if let ObjRef::Node(id) = target {
            if let Some(key) = self.prefabs.key_of(id) {
                data.insert(field.to_string(), FieldValue::Ref(key.to_string()));
                return;
            }
        }
        data.insert(field.to_string(), FieldValue::Pending(target));
    }

    pub fn store_node_reference(&mut self, data: &mut FieldData, field: &str, target: NodeID) {
        self.store_reference(data, field, ObjRef::Node(target));
    }

    /// Write an asset-reference field, creating the catalog entry on first
    /// reference. An unsupported asset category is skipped.
    pub fn store_asset(&mut self, data: &mut FieldData, field: &str, asset: &Asset) {
        match self.assets.store_as_key(asset) {
            Some(key) => {
                data.insert(field.to_string(), FieldValue::Ref(key));
            }
            None => debug!(
                "asset '{}' of kind {:?} is not storable; field '{field}' omitted",
                asset.name, asset.kind
            ),
        }
    }
}

/// A reference field that could not be resolved when its owner was applied:
/// re-dispatched once the whole walk has bound every identity.
#[derive(Clone, Debug)]
pub struct DeferredApply {
    pub owner: ObjRef,
    pub field: String,
    pub key: String,
}

/// Per-cycle restore context handed to every apply converter.
pub struct LoadContext<'a> {
    pub identities: &'a mut IdentityTable,
    pub prefabs: &'a PrefabCatalog,
    pub assets: &'a AssetCatalog,
    pub deferred: &'a mut Vec<DeferredApply>,
    /// Object whose fields are currently being applied; owner recorded on
    /// deferral.
    pub current: ObjRef,
    /// Set for the post-walk pass; a miss at that point is dropped instead of
    /// requeued.
    pub finalizing: bool,
}

impl LoadContext<'_> {
    /// Resolve an object-reference field. Prefab keys resolve through the
    /// catalog; everything else through the identity table. An unresolvable
    /// key is queued for the post-walk pass.
    pub fn resolve_reference(&mut self, data: &FieldData, field: &str) -> Option<ObjRef> {
        let key = data.get(field)?.as_ref_key()?;
        if let Some(id) = self.prefabs.resolve(key) {
            return Some(ObjRef::Node(id));
        }
        if let Some(obj) = self.identities.resolve(key) {
            return Some(obj);
        }
        if self.finalizing {
            debug!("reference key '{key}' in field '{field}' never bound; dropped");
        } else {
            self.deferred.push(DeferredApply {
                owner: self.current,
                field: field.to_string(),
                key: key.to_string(),
            });
        }
        None
    }

    pub fn resolve_node_reference(&mut self, data: &FieldData, field: &str) -> Option<NodeID> {
        match self.resolve_reference(data, field)? {
            ObjRef::Node(id) => Some(id),
            ObjRef::Component(..) => None,
        }
    }

    /// Resolve an asset-reference field through the asset catalog.
    pub fn resolve_asset(&self, data: &FieldData, field: &str) -> Option<Asset> {
        let key = data.get(field)?.as_ref_key()?;
        self.assets.resolve(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_component;
    use crate::nodes::Transform;
    use crate::value;

    #[derive(Debug, Clone, Default)]
    struct Bare {
        hp: i32,
    }
    impl_component!(Bare);

    #[derive(Debug, Clone, Default)]
    struct Scripted {
        hp: i32,
    }
    impl crate::nodes::FieldAccess for Scripted {
        fn capture_fields(&self, data: &mut FieldData, _cx: &mut SaveContext) {
            value::put(data, "hp", &self.hp);
        }
        fn apply_fields(&mut self, data: &FieldData, _cx: &mut LoadContext) {
            if let Some(hp) = value::get(data, "hp") {
                self.hp = hp;
            }
        }
    }
    impl_component!(Scripted, reflect);

    #[test]
    fn exact_match_wins() {
        let registry = ConverterRegistry::with_builtins();
        assert!(registry.resolve(TypeId::of::<Transform>(), false).is_some());
    }

    #[test]
    fn fallback_requires_capability() {
        let registry = ConverterRegistry::with_builtins();
        // No exact converter, no capability: no-op.
        assert!(registry.resolve(TypeId::of::<Bare>(), false).is_none());
        // Capability present: fallback pair.
        assert!(registry.resolve(TypeId::of::<Scripted>(), true).is_some());
    }

    #[test]
    fn dispatch_returns_the_requested_direction() {
        let registry = ConverterRegistry::with_builtins();
        match registry.dispatch(DispatchKind::Capture, TypeId::of::<Transform>(), false) {
            Some(Handler::Capture(_)) => {}
            _ => panic!("expected a capture handler"),
        }
        match registry.dispatch(DispatchKind::Apply, TypeId::of::<Transform>(), false) {
            Some(Handler::Apply(_)) => {}
            _ => panic!("expected an apply handler"),
        }
    }

    #[test]
    fn populate_is_idempotent() {
        let mut registry = ConverterRegistry::with_builtins();
        let count = registry.converters.len();
        registry.populate_builtins();
        registry.populate_builtins();
        assert_eq!(registry.converters.len(), count);
    }

    #[test]
    fn factories_construct_by_qualified_name() {
        let mut factories = ComponentFactories::with_builtins();
        factories.register::<Bare>();
        let probe = Bare::default();
        let built = factories.construct(probe.qualified_name()).unwrap();
        assert_eq!(built.type_name(), "Bare");
        assert!(factories.construct("no::such::Type").is_none());
    }
}
