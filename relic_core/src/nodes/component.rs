use std::any::Any;
use std::fmt::Debug;

use crate::convert::{LoadContext, SaveContext};
use crate::value::FieldData;

/// Base trait implemented by every attachable behavior component.
///
/// The component set is open: the engine never enumerates concrete types, it
/// dispatches on `TypeId` via the converter registry and falls back to the
/// [`FieldAccess`] capability when no exact converter is registered.
pub trait Component: Any + Debug {
    /// Declared type name, used for positional component reconciliation.
    fn type_name(&self) -> &'static str;

    /// Fully-qualified type name, used to manufacture missing components.
    fn qualified_name(&self) -> &'static str;

    fn clone_component(&self) -> Box<dyn Component>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Opt-in hook for the fallback converter. A component that returns
    /// `Some` here gets captured and applied even without a registered
    /// converter of its own.
    fn field_access(&self) -> Option<&dyn FieldAccess> {
        None
    }

    fn field_access_mut(&mut self) -> Option<&mut dyn FieldAccess> {
        None
    }
}

/// Fallback capability: a component describes its own saved fields.
/// Reference and asset fields go through the context helpers so they are
/// replaced by stable keys and resolved (or deferred) on the way back.
pub trait FieldAccess {
    fn capture_fields(&self, data: &mut FieldData, cx: &mut SaveContext);
    fn apply_fields(&mut self, data: &FieldData, cx: &mut LoadContext);
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_component()
    }
}

/// Implements `Component` for a concrete type. The second form wires the
/// type's `FieldAccess` impl into the fallback hooks.
#[macro_export]
macro_rules! impl_component {
    ($ty:ty) => {
        impl $crate::nodes::component::Component for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }
            fn qualified_name(&self) -> &'static str {
                concat!(module_path!(), "::", stringify!($ty))
            }
            fn clone_component(&self) -> Box<dyn $crate::nodes::component::Component> {
                Box::new(self.clone())
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
    ($ty:ty, reflect) => {
        impl $crate::nodes::component::Component for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }
            fn qualified_name(&self) -> &'static str {
                concat!(module_path!(), "::", stringify!($ty))
            }
            fn clone_component(&self) -> Box<dyn $crate::nodes::component::Component> {
                Box::new(self.clone())
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
            fn field_access(&self) -> Option<&dyn $crate::nodes::component::FieldAccess> {
                Some(self)
            }
            fn field_access_mut(
                &mut self,
            ) -> Option<&mut dyn $crate::nodes::component::FieldAccess> {
                Some(self)
            }
        }
    };
}
