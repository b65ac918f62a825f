pub mod builtin;
pub mod component;
pub mod node;

pub use builtin::{Animator, MeshRenderer, Transform};
pub use component::{Component, FieldAccess};
pub use node::Node;
