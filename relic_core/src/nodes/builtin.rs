//! Built-in components with dedicated converters (see `convert::builtin`).
//! Host applications attach their own `Component` impls alongside these.

use glam::{Quat, Vec3};

use crate::catalog::Asset;
use crate::impl_component;

/// Local spatial state of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl_component!(Transform);

/// Renders a mesh asset with a material asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRenderer {
    pub mesh: Option<Asset>,
    pub material: Option<Asset>,
}

impl_component!(MeshRenderer);

/// Plays back an animation controller asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animator {
    pub controller: Option<Asset>,
    pub state_hash: i64,
    pub normalized_time: f32,
    pub playing: bool,
}

impl_component!(Animator);
