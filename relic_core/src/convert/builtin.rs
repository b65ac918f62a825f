//! Converter pairs for the built-in components, plus the capability-based
//! fallback used by everything else.

use glam::{Quat, Vec3};
use log::debug;

use crate::convert::{ComponentFactories, ConverterRegistry, LoadContext, SaveContext};
use crate::nodes::component::Component;
use crate::nodes::{Animator, MeshRenderer, Transform};
use crate::value::{self, FieldData};

pub(crate) fn register_builtin_converters(registry: &mut ConverterRegistry) {
    registry.register_for::<Transform>(capture_transform, apply_transform);
    registry.register_for::<MeshRenderer>(capture_mesh_renderer, apply_mesh_renderer);
    registry.register_for::<Animator>(capture_animator, apply_animator);
    registry.register_fallback(capture_via_field_access, apply_via_field_access);
}

pub(crate) fn register_builtin_factories(factories: &mut ComponentFactories) {
    factories.register::<Transform>();
    factories.register::<MeshRenderer>();
    factories.register::<Animator>();
}

// ---- Fallback: components that describe their own fields ----

fn capture_via_field_access(c: &dyn Component, data: &mut FieldData, cx: &mut SaveContext) {
    match c.field_access() {
        Some(access) => access.capture_fields(data, cx),
        None => debug!("component '{}' has no field access; skipped", c.type_name()),
    }
}

fn apply_via_field_access(c: &mut dyn Component, data: &FieldData, cx: &mut LoadContext) {
    let type_name = c.type_name();
    match c.field_access_mut() {
        Some(access) => access.apply_fields(data, cx),
        None => debug!("component '{type_name}' has no field access; skipped"),
    }
}

// ---- Transform ----

fn capture_transform(c: &dyn Component, data: &mut FieldData, _cx: &mut SaveContext) {
    let Some(t) = c.as_any().downcast_ref::<Transform>() else {
        return;
    };
    value::put(data, "position", &t.position);
    value::put(data, "rotation", &t.rotation);
    value::put(data, "scale", &t.scale);
}

fn apply_transform(c: &mut dyn Component, data: &FieldData, _cx: &mut LoadContext) {
    let Some(t) = c.as_any_mut().downcast_mut::<Transform>() else {
        return;
    };
    if let Some(position) = value::get::<Vec3>(data, "position") {
        t.position = position;
    }
    if let Some(rotation) = value::get::<Quat>(data, "rotation") {
        t.rotation = rotation;
    }
    if let Some(scale) = value::get::<Vec3>(data, "scale") {
        t.scale = scale;
    }
}

// ---- MeshRenderer ----

fn capture_mesh_renderer(c: &dyn Component, data: &mut FieldData, cx: &mut SaveContext) {
    let Some(renderer) = c.as_any().downcast_ref::<MeshRenderer>() else {
        return;
    };
    if let Some(mesh) = &renderer.mesh {
        cx.store_asset(data, "mesh", mesh);
    }
    if let Some(material) = &renderer.material {
        cx.store_asset(data, "material", material);
    }
}

fn apply_mesh_renderer(c: &mut dyn Component, data: &FieldData, cx: &mut LoadContext) {
    let mesh = cx.resolve_asset(data, "mesh");
    let material = cx.resolve_asset(data, "material");
    let Some(renderer) = c.as_any_mut().downcast_mut::<MeshRenderer>() else {
        return;
    };
    if data.contains_key("mesh") {
        renderer.mesh = mesh;
    }
    if data.contains_key("material") {
        renderer.material = material;
    }
}

// ---- Animator ----

fn capture_animator(c: &dyn Component, data: &mut FieldData, cx: &mut SaveContext) {
    let Some(animator) = c.as_any().downcast_ref::<Animator>() else {
        return;
    };
    if let Some(controller) = &animator.controller {
        cx.store_asset(data, "controller", controller);
    }
    value::put(data, "state_hash", &animator.state_hash);
    value::put(data, "normalized_time", &animator.normalized_time);
    value::put(data, "playing", &animator.playing);
}

fn apply_animator(c: &mut dyn Component, data: &FieldData, cx: &mut LoadContext) {
    let controller = cx.resolve_asset(data, "controller");
    let Some(animator) = c.as_any_mut().downcast_mut::<Animator>() else {
        return;
    };
    if data.contains_key("controller") {
        animator.controller = controller;
    }
    if let Some(state_hash) = value::get(data, "state_hash") {
        animator.state_hash = state_hash;
    }
    if let Some(normalized_time) = value::get(data, "normalized_time") {
        animator.normalized_time = normalized_time;
    }
    if let Some(playing) = value::get(data, "playing") {
        animator.playing = playing;
    }
}
