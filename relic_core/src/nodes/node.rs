use relic_ids::NodeID;

use crate::nodes::component::Component;
use crate::snapshot::StateRecord;

/// One live element of the scene tree. Owns its attached components (in
/// attachment order), its child ID list (sibling order is meaningful), and
/// its persistent state record if it is identity-bearing.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Assigned by the arena on insertion.
    pub id: NodeID,

    pub name: String,
    pub active: bool,
    pub layer: i32,

    /// Nil for detached roots.
    pub parent: NodeID,
    pub children: Vec<NodeID>,

    pub components: Vec<Box<dyn Component>>,

    /// Persistent identity and lifecycle metadata. `None` until the node is
    /// first observed by `Scene::ensure_identity`.
    pub state: Option<StateRecord>,

    /// Catalog key of the prototype this node was manufactured from, set on
    /// the instance root only.
    pub prefab_source: Option<String>,

    /// Tracked in the scene's separate live list and forcibly destroyed when
    /// a snapshot is merged in.
    pub non_persistent: bool,
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            id: NodeID::nil(),
            name: name.to_string(),
            active: true,
            layer: 0,
            parent: NodeID::nil(),
            children: Vec::new(),
            components: Vec::new(),
            state: None,
            prefab_source: None,
            non_persistent: false,
        }
    }

    /// Durable identifier, if one has been assigned.
    pub fn persistent_id(&self) -> Option<&str> {
        let state = self.state.as_ref()?;
        if state.persistent_id.is_empty() {
            None
        } else {
            Some(&state.persistent_id)
        }
    }

    /// Downcast a component by concrete type, first match wins.
    pub fn component<C: Component>(&self) -> Option<&C> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<C>())
    }

    pub fn component_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components
            .iter_mut()
            .find_map(|c| c.as_any_mut().downcast_mut::<C>())
    }
}
