use relic_ids::NodeID;

use crate::nodes::node::Node;

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-based storage for live scene nodes.
/// NodeID index 0 is reserved (nil); slot `i` holds NodeID index `i + 1`.
/// Removing a node bumps the slot generation so stale IDs stop resolving.
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: u32,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Insert a node, assigning it a fresh generational ID.
    /// The node's `id` field is overwritten with the assigned ID.
    pub fn alloc(&mut self, mut node: Node) -> NodeID {
        let (idx, generation) = match self.free.pop() {
            Some(idx) => {
                let generation = self.slots[idx as usize].generation;
                (idx, generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: None,
                });
                ((self.slots.len() - 1) as u32, 0)
            }
        };
        let id = NodeID::from_parts(idx + 1, generation);
        node.id = id;
        self.slots[idx as usize].node = Some(node);
        self.live += 1;
        id
    }

    #[inline]
    fn slot_index(&self, id: NodeID) -> Option<usize> {
        let index = id.index();
        if index == 0 {
            return None; // index 0 is reserved (nil)
        }
        let idx = (index as usize) - 1;
        let slot = self.slots.get(idx)?;
        if slot.generation != id.generation() {
            return None; // stale ID from a reused slot
        }
        Some(idx)
    }

    #[inline]
    pub fn get(&self, id: NodeID) -> Option<&Node> {
        let idx = self.slot_index(id)?;
        self.slots[idx].node.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeID) -> Option<&mut Node> {
        let idx = self.slot_index(id)?;
        self.slots[idx].node.as_mut()
    }

    /// Remove a node, bump the slot generation, and recycle the slot.
    pub fn remove(&mut self, id: NodeID) -> Option<Node> {
        let idx = self.slot_index(id)?;
        let out = self.slots[idx].node.take()?;
        self.slots[idx].generation = self.slots[idx].generation.wrapping_add(1);
        self.free.push(idx as u32);
        self.live -= 1;
        Some(out)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn contains(&self, id: NodeID) -> bool {
        self.get(id).is_some()
    }

    /// Iterate over all live nodes as `(NodeID, &Node)`.
    pub fn iter(&self) -> impl Iterator<Item = (NodeID, &Node)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeID::from_parts((idx + 1) as u32, slot.generation), node))
        })
    }

}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}
