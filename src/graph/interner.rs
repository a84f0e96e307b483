//! Slot interning so the resolver can key per-commit maps by a `u32`
//! instead of cloning (root, indexer) string pairs for every commit.

use rustc_hash::FxHashMap;

use crate::model::Slot;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SlotId(pub u32);

#[derive(Debug, Default)]
pub struct SlotInterner {
    map: FxHashMap<Slot, u32>,
    vec: Vec<Slot>,
}

impl SlotInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, root: &str, indexer: &str) -> SlotId {
        let slot = Slot::new(root, indexer);
        if let Some(&id) = self.map.get(&slot) {
            return SlotId(id);
        }
        let id = self.vec.len() as u32;
        self.map.insert(slot.clone(), id);
        self.vec.push(slot);
        SlotId(id)
    }

    pub fn get(&self, id: SlotId) -> &Slot {
        &self.vec[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}
