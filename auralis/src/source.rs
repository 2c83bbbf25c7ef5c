//! Render-side source storage.
//!
//! Sources live in a fixed arena of slots. A slot index stays stable for the life of
//! its source and is reused after removal, so per-slot render state (delay lines,
//! preassigned audio) can be addressed without lookups. Iteration follows insertion
//! order, which is the order the render call's source mapping is checked against.

use std::collections::HashMap;

use crate::config::{GlobalDefaults, SourceParams};
use crate::error::{AuralisError, Result};
use crate::math::Vec3;
use crate::world::SourceId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Source {
    pub id: SourceId,
    pub position: Vec3,
    pub params: SourceParams,
}

impl Source {
    /// Creates a source that inherits every parameter from `defaults`.
    pub fn new(id: SourceId, position: Vec3, defaults: &GlobalDefaults) -> Self {
        Self {
            id,
            position,
            params: SourceParams::from_defaults(defaults),
        }
    }
}

/// Arena of active sources with O(1) lookup by id.
///
/// All storage is reserved up front, so inserting and removing never allocates.
#[derive(Debug, Clone)]
pub struct SourceTable {
    slots: Vec<Option<Source>>,
    free: Vec<usize>,
    order: Vec<usize>,
    index: HashMap<SourceId, usize>,
}

impl SourceTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            // Lowest slot is handed out first
            free: (0..capacity).rev().collect(),
            order: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a source and returns its slot.
    ///
    /// # Errors
    ///
    /// `DuplicateSource` if the id is present, `SourceLimit` if every slot is taken.
    pub fn insert(&mut self, source: Source) -> Result<usize> {
        if self.index.contains_key(&source.id) {
            return Err(AuralisError::DuplicateSource(source.id));
        }
        let slot = self
            .free
            .pop()
            .ok_or(AuralisError::SourceLimit(self.capacity()))?;

        self.index.insert(source.id, slot);
        self.order.push(slot);
        self.slots[slot] = Some(source);
        Ok(slot)
    }

    /// Removes a source, returning its slot and its last state.
    pub fn remove(&mut self, id: SourceId) -> Result<(usize, Source)> {
        let slot = self
            .index
            .remove(&id)
            .ok_or(AuralisError::UnknownSource(id))?;
        let source = self.slots[slot]
            .take()
            .ok_or(AuralisError::UnknownSource(id))?;

        self.order.retain(|&s| s != slot);
        self.free.push(slot);
        Ok((slot, source))
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.slot_of(id).and_then(|slot| self.slots[slot].as_ref())
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.slot_of(id).and_then(|slot| self.slots[slot].as_mut())
    }

    pub fn slot_of(&self, id: SourceId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Active ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.iter().map(|(_, source)| source.id)
    }

    /// `(slot, source)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Source)> + '_ {
        self.order
            .iter()
            .filter_map(|&slot| self.slots[slot].as_ref().map(|source| (slot, source)))
    }

    /// Every active source, in slot order.
    pub fn sources_mut(&mut self) -> impl Iterator<Item = &mut Source> + '_ {
        self.slots.iter_mut().flatten()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: i32) -> Source {
        Source::new(SourceId(id), Vec3::ZERO, &GlobalDefaults::default())
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = SourceTable::with_capacity(4);
        assert!(table.is_empty());

        let slot = table.insert(source(7)).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(table.slot_of(SourceId(7)), Some(0));
        assert_eq!(table.get(SourceId(7)).map(|s| s.id), Some(SourceId(7)));
        assert!(table.get(SourceId(8)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut table = SourceTable::with_capacity(4);
        table.insert(source(1)).unwrap();

        assert_eq!(
            table.insert(source(1)),
            Err(AuralisError::DuplicateSource(SourceId(1)))
        );
        assert_eq!(
            table.remove(SourceId(2)).map(|(slot, _)| slot),
            Err(AuralisError::UnknownSource(SourceId(2)))
        );
    }

    #[test]
    fn test_capacity_limit() {
        let mut table = SourceTable::with_capacity(2);
        table.insert(source(1)).unwrap();
        table.insert(source(2)).unwrap();
        assert_eq!(table.insert(source(3)), Err(AuralisError::SourceLimit(2)));
    }

    #[test]
    fn test_slots_are_reused_and_order_is_kept() {
        let mut table = SourceTable::with_capacity(3);
        table.insert(source(10)).unwrap();
        let middle = table.insert(source(20)).unwrap();
        table.insert(source(30)).unwrap();

        let (freed, removed) = table.remove(SourceId(20)).unwrap();
        assert_eq!(freed, middle);
        assert_eq!(removed.id, SourceId(20));

        // The freed slot is reused, but the newcomer goes to the back of the order
        let reused = table.insert(source(40)).unwrap();
        assert_eq!(reused, middle);

        let ids: Vec<_> = table.ids().collect();
        assert_eq!(ids, vec![SourceId(10), SourceId(30), SourceId(40)]);
    }

    #[test]
    fn test_sources_mut_visits_every_source() {
        let mut table = SourceTable::with_capacity(3);
        table.insert(source(1)).unwrap();
        table.insert(source(2)).unwrap();

        for source in table.sources_mut() {
            source.position = Vec3::ONE;
        }
        assert!(table.iter().all(|(_, s)| s.position == Vec3::ONE));
    }
}
