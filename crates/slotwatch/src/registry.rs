//! Fixed-capacity slot registry.
//!
//! Storage is a bounded arena of cells scanned linearly. Capacity is fixed at
//! construction: a full registry refuses new entries instead of growing or
//! overwriting, and the caller surfaces the refusal.
//!
//! `insert` does not dedupe on slot id. Callers replacing an entry must
//! `remove` first; `get` returns the first match if duplicates exist.

use crate::token::{Occupant, SlotId, TokenIdentity};

/// Default number of tracked slots.
pub const DEFAULT_CAPACITY: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("slot registry full ({capacity} entries), cannot track slot {slot_id}")]
    CapacityExceeded { slot_id: SlotId, capacity: usize },
    #[error("slot {slot_id} is not tracked")]
    NotFound { slot_id: SlotId },
}

/// Last-known occupant of one slot.
#[derive(Debug)]
pub struct SlotEntry<H> {
    slot_id: SlotId,
    occupant: Occupant<H>,
    generation: u64,
}

impl<H> SlotEntry<H> {
    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    pub fn occupant(&self) -> &Occupant<H> {
        &self.occupant
    }

    pub fn identity(&self) -> &TokenIdentity {
        self.occupant.identity()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn into_occupant(self) -> Occupant<H> {
        self.occupant
    }
}

/// Bounded map from slot id to its tracked occupant.
///
/// Owns every occupant handle it holds; clearing a cell drops the handle.
#[derive(Debug)]
pub struct SlotRegistry<H> {
    cells: Vec<Option<SlotEntry<H>>>,
}

impl<H> SlotRegistry<H> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: std::iter::repeat_with(|| None).take(capacity).collect(),
        }
    }

    /// Track `occupant` in the first free cell.
    ///
    /// On `CapacityExceeded` the occupant is dropped (its handle released) and
    /// no existing entry is touched.
    pub fn insert(
        &mut self,
        slot_id: SlotId,
        occupant: Occupant<H>,
        generation: u64,
    ) -> Result<(), RegistryError> {
        let Some(cell) = self.cells.iter_mut().find(|c| c.is_none()) else {
            return Err(RegistryError::CapacityExceeded {
                slot_id,
                capacity: self.capacity(),
            });
        };

        *cell = Some(SlotEntry {
            slot_id,
            occupant,
            generation,
        });
        Ok(())
    }

    pub fn get(&self, slot_id: SlotId) -> Option<&SlotEntry<H>> {
        self.iter().find(|e| e.slot_id == slot_id)
    }

    /// Clear every cell tracking `slot_id`.
    ///
    /// Scans the whole arena. Returns the first cleared entry; any duplicates
    /// are dropped here.
    pub fn remove(&mut self, slot_id: SlotId) -> Result<SlotEntry<H>, RegistryError> {
        let mut removed = None;
        for cell in self.cells.iter_mut() {
            if cell.as_ref().is_some_and(|e| e.slot_id == slot_id) {
                let entry = cell.take();
                if removed.is_none() {
                    removed = entry;
                } else {
                    tracing::warn!(slot = %slot_id, "Dropping duplicate registry entry");
                }
            }
        }
        removed.ok_or(RegistryError::NotFound { slot_id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotEntry<H>> {
        self.cells.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }
}

impl<H> Default for SlotRegistry<H> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn occupant(name: &str) -> Occupant<()> {
        Occupant::new(TokenIdentity::new(name, "reader"), ())
    }

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_capacity() {
        let registry: SlotRegistry<()> = SlotRegistry::default();
        assert_eq!(registry.capacity(), DEFAULT_CAPACITY);
        assert!(registry.is_empty());
    }

    #[test]
    fn get_after_insert() {
        let mut registry = SlotRegistry::new(8);
        for id in 0..8u64 {
            registry
                .insert(SlotId::new(id), occupant(&format!("card{id}")), id + 1)
                .unwrap();
        }

        for id in 0..8u64 {
            let entry = registry.get(SlotId::new(id)).unwrap();
            assert_eq!(entry.identity().token_name, format!("card{id}"));
            assert_eq!(entry.generation(), id + 1);
        }
        assert_eq!(registry.len(), 8);
        assert!(registry.is_full());
    }

    #[test]
    fn get_missing_is_none() {
        let registry: SlotRegistry<()> = SlotRegistry::new(2);
        assert!(registry.get(SlotId::new(1)).is_none());
    }

    #[test]
    fn insert_beyond_capacity_fails_without_overwrite() {
        let mut registry = SlotRegistry::new(1);
        registry.insert(SlotId::new(1), occupant("first"), 1).unwrap();

        let err = registry
            .insert(SlotId::new(2), occupant("second"), 1)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::CapacityExceeded {
                slot_id: SlotId::new(2),
                capacity: 1
            }
        );

        assert_eq!(
            registry.get(SlotId::new(1)).unwrap().identity().token_name,
            "first"
        );
        assert!(registry.get(SlotId::new(2)).is_none());
    }

    #[test]
    fn remove_scans_past_first_cell() {
        let mut registry = SlotRegistry::new(4);
        registry.insert(SlotId::new(1), occupant("a"), 1).unwrap();
        registry.insert(SlotId::new(2), occupant("b"), 1).unwrap();
        registry.insert(SlotId::new(3), occupant("c"), 1).unwrap();

        let removed = registry.remove(SlotId::new(3)).unwrap();
        assert_eq!(removed.identity().token_name, "c");

        assert!(registry.get(SlotId::new(3)).is_none());
        assert!(registry.get(SlotId::new(1)).is_some());
        assert!(registry.get(SlotId::new(2)).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_only_matching_entry() {
        let mut registry = SlotRegistry::new(4);
        registry.insert(SlotId::new(1), occupant("a"), 1).unwrap();
        registry.insert(SlotId::new(2), occupant("b"), 1).unwrap();

        registry.remove(SlotId::new(1)).unwrap();

        assert!(registry.get(SlotId::new(1)).is_none());
        assert_eq!(
            registry.get(SlotId::new(2)).unwrap().identity().token_name,
            "b"
        );
    }

    #[test]
    fn remove_missing_is_not_found() {
        let mut registry: SlotRegistry<()> = SlotRegistry::new(2);
        assert_eq!(
            registry.remove(SlotId::new(9)).unwrap_err(),
            RegistryError::NotFound {
                slot_id: SlotId::new(9)
            }
        );
    }

    #[test]
    fn remove_clears_duplicates() {
        let mut registry = SlotRegistry::new(3);
        registry.insert(SlotId::new(5), occupant("old"), 1).unwrap();
        registry.insert(SlotId::new(6), occupant("other"), 1).unwrap();
        registry.insert(SlotId::new(5), occupant("new"), 2).unwrap();

        let removed = registry.remove(SlotId::new(5)).unwrap();
        assert_eq!(removed.identity().token_name, "old");
        assert!(registry.get(SlotId::new(5)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn capacity_two_scenario() {
        let mut registry = SlotRegistry::new(2);
        registry.insert(SlotId::new(1), occupant("a"), 1).unwrap();
        registry.insert(SlotId::new(2), occupant("b"), 1).unwrap();
        assert!(matches!(
            registry.insert(SlotId::new(3), occupant("c"), 1),
            Err(RegistryError::CapacityExceeded { .. })
        ));

        registry.remove(SlotId::new(1)).unwrap();
        registry.insert(SlotId::new(3), occupant("c"), 1).unwrap();

        assert_eq!(registry.get(SlotId::new(3)).unwrap().identity().token_name, "c");
        assert!(registry.get(SlotId::new(1)).is_none());
    }

    #[test]
    fn handles_released_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut registry = SlotRegistry::new(1);

        let tracked = Occupant::new(TokenIdentity::default(), Counted(Arc::clone(&released)));
        registry.insert(SlotId::new(1), tracked, 1).unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 0);

        // Rejected insert releases the rejected handle only.
        let rejected = Occupant::new(TokenIdentity::default(), Counted(Arc::clone(&released)));
        assert!(registry.insert(SlotId::new(2), rejected, 1).is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        drop(registry.remove(SlotId::new(1)).unwrap());
        assert_eq!(released.load(Ordering::SeqCst), 2);

        drop(registry);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_registry_releases_tracked_handles() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let mut registry = SlotRegistry::new(2);
            for id in 0..2 {
                let occupant =
                    Occupant::new(TokenIdentity::default(), Counted(Arc::clone(&released)));
                registry.insert(SlotId::new(id), occupant, 1).unwrap();
            }
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }
}
