//! Slot event reconciliation.
//!
//! Each observation is compared against the registry to decide what happened
//! to the slot since the last poll. Per slot the state is implicit in the
//! registry: no entry means empty, an entry means occupied at its generation.
//!
//! | tracked      | observed              | events                          |
//! |--------------|-----------------------|---------------------------------|
//! | none         | present                | `Inserted`                      |
//! | none         | absent                 | `Empty`                         |
//! | gen g        | present, gen g         | none (duplicate suppressed)     |
//! | gen g        | absent, gen g          | `Removed`                       |
//! | gen g        | present, gen g' != g   | `MissedRemoval`, `Inserted`     |
//! | gen g        | absent, gen g' != g    | `MissedRemoval`                 |
//!
//! A full registry turns `Inserted` into `TrackingFailure`.

use crate::event::SlotEvent;
use crate::registry::SlotRegistry;
use crate::source::TokenObservation;

pub struct EventReconciler<H> {
    registry: SlotRegistry<H>,
}

impl<H> EventReconciler<H> {
    pub fn new(capacity: usize) -> Self {
        Self::with_registry(SlotRegistry::new(capacity))
    }

    pub fn with_registry(registry: SlotRegistry<H>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SlotRegistry<H> {
        &self.registry
    }

    /// Classify one observation and update the registry.
    ///
    /// Events are returned in emission order. The observation's handle is
    /// either moved into the registry or released before returning.
    pub fn reconcile(&mut self, observation: TokenObservation<H>) -> Vec<SlotEvent> {
        let slot_id = observation.slot_id;
        let mut events = Vec::with_capacity(2);

        let superseded = self
            .registry
            .get(slot_id)
            .is_some_and(|entry| entry.generation() != observation.generation);
        let stale = if superseded {
            self.registry.remove(slot_id).ok()
        } else {
            None
        };
        let missed_removal = stale.is_some();
        if let Some(stale) = stale {
            let (identity, _handle) = stale.into_occupant().into_parts();
            events.push(SlotEvent::MissedRemoval { slot_id, identity });
        }

        if observation.present {
            if self.registry.get(slot_id).is_some() {
                tracing::debug!(
                    slot = %slot_id,
                    generation = observation.generation,
                    "Suppressing duplicate insertion"
                );
                return events;
            }

            let identity = observation.identity.clone().unwrap_or_default();
            let generation = observation.generation;
            match self
                .registry
                .insert(slot_id, observation.into_occupant(), generation)
            {
                Ok(()) => events.push(SlotEvent::Inserted {
                    slot_id,
                    identity,
                    generation,
                }),
                Err(e) => events.push(SlotEvent::TrackingFailure {
                    slot_id,
                    reason: e.to_string(),
                }),
            }
        } else if let Ok(entry) = self.registry.remove(slot_id) {
            let (identity, _handle) = entry.into_occupant().into_parts();
            events.push(SlotEvent::Removed { slot_id, identity });
        } else if !missed_removal {
            events.push(SlotEvent::Empty { slot_id });
        }

        events
    }

    /// Seed the registry with tokens already present at startup.
    ///
    /// Absent slots are skipped so startup does not report every empty reader.
    pub fn sync_initial(
        &mut self,
        observations: impl IntoIterator<Item = TokenObservation<H>>,
    ) -> Vec<SlotEvent> {
        observations
            .into_iter()
            .filter(|obs| obs.present)
            .flat_map(|obs| self.reconcile(obs))
            .collect()
    }
}

impl<H> Default for EventReconciler<H> {
    fn default() -> Self {
        Self::with_registry(SlotRegistry::default())
    }
}
