//! Classified slot events handed to consumers.

use serde::Serialize;

use crate::token::{SlotId, TokenIdentity};

/// One classified transition for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotEvent {
    /// A token is now tracked in the slot.
    Inserted {
        slot_id: SlotId,
        identity: TokenIdentity,
        generation: u64,
    },

    /// The tracked token was observed leaving the slot.
    Removed {
        slot_id: SlotId,
        identity: TokenIdentity,
    },

    /// The tracked token left between polls; a newer generation was seen first.
    MissedRemoval {
        slot_id: SlotId,
        identity: TokenIdentity,
    },

    /// The slot reported an event but holds nothing and nothing was tracked.
    Empty { slot_id: SlotId },

    /// A present token could not be tracked (registry full).
    TrackingFailure { slot_id: SlotId, reason: String },
}

/// Discriminant of [`SlotEvent`], used for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotEventKind {
    Inserted,
    Removed,
    MissedRemoval,
    Empty,
    TrackingFailure,
}

impl SlotEvent {
    pub fn kind(&self) -> SlotEventKind {
        match self {
            SlotEvent::Inserted { .. } => SlotEventKind::Inserted,
            SlotEvent::Removed { .. } => SlotEventKind::Removed,
            SlotEvent::MissedRemoval { .. } => SlotEventKind::MissedRemoval,
            SlotEvent::Empty { .. } => SlotEventKind::Empty,
            SlotEvent::TrackingFailure { .. } => SlotEventKind::TrackingFailure,
        }
    }

    /// Log the event at the level matching its severity.
    pub(crate) fn trace(&self) {
        match self {
            SlotEvent::Inserted {
                slot_id,
                identity,
                generation,
            } => {
                tracing::info!(slot = %slot_id, token = %identity, generation, "Card inserted");
            }
            SlotEvent::Removed { slot_id, identity } => {
                tracing::info!(slot = %slot_id, token = %identity, "Card removed");
            }
            SlotEvent::MissedRemoval { slot_id, identity } => {
                tracing::warn!(slot = %slot_id, token = %identity, "Missed removal of card");
            }
            SlotEvent::Empty { slot_id } => {
                tracing::debug!(slot = %slot_id, "Slot is empty");
            }
            SlotEvent::TrackingFailure { slot_id, reason } => {
                tracing::warn!(slot = %slot_id, %reason, "Cannot track card");
            }
        }
    }
}

impl std::fmt::Display for SlotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotEvent::Inserted {
                slot_id, identity, ..
            } => write!(f, "card '{identity}' inserted into slot {slot_id}"),
            SlotEvent::Removed { slot_id, identity } => {
                write!(f, "card '{identity}' removed from slot {slot_id}")
            }
            SlotEvent::MissedRemoval { slot_id, identity } => {
                write!(f, "missed removal of card '{identity}' from slot {slot_id}")
            }
            SlotEvent::Empty { slot_id } => write!(f, "slot {slot_id} is empty"),
            SlotEvent::TrackingFailure { slot_id, reason } => {
                write!(f, "cannot track slot {slot_id}: {reason}")
            }
        }
    }
}
