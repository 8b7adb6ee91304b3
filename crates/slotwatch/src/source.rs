//! Token event source abstraction.
//!
//! The concrete provider (NSS module, PKCS#11 driver) lives outside this
//! crate. The watcher only needs to wait for the next slot event and to read a
//! slot's presence, generation and token identity.

use std::time::Duration;

use crate::token::{Occupant, SlotId, TokenIdentity};

/// One polled slot event from the provider.
#[derive(Debug)]
pub struct TokenObservation<H> {
    pub slot_id: SlotId,
    pub present: bool,
    /// Provider series number; bumped each time a token is inserted.
    pub generation: u64,
    /// Token and slot names, when a token is present.
    pub identity: Option<TokenIdentity>,
    /// Owned reference to the provider slot. Dropping it releases it.
    pub handle: H,
}

impl<H> TokenObservation<H> {
    pub fn present(slot_id: SlotId, generation: u64, identity: TokenIdentity, handle: H) -> Self {
        Self {
            slot_id,
            present: true,
            generation,
            identity: Some(identity),
            handle,
        }
    }

    pub fn absent(slot_id: SlotId, generation: u64, handle: H) -> Self {
        Self {
            slot_id,
            present: false,
            generation,
            identity: None,
            handle,
        }
    }

    /// Convert into the occupant stored by the registry.
    ///
    /// A present token without names is tracked with an empty identity.
    pub fn into_occupant(self) -> Occupant<H> {
        Occupant::new(self.identity.unwrap_or_default(), self.handle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The provider could not be polled this cycle.
    #[error("token provider unavailable: {0}")]
    Unavailable(String),
    /// The source has no more events and never will.
    #[error("event source closed")]
    Closed,
}

/// Provider of slot events.
#[async_trait::async_trait]
pub trait EventSource: Send {
    /// Owned provider slot reference carried by observations.
    type Handle: Send + 'static;

    /// Wait up to `timeout` for the next slot event.
    ///
    /// `Ok(None)` means nothing happened within the timeout.
    async fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<TokenObservation<Self::Handle>>, SourceError>;

    /// Slots currently holding a token, read once at startup.
    async fn present_slots(
        &mut self,
    ) -> Result<Vec<TokenObservation<Self::Handle>>, SourceError> {
        Ok(Vec::new())
    }
}
