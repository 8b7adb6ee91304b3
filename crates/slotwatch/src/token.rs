//! Slot and token identity types.

use serde::{Deserialize, Serialize};

/// Identifier of a physical reader slot, as assigned by the token provider.
///
/// Provider slot ids are small integers and may be reused by different
/// readers over the life of the process, so they are only meaningful together
/// with a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u64);

impl SlotId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SlotId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing identity of an inserted token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub token_name: String,
    pub slot_name: String,
}

impl TokenIdentity {
    pub fn new(token_name: impl Into<String>, slot_name: impl Into<String>) -> Self {
        Self {
            token_name: token_name.into(),
            slot_name: slot_name.into(),
        }
    }
}

impl std::fmt::Display for TokenIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.token_name, self.slot_name)
    }
}

/// A token occupying a slot: its identity plus the provider handle.
///
/// The handle is owned. It is released when the occupant is dropped, which
/// happens exactly once: when the registry clears or replaces the entry, or
/// when an observation that was never tracked is finished with.
#[derive(Debug)]
pub struct Occupant<H> {
    identity: TokenIdentity,
    handle: H,
}

impl<H> Occupant<H> {
    pub fn new(identity: TokenIdentity, handle: H) -> Self {
        Self { identity, handle }
    }

    pub fn identity(&self) -> &TokenIdentity {
        &self.identity
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn into_parts(self) -> (TokenIdentity, H) {
        (self.identity, self.handle)
    }
}
