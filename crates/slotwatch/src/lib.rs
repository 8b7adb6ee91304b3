//! slotwatch: smartcard slot tracking across token insertion and removal.

pub mod config;
mod event;
pub mod reconciler;
pub mod registry;
pub mod script;
pub mod source;
mod token;
pub mod watcher;

pub use config::{ConfigError, WatcherConfig};
pub use event::{SlotEvent, SlotEventKind};
pub use reconciler::EventReconciler;
pub use registry::{DEFAULT_CAPACITY, RegistryError, SlotEntry, SlotRegistry};
pub use script::{ScriptError, ScriptedHandle, ScriptedSource};
pub use source::{EventSource, SourceError, TokenObservation};
pub use token::{Occupant, SlotId, TokenIdentity};
pub use watcher::{WatchError, WatchSummary, Watcher};
pub use tokio_util::sync::CancellationToken;
