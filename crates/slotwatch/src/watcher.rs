//! Poll loop driving an [`EventSource`] through the reconciler.
//!
//! One sequential loop owns the registry: poll, reconcile, emit. Cancellation
//! is checked between cycles and interrupts the idle backoff; an in-flight
//! poll is bounded by the poll timeout and always completes.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::WatcherConfig;
use crate::event::{SlotEvent, SlotEventKind};
use crate::reconciler::EventReconciler;
use crate::registry::SlotRegistry;
use crate::source::{EventSource, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("token provider unavailable for {attempts} consecutive polls: {last_error}")]
    ProviderUnavailable { attempts: u32, last_error: String },
}

/// Counters for a finished watch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub polls: u64,
    pub idle_cycles: u64,
    pub inserted: u64,
    pub removed: u64,
    pub missed_removals: u64,
    pub empty: u64,
    pub tracking_failures: u64,
    /// Slots still tracked when the loop stopped.
    pub tracked: usize,
}

impl WatchSummary {
    fn record(&mut self, kind: SlotEventKind) {
        let counter = match kind {
            SlotEventKind::Inserted => &mut self.inserted,
            SlotEventKind::Removed => &mut self.removed,
            SlotEventKind::MissedRemoval => &mut self.missed_removals,
            SlotEventKind::Empty => &mut self.empty,
            SlotEventKind::TrackingFailure => &mut self.tracking_failures,
        };
        *counter += 1;
    }
}

pub struct Watcher<S: EventSource> {
    source: S,
    reconciler: EventReconciler<S::Handle>,
    config: WatcherConfig,
    events_tx: Option<mpsc::UnboundedSender<SlotEvent>>,
    summary: WatchSummary,
}

impl<S: EventSource> Watcher<S> {
    pub fn new(source: S, config: WatcherConfig) -> Self {
        Self {
            source,
            reconciler: EventReconciler::new(config.registry_capacity),
            config,
            events_tx: None,
            summary: WatchSummary::default(),
        }
    }

    /// Forward every classified event to `tx`, in emission order.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SlotEvent>) -> Self {
        self.events_tx = Some(tx);
        self
    }

    pub fn registry(&self) -> &SlotRegistry<S::Handle> {
        self.reconciler.registry()
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Run until `cancel` fires or the source closes.
    ///
    /// Returns an error only when the provider stays unavailable longer than
    /// `max_unavailable_polls` allows. Whether that is fatal is up to the host.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<WatchSummary, WatchError> {
        tracing::info!(
            capacity = self.config.registry_capacity,
            poll_timeout = ?self.config.poll_timeout,
            "Watching for token events"
        );

        match self.source.present_slots().await {
            Ok(initial) => {
                for event in self.reconciler.sync_initial(initial) {
                    self.emit(event);
                }
            }
            Err(SourceError::Closed) => return Ok(self.finish()),
            Err(e) => tracing::warn!(error = %e, "Could not read initially present tokens"),
        }

        let mut unavailable: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                tracing::info!("Shutdown requested");
                break;
            }

            self.summary.polls += 1;
            match self.source.poll(self.config.poll_timeout).await {
                Ok(Some(observation)) => {
                    unavailable = 0;
                    tracing::trace!(
                        slot = %observation.slot_id,
                        present = observation.present,
                        generation = observation.generation,
                        "Token event"
                    );
                    for event in self.reconciler.reconcile(observation) {
                        self.emit(event);
                    }
                }
                Ok(None) => {
                    unavailable = 0;
                    self.idle(&cancel).await;
                }
                Err(SourceError::Closed) => {
                    tracing::info!("Event source closed");
                    break;
                }
                Err(SourceError::Unavailable(reason)) => {
                    unavailable = unavailable.saturating_add(1);
                    tracing::warn!(attempt = unavailable, %reason, "Token provider unavailable");
                    if let Some(max) = self.config.max_unavailable_polls
                        && unavailable >= max
                    {
                        tracing::error!(attempts = unavailable, "Giving up on token provider");
                        return Err(WatchError::ProviderUnavailable {
                            attempts: unavailable,
                            last_error: reason,
                        });
                    }
                    self.idle(&cancel).await;
                }
            }
        }

        Ok(self.finish())
    }

    async fn idle(&mut self, cancel: &CancellationToken) {
        self.summary.idle_cycles += 1;
        tracing::trace!(backoff = ?self.config.idle_backoff, "No token event");
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.idle_backoff) => {}
        }
    }

    fn emit(&mut self, event: SlotEvent) {
        event.trace();
        self.summary.record(event.kind());

        let consumer_gone = self
            .events_tx
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_err());
        if consumer_gone {
            tracing::debug!("Event consumer closed, continuing with logging only");
            self.events_tx = None;
        }
    }

    fn finish(&mut self) -> WatchSummary {
        self.summary.tracked = self.reconciler.registry().len();
        tracing::info!(summary = ?self.summary, "Watcher stopped");
        self.summary.clone()
    }
}
