//! Event source replaying slot events from a JSON-lines script.
//!
//! One JSON object per line:
//!
//! ```text
//! {"slot_id": 1, "present": true, "generation": 3, "token_name": "PIV", "slot_name": "Reader 0"}
//! {"slot_id": 1, "present": false, "generation": 3}
//! {"idle": true}
//! {"unavailable": "module not loaded"}
//! ```
//!
//! Events marked `"initial": true` are reported as already present at startup
//! instead of being polled. Blank lines and lines starting with `#` are
//! skipped. Once every line is consumed the source reports `Closed`.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::source::{EventSource, SourceError, TokenObservation};
use crate::token::{SlotId, TokenIdentity};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Provider handle stand-in: remembers where the observation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedHandle {
    pub slot_id: SlotId,
    pub line: usize,
}

#[derive(Debug, Deserialize)]
struct ScriptedEvent {
    slot_id: SlotId,
    present: bool,
    generation: u64,
    #[serde(default)]
    token_name: Option<String>,
    #[serde(default)]
    slot_name: Option<String>,
    #[serde(default)]
    initial: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Event(ScriptedEvent),
    Idle { idle: bool },
    Unavailable { unavailable: String },
}

#[derive(Debug)]
enum Step {
    Event(TokenObservation<ScriptedHandle>),
    Idle,
    Unavailable(String),
}

#[derive(Debug, Default)]
pub struct ScriptedSource {
    initial: Vec<TokenObservation<ScriptedHandle>>,
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut source = Self::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let parsed: ScriptLine =
                serde_json::from_str(trimmed).map_err(|e| ScriptError::Parse {
                    line,
                    message: e.to_string(),
                })?;

            match parsed {
                ScriptLine::Event(event) => {
                    let initial = event.initial;
                    let observation = event.into_observation(line);
                    if initial {
                        source.initial.push(observation);
                    } else {
                        source.steps.push_back(Step::Event(observation));
                    }
                }
                ScriptLine::Idle { idle: true } => source.steps.push_back(Step::Idle),
                ScriptLine::Idle { idle: false } => {}
                ScriptLine::Unavailable { unavailable } => {
                    source.steps.push_back(Step::Unavailable(unavailable))
                }
            }
        }

        tracing::debug!(
            initial = source.initial.len(),
            steps = source.steps.len(),
            "Loaded event script"
        );
        Ok(source)
    }

    /// Poll results not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl ScriptedEvent {
    fn into_observation(self, line: usize) -> TokenObservation<ScriptedHandle> {
        let identity = match (self.token_name, self.slot_name) {
            (None, None) => None,
            (token_name, slot_name) => Some(TokenIdentity::new(
                token_name.unwrap_or_default(),
                slot_name.unwrap_or_default(),
            )),
        };

        TokenObservation {
            slot_id: self.slot_id,
            present: self.present,
            generation: self.generation,
            identity,
            handle: ScriptedHandle {
                slot_id: self.slot_id,
                line,
            },
        }
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedSource {
    type Handle = ScriptedHandle;

    async fn poll(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<TokenObservation<ScriptedHandle>>, SourceError> {
        match self.steps.pop_front() {
            Some(Step::Event(observation)) => Ok(Some(observation)),
            Some(Step::Idle) => Ok(None),
            Some(Step::Unavailable(reason)) => Err(SourceError::Unavailable(reason)),
            None => Err(SourceError::Closed),
        }
    }

    async fn present_slots(
        &mut self,
    ) -> Result<Vec<TokenObservation<ScriptedHandle>>, SourceError> {
        Ok(std::mem::take(&mut self.initial))
    }
}
