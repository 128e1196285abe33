//! Progress delivery for one generation run
//!
//! The pipeline pushes [`ProgressEvent`]s into a [`ProgressSink`]. The streaming
//! sink hands events to a single consumer through a one-slot channel and waits
//! until the consumer has taken each non-terminal event before returning, so
//! the client sees a stage start before that stage's provider call begins.

use async_trait::async_trait;
use futures::Stream;
use redactor_common::{ProgressEvent, StageId};
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("progress consumer disconnected")]
    Disconnected,

    #[error("event out of order: {0}")]
    OutOfOrder(String),
}

/// Destination for progress events
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent) -> Result<(), EmitError>;
}

/// Sink for callers that only want the final result
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl ProgressSink for NullSink {
    async fn emit(&self, _event: ProgressEvent) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Ordering rules for one run's events
///
/// Stages start in increasing order, a stage starts only after the previous one
/// is done, fragments and completion belong to the open stage, `complete`
/// follows the last stage, and nothing follows a terminal event.
#[derive(Debug, Default)]
pub struct EventOrder {
    current: Option<StageId>,
    current_done: bool,
    terminated: bool,
}

impl EventOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Accept `event` or explain why it breaks the order
    pub fn check(&mut self, event: &ProgressEvent) -> Result<(), EmitError> {
        if self.terminated {
            return Err(EmitError::OutOfOrder(
                "event after terminal event".to_string(),
            ));
        }

        match event {
            ProgressEvent::PhaseStart { phase, .. } => {
                if let Some(current) = self.current {
                    if *phase <= current || !self.current_done {
                        return Err(EmitError::OutOfOrder(format!(
                            "stage {} started while at stage {}",
                            phase.number(),
                            current.number()
                        )));
                    }
                }
                self.current = Some(*phase);
                self.current_done = false;
            }
            ProgressEvent::PhaseChunk { phase, .. } | ProgressEvent::PhaseDone { phase, .. } => {
                if self.current != Some(*phase) || self.current_done {
                    return Err(EmitError::OutOfOrder(format!(
                        "stage {} is not open",
                        phase.number()
                    )));
                }
                if matches!(event, ProgressEvent::PhaseDone { .. }) {
                    self.current_done = true;
                }
            }
            ProgressEvent::Error { .. } => {
                self.terminated = true;
            }
            ProgressEvent::Complete { .. } => {
                if self.current != Some(StageId::Finalizing) || !self.current_done {
                    return Err(EmitError::OutOfOrder(
                        "complete before the final stage finished".to_string(),
                    ));
                }
                self.terminated = true;
            }
        }

        Ok(())
    }
}

/// Streaming sink backed by a one-slot channel
pub struct ChannelEmitter {
    tx: mpsc::Sender<ProgressEvent>,
    order: Mutex<EventOrder>,
}

impl ChannelEmitter {
    /// Emitter plus the receiving end for the transport
    pub fn channel() -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(1);
        let emitter = Self {
            tx,
            order: Mutex::new(EventOrder::new()),
        };
        (emitter, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelEmitter {
    async fn emit(&self, event: ProgressEvent) -> Result<(), EmitError> {
        let terminal = event.is_terminal();
        self.order.lock().await.check(&event)?;

        self.tx
            .send(event)
            .await
            .map_err(|_| EmitError::Disconnected)?;

        if !terminal {
            // The slot frees up once the consumer has taken the event
            let permit = self
                .tx
                .reserve()
                .await
                .map_err(|_| EmitError::Disconnected)?;
            drop(permit);
        }

        Ok(())
    }
}

/// Encode received events as NDJSON lines for a response body
pub fn ndjson_lines(
    mut rx: mpsc::Receiver<ProgressEvent>,
) -> impl Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            match event.to_ndjson_line() {
                Ok(line) => yield Ok(line),
                Err(e) => error!("Failed to encode progress event: {}", e),
            }
        }
    }
}
