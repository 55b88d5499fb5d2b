use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use training_core::model::{CompletionRecord, NewCompletion};
use training_core::playback::{PlaybackEffect, PlaybackEvent, PlaybackSession, Step};

use crate::error::PlaybackServiceError;
use crate::playback::poller::{ProgressSource, ProgressPoller};
use crate::record_service::RecordService;

const EVENT_QUEUE_DEPTH: usize = 32;

/// What happened to the completion write issued by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Saved(CompletionRecord),
    /// The write failed. The traversal stays in `Result`; the message is
    /// meant for the guard.
    Failed(String),
}

/// Result of one dispatched event.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Every effect the transition produced, including the ones the driver
    /// already carried out. The client acts on the audio effects.
    pub effects: Vec<PlaybackEffect>,
    pub completion: Option<CompletionStatus>,
}

/// Owns one playback session and carries out its effects.
///
/// Progress polling runs on a background task that feeds events into an
/// internal queue; call [`PlaybackDriver::pump`] or
/// [`PlaybackDriver::next_polled`] to apply them.
pub struct PlaybackDriver {
    session: PlaybackSession,
    records: Arc<RecordService>,
    source: Option<Arc<dyn ProgressSource>>,
    poller: Option<ProgressPoller>,
    queue_tx: mpsc::Sender<PlaybackEvent>,
    queue_rx: mpsc::Receiver<PlaybackEvent>,
}

impl PlaybackDriver {
    pub(crate) fn new(session: PlaybackSession, records: Arc<RecordService>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        Self {
            session,
            records,
            source: None,
            poller: None,
            queue_tx,
            queue_rx,
        }
    }

    /// Attaches the embedded player used for progress polling.
    #[must_use]
    pub fn with_progress_source(mut self, source: Arc<dyn ProgressSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Applies `event` and executes the resulting effects.
    ///
    /// A failed completion write is reported in the outcome, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackServiceError::Playback` when the session rejects the
    /// event; nothing is executed in that case.
    pub async fn dispatch(
        &mut self,
        event: PlaybackEvent,
    ) -> Result<DispatchOutcome, PlaybackServiceError> {
        let before = self.session.step();
        let effects = self.session.apply(event)?;
        if self.session.step() != before {
            debug!(from = ?before, to = ?self.session.step(), "playback step changed");
        }

        let mut completion = None;
        for effect in &effects {
            match effect {
                PlaybackEffect::StartProgressPolling { index, interval } => {
                    if let Some(source) = &self.source {
                        self.poller = Some(ProgressPoller::spawn(
                            Arc::clone(source),
                            *index,
                            *interval,
                            self.queue_tx.clone(),
                        ));
                    }
                }
                PlaybackEffect::StopProgressPolling { index } => {
                    if self.poller.as_ref().is_some_and(|p| p.index() == *index) {
                        self.poller = None;
                    }
                }
                PlaybackEffect::IssueCompletion(request) => {
                    completion = Some(self.write_completion(request.clone()).await);
                }
                PlaybackEffect::PlayAudio { .. } | PlaybackEffect::PauseAudio { .. } => {}
            }
        }
        if self.session.is_closed() {
            self.poller = None;
        }
        Ok(DispatchOutcome {
            effects,
            completion,
        })
    }

    async fn write_completion(&self, request: NewCompletion) -> CompletionStatus {
        match self.records.record_completion(request).await {
            Ok(record) => {
                info!(record_id = %record.id, "playback completion saved");
                CompletionStatus::Saved(record)
            }
            Err(err) => {
                warn!(error = %err, "playback completion write failed");
                CompletionStatus::Failed(err.to_string())
            }
        }
    }

    /// Applies every queued poller event without waiting. Events left over
    /// after the session closed are discarded.
    ///
    /// # Errors
    ///
    /// Propagates the first rejected event.
    pub async fn pump(&mut self) -> Result<usize, PlaybackServiceError> {
        let mut applied = 0;
        while let Ok(event) = self.queue_rx.try_recv() {
            if self.session.is_closed() {
                continue;
            }
            self.dispatch(event).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Waits for the next poller event and applies it. Returns `None` when
    /// no poller is running.
    ///
    /// # Errors
    ///
    /// Propagates a rejected event.
    pub async fn next_polled(&mut self) -> Option<Result<DispatchOutcome, PlaybackServiceError>> {
        if self.session.is_closed() || (self.poller.is_none() && self.queue_rx.is_empty()) {
            return None;
        }
        let event = self.queue_rx.recv().await?;
        Some(self.dispatch(event).await)
    }

    /// Walks away from the material, stopping any polling.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackServiceError::Playback` if the session is already closed.
    pub async fn leave(&mut self) -> Result<DispatchOutcome, PlaybackServiceError> {
        self.dispatch(PlaybackEvent::Leave).await
    }

    #[must_use]
    pub fn step(&self) -> Step {
        self.session.step()
    }
}
