use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use training_core::playback::PlaybackEvent;

/// Reads the embedded player's position.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Current position of video `index` as a percentage, or `None` while
    /// the duration is still unknown.
    async fn progress_percent(&self, index: usize) -> Option<f64>;
}

/// Interval task feeding `VideoProgress` events into the driver's queue.
///
/// The task is aborted when the poller is dropped.
#[derive(Debug)]
pub struct ProgressPoller {
    index: usize,
    handle: JoinHandle<()>,
}

impl ProgressPoller {
    #[must_use]
    pub fn spawn(
        source: Arc<dyn ProgressSource>,
        index: usize,
        interval: Duration,
        events: mpsc::Sender<PlaybackEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(percent) = source.progress_percent(index).await else {
                    continue;
                };
                if events
                    .send(PlaybackEvent::VideoProgress { index, percent })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        debug!(index, "progress polling started");
        Self { index, handle }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(index = self.index, "progress polling stopped");
    }
}
