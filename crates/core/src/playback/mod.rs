//! Guard-side playback: content gating, quiz and result.
//!
//! [`PlaybackSession`] is a pure transition function. Callers feed it
//! [`PlaybackEvent`]s and carry out the returned [`PlaybackEffect`]s
//! (audio, progress polling, the completion write).

mod event;
mod gate;
mod session;

pub use event::{PlaybackEffect, PlaybackEvent};
pub use gate::{AudioState, PROGRESS_POLL_INTERVAL, SlideGate, VIDEO_UNLOCK_PERCENT, VideoGate};
pub use session::{PlaybackError, PlaybackSession, Step};

#[cfg(test)]
mod tests;
