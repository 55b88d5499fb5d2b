use std::time::Duration;

use crate::model::{MediaUrl, Slide, VideoSource};
use crate::playback::event::PlaybackEffect;

/// Observed progress at which a video counts as watched.
pub const VIDEO_UNLOCK_PERCENT: f64 = 80.0;

/// How often an embedded player is asked for its position.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

//
// ─── SLIDES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Idle,
    /// Playback was requested and the player has not confirmed it yet.
    Requested,
    Playing,
    Paused,
    Blocked,
}

/// Forward gate for the current card slide.
///
/// A narrated slide unlocks only when its audio ends on its own. Pausing
/// or seeking never unlocks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideGate {
    slide: usize,
    audio: Option<MediaUrl>,
    unlocked: bool,
    state: AudioState,
}

impl SlideGate {
    pub(crate) fn enter(slide: usize, item: &Slide) -> (Self, Option<PlaybackEffect>) {
        let gate = Self {
            slide,
            audio: item.audio.clone(),
            unlocked: item.audio.is_none(),
            state: if item.audio.is_some() {
                AudioState::Requested
            } else {
                AudioState::Idle
            },
        };
        let autoplay = gate.audio.clone().map(|url| PlaybackEffect::PlayAudio { slide, url });
        (gate, autoplay)
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    #[must_use]
    pub fn audio_state(&self) -> AudioState {
        self.state
    }

    pub(crate) fn on_started(&mut self) {
        if self.audio.is_some() {
            self.state = AudioState::Playing;
        }
    }

    pub(crate) fn on_paused(&mut self) {
        if self.audio.is_some() {
            self.state = AudioState::Paused;
        }
    }

    pub(crate) fn on_ended(&mut self) {
        if self.audio.is_some() {
            self.state = AudioState::Idle;
            self.unlocked = true;
        }
    }

    pub(crate) fn on_blocked(&mut self) {
        if self.audio.is_some() {
            self.state = AudioState::Blocked;
        }
    }

    /// Returns `None` when the slide has no narration.
    pub(crate) fn toggle(&mut self) -> Option<PlaybackEffect> {
        let url = self.audio.clone()?;
        if self.state == AudioState::Playing {
            self.state = AudioState::Paused;
            Some(PlaybackEffect::PauseAudio { slide: self.slide })
        } else {
            self.state = AudioState::Requested;
            Some(PlaybackEffect::PlayAudio {
                slide: self.slide,
                url,
            })
        }
    }

    pub(crate) fn release(&mut self) -> Option<PlaybackEffect> {
        match self.state {
            AudioState::Requested | AudioState::Playing => {
                self.state = AudioState::Idle;
                Some(PlaybackEffect::PauseAudio { slide: self.slide })
            }
            _ => None,
        }
    }
}

//
// ─── VIDEOS ────────────────────────────────────────────────────────────────────
//

/// Forward gate for the current video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoGate {
    index: usize,
    embedded: bool,
    progress: f64,
    ended: bool,
    error: bool,
    polling: bool,
}

impl VideoGate {
    pub(crate) fn enter(index: usize, source: &VideoSource) -> Self {
        Self {
            index,
            embedded: source.is_embedded(),
            progress: 0.0,
            ended: false,
            error: false,
            polling: false,
        }
    }

    /// Highest progress percentage observed so far.
    #[must_use]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.polling
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        !self.error && (self.ended || self.progress >= VIDEO_UNLOCK_PERCENT)
    }

    pub(crate) fn on_playing(&mut self) -> Option<PlaybackEffect> {
        if self.error || !self.embedded || self.polling {
            return None;
        }
        self.polling = true;
        Some(PlaybackEffect::StartProgressPolling {
            index: self.index,
            interval: PROGRESS_POLL_INTERVAL,
        })
    }

    pub(crate) fn on_progress(&mut self, percent: f64) {
        if self.error || percent.is_nan() {
            return;
        }
        self.progress = self.progress.max(percent.clamp(0.0, 100.0));
    }

    pub(crate) fn on_ended(&mut self) -> Option<PlaybackEffect> {
        if !self.error {
            self.ended = true;
        }
        self.release()
    }

    pub(crate) fn on_error(&mut self) -> Option<PlaybackEffect> {
        self.error = true;
        self.release()
    }

    pub(crate) fn retry(&mut self) {
        self.error = false;
    }

    pub(crate) fn release(&mut self) -> Option<PlaybackEffect> {
        if !self.polling {
            return None;
        }
        self.polling = false;
        Some(PlaybackEffect::StopProgressPolling { index: self.index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedded() -> VideoGate {
        VideoGate::enter(0, &VideoSource::parse("https://youtu.be/dQw4w9WgXcQ").unwrap())
    }

    #[test]
    fn video_unlocks_at_threshold() {
        let mut gate = embedded();
        gate.on_progress(79.9);
        assert!(!gate.is_unlocked());
        gate.on_progress(80.0);
        assert!(gate.is_unlocked());
    }

    #[test]
    fn progress_never_moves_backwards() {
        let mut gate = embedded();
        gate.on_progress(90.0);
        gate.on_progress(10.0);
        assert!((gate.progress() - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn error_blocks_until_retry() {
        let mut gate = embedded();
        gate.on_progress(95.0);
        gate.on_error();
        assert!(!gate.is_unlocked());
        gate.on_progress(99.0);
        gate.retry();
        assert!(gate.is_unlocked());
        assert!((gate.progress() - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn polling_starts_once_and_stops_on_pause() {
        let mut gate = embedded();
        assert!(matches!(
            gate.on_playing(),
            Some(PlaybackEffect::StartProgressPolling { index: 0, .. })
        ));
        assert_eq!(gate.on_playing(), None);
        assert_eq!(
            gate.release(),
            Some(PlaybackEffect::StopProgressPolling { index: 0 })
        );
        assert_eq!(gate.release(), None);
    }

    #[test]
    fn direct_media_never_polls() {
        let source = VideoSource::parse("/objects/uploads/fire.mp4").unwrap();
        let mut gate = VideoGate::enter(2, &source);
        assert_eq!(gate.on_playing(), None);
        assert!(!gate.is_polling());
    }

    #[test]
    fn slide_pause_does_not_unlock() {
        let slide = Slide {
            image: MediaUrl::parse("/objects/a.png").unwrap(),
            audio: Some(MediaUrl::parse("/objects/a.mp3").unwrap()),
        };
        let (mut gate, autoplay) = SlideGate::enter(0, &slide);
        assert!(autoplay.is_some());
        gate.on_started();
        gate.on_paused();
        assert!(!gate.is_unlocked());
        gate.on_ended();
        assert!(gate.is_unlocked());
    }

    #[test]
    fn blocked_autoplay_recovers_through_toggle() {
        let slide = Slide {
            image: MediaUrl::parse("/objects/a.png").unwrap(),
            audio: Some(MediaUrl::parse("/objects/a.mp3").unwrap()),
        };
        let (mut gate, _) = SlideGate::enter(3, &slide);
        gate.on_blocked();
        assert_eq!(gate.audio_state(), AudioState::Blocked);
        assert!(matches!(
            gate.toggle(),
            Some(PlaybackEffect::PlayAudio { slide: 3, .. })
        ));
        gate.on_started();
        assert_eq!(gate.toggle(), Some(PlaybackEffect::PauseAudio { slide: 3 }));
    }
}
