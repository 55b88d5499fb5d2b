use std::time::Duration;

use crate::model::{MediaUrl, NewCompletion};

/// Something that happened to the session: a guard action or a player
/// callback.
///
/// Player callbacks carry the slide or video index they were raised for so
/// a late callback from a previous item cannot affect the current one.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Next,
    Previous,
    AudioStarted { slide: usize },
    AudioPaused { slide: usize },
    AudioEnded { slide: usize },
    /// The environment refused to autoplay the slide's narration.
    AudioBlocked { slide: usize },
    /// Manual play/pause on the current slide's narration.
    ToggleAudio,
    VideoPlaying { index: usize },
    VideoPaused { index: usize },
    /// Playback position as a percentage of the video's duration.
    VideoProgress { index: usize, percent: f64 },
    VideoEnded { index: usize },
    PlayerError { index: usize },
    RetryPlayer,
    StartQuiz,
    SelectAnswer { question: usize, option: usize },
    SubmitQuiz,
    RetryQuiz,
    Leave,
}

/// Work the caller must carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEffect {
    PlayAudio { slide: usize, url: MediaUrl },
    PauseAudio { slide: usize },
    StartProgressPolling { index: usize, interval: Duration },
    StopProgressPolling { index: usize },
    IssueCompletion(NewCompletion),
}
