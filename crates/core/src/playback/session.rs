use thiserror::Error;

use crate::model::{Material, MaterialContent, MaterialKind, NewCompletion, QuizScore, UserId};
use crate::playback::event::{PlaybackEffect, PlaybackEvent};
use crate::playback::gate::{SlideGate, VideoGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Content,
    Quiz,
    Result,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PlaybackError {
    #[error("material has nothing to play")]
    EmptyContent,

    #[error("current item has not been completed yet")]
    Locked,

    #[error("action not available during the {0:?} step")]
    NotInStep(Step),

    #[error("{unanswered} question(s) still unanswered")]
    QuizIncomplete { unanswered: usize },

    #[error("question {question} does not exist (quiz has {count})")]
    QuestionOutOfRange { question: usize, count: usize },

    #[error("question {question} has no option {option}")]
    OptionOutOfRange { question: usize, option: usize },

    #[error("quiz already passed")]
    NoRetryAfterPass,

    #[error("session has been closed")]
    SessionClosed,

    #[error("event only applies to {0:?} materials")]
    WrongKind(MaterialKind),

    #[error("slide {0} has no audio")]
    NoAudio(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Gate {
    Slide(SlideGate),
    Video(VideoGate),
}

impl Gate {
    fn is_unlocked(&self) -> bool {
        match self {
            Gate::Slide(g) => g.is_unlocked(),
            Gate::Video(g) => g.is_unlocked(),
        }
    }

    fn release(&mut self) -> Option<PlaybackEffect> {
        match self {
            Gate::Slide(g) => g.release(),
            Gate::Video(g) => g.release(),
        }
    }
}

/// One guard's traversal of one material.
///
/// Never persisted. Dropping it is the same as walking away.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    material: Material,
    guard_id: UserId,
    step: Step,
    cursor: usize,
    gate: Gate,
    answers: Vec<Option<usize>>,
    result: Option<QuizScore>,
    completion_issued: bool,
    closed: bool,
}

impl PlaybackSession {
    /// Opens the first slide or video.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::EmptyContent` if the material has no slides
    /// or videos.
    pub fn start(
        material: &Material,
        guard_id: UserId,
    ) -> Result<(Self, Vec<PlaybackEffect>), PlaybackError> {
        let (gate, autoplay) = gate_for(&material.content, 0)?;
        let session = Self {
            material: material.clone(),
            guard_id,
            step: Step::Content,
            cursor: 0,
            gate,
            answers: Vec::new(),
            result: None,
            completion_issued: false,
            closed: false,
        };
        Ok((session, autoplay.into_iter().collect()))
    }

    #[must_use]
    pub fn material(&self) -> &Material {
        &self.material
    }

    #[must_use]
    pub fn guard_id(&self) -> UserId {
        self.guard_id
    }

    #[must_use]
    pub fn step(&self) -> Step {
        self.step
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_last_item(&self) -> bool {
        self.cursor + 1 >= self.material.content.len()
    }

    /// Whether the current item's gate is open.
    #[must_use]
    pub fn can_proceed(&self) -> bool {
        self.gate.is_unlocked()
    }

    #[must_use]
    pub fn can_start_quiz(&self) -> bool {
        !self.closed && self.step == Step::Content && self.is_last_item() && self.can_proceed()
    }

    #[must_use]
    pub fn slide_gate(&self) -> Option<&SlideGate> {
        match &self.gate {
            Gate::Slide(g) => Some(g),
            Gate::Video(_) => None,
        }
    }

    #[must_use]
    pub fn video_gate(&self) -> Option<&VideoGate> {
        match &self.gate {
            Gate::Video(g) => Some(g),
            Gate::Slide(_) => None,
        }
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<usize>] {
        &self.answers
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizScore> {
        self.result
    }

    #[must_use]
    pub fn completion_issued(&self) -> bool {
        self.completion_issued
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies one event and returns the effects the caller must run.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` when the event is not allowed in the current
    /// state. The session is left unchanged in that case.
    pub fn apply(&mut self, event: PlaybackEvent) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        if self.closed {
            return Err(PlaybackError::SessionClosed);
        }
        match event {
            PlaybackEvent::Next => self.next(),
            PlaybackEvent::Previous => self.previous(),
            PlaybackEvent::AudioStarted { slide } => {
                self.on_slide(slide, |g| {
                    g.on_started();
                    None
                })
            }
            PlaybackEvent::AudioPaused { slide } => {
                self.on_slide(slide, |g| {
                    g.on_paused();
                    None
                })
            }
            PlaybackEvent::AudioEnded { slide } => {
                self.on_slide(slide, |g| {
                    g.on_ended();
                    None
                })
            }
            PlaybackEvent::AudioBlocked { slide } => {
                self.on_slide(slide, |g| {
                    g.on_blocked();
                    None
                })
            }
            PlaybackEvent::ToggleAudio => self.toggle_audio(),
            PlaybackEvent::VideoPlaying { index } => self.on_video(index, VideoGate::on_playing),
            PlaybackEvent::VideoPaused { index } => self.on_video(index, VideoGate::release),
            PlaybackEvent::VideoProgress { index, percent } => self.on_video(index, |g| {
                g.on_progress(percent);
                None
            }),
            PlaybackEvent::VideoEnded { index } => self.on_video(index, VideoGate::on_ended),
            PlaybackEvent::PlayerError { index } => self.on_video(index, VideoGate::on_error),
            PlaybackEvent::RetryPlayer => {
                self.require_step(Step::Content)?;
                match &mut self.gate {
                    Gate::Video(g) => {
                        g.retry();
                        Ok(Vec::new())
                    }
                    Gate::Slide(_) => Err(PlaybackError::WrongKind(MaterialKind::Video)),
                }
            }
            PlaybackEvent::StartQuiz => self.start_quiz(),
            PlaybackEvent::SelectAnswer { question, option } => self.select(question, option),
            PlaybackEvent::SubmitQuiz => self.submit(),
            PlaybackEvent::RetryQuiz => self.retry_quiz(),
            PlaybackEvent::Leave => {
                self.closed = true;
                Ok(self.gate.release().into_iter().collect())
            }
        }
    }

    fn require_step(&self, step: Step) -> Result<(), PlaybackError> {
        if self.step == step {
            Ok(())
        } else {
            Err(PlaybackError::NotInStep(self.step))
        }
    }

    fn move_to(&mut self, index: usize) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        let (gate, autoplay) = gate_for(&self.material.content, index)?;
        let mut effects: Vec<_> = self.gate.release().into_iter().collect();
        self.gate = gate;
        self.cursor = index;
        effects.extend(autoplay);
        Ok(effects)
    }

    fn next(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Content)?;
        if !self.gate.is_unlocked() {
            return Err(PlaybackError::Locked);
        }
        if self.is_last_item() {
            return self.start_quiz();
        }
        self.move_to(self.cursor + 1)
    }

    fn previous(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Content)?;
        if self.cursor == 0 {
            return Ok(Vec::new());
        }
        self.move_to(self.cursor - 1)
    }

    fn on_slide(
        &mut self,
        slide: usize,
        f: impl FnOnce(&mut SlideGate) -> Option<PlaybackEffect>,
    ) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        if self.material.kind() != MaterialKind::Card {
            return Err(PlaybackError::WrongKind(MaterialKind::Card));
        }
        match &mut self.gate {
            Gate::Slide(g) if self.step == Step::Content && slide == self.cursor => {
                Ok(f(g).into_iter().collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn on_video(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut VideoGate) -> Option<PlaybackEffect>,
    ) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        if self.material.kind() != MaterialKind::Video {
            return Err(PlaybackError::WrongKind(MaterialKind::Video));
        }
        match &mut self.gate {
            Gate::Video(g) if self.step == Step::Content && index == self.cursor => {
                Ok(f(g).into_iter().collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn toggle_audio(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Content)?;
        match &mut self.gate {
            Gate::Slide(g) => g
                .toggle()
                .map(|e| vec![e])
                .ok_or(PlaybackError::NoAudio(self.cursor)),
            Gate::Video(_) => Err(PlaybackError::WrongKind(MaterialKind::Card)),
        }
    }

    fn start_quiz(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Content)?;
        if !self.is_last_item() || !self.gate.is_unlocked() {
            return Err(PlaybackError::Locked);
        }
        let mut effects: Vec<_> = self.gate.release().into_iter().collect();
        if self.material.quiz.is_empty() {
            self.step = Step::Result;
            effects.extend(self.finish(QuizScore::auto_pass()));
        } else {
            self.step = Step::Quiz;
            self.answers = vec![None; self.material.quiz.len()];
        }
        Ok(effects)
    }

    fn select(&mut self, question: usize, option: usize) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Quiz)?;
        let count = self.material.quiz.len();
        let q = self
            .material
            .quiz
            .questions()
            .get(question)
            .ok_or(PlaybackError::QuestionOutOfRange { question, count })?;
        if option >= q.options().len() {
            return Err(PlaybackError::OptionOutOfRange { question, option });
        }
        self.answers[question] = Some(option);
        Ok(Vec::new())
    }

    fn submit(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Quiz)?;
        let sheet: Vec<usize> = self.answers.iter().flatten().copied().collect();
        let unanswered = self.answers.len() - sheet.len();
        if unanswered > 0 {
            return Err(PlaybackError::QuizIncomplete { unanswered });
        }
        let score = self
            .material
            .quiz
            .grade(&sheet)
            .map_err(|_| PlaybackError::QuizIncomplete { unanswered: 0 })?;
        self.step = Step::Result;
        Ok(self.finish(score).into_iter().collect())
    }

    fn finish(&mut self, score: QuizScore) -> Option<PlaybackEffect> {
        self.result = Some(score);
        if !score.passed() || self.completion_issued {
            return None;
        }
        self.completion_issued = true;
        Some(PlaybackEffect::IssueCompletion(NewCompletion::for_material(
            &self.material,
            self.guard_id,
            &score,
        )))
    }

    fn retry_quiz(&mut self) -> Result<Vec<PlaybackEffect>, PlaybackError> {
        self.require_step(Step::Result)?;
        if self.result.is_some_and(|r| r.passed()) {
            return Err(PlaybackError::NoRetryAfterPass);
        }
        self.answers = vec![None; self.material.quiz.len()];
        self.result = None;
        self.step = Step::Quiz;
        Ok(Vec::new())
    }
}

fn gate_for(
    content: &MaterialContent,
    index: usize,
) -> Result<(Gate, Option<PlaybackEffect>), PlaybackError> {
    match content {
        MaterialContent::Cards(slides) => {
            let slide = slides.get(index).ok_or(PlaybackError::EmptyContent)?;
            let (gate, autoplay) = SlideGate::enter(index, slide);
            Ok((Gate::Slide(gate), autoplay))
        }
        MaterialContent::Videos(videos) => {
            let video = videos.get(index).ok_or(PlaybackError::EmptyContent)?;
            Ok((Gate::Video(VideoGate::enter(index, video)), None))
        }
    }
}
