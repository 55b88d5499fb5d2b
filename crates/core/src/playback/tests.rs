use super::*;
use crate::model::{
    Material, MaterialDraft, MaterialId, MaterialKind, QuizQuestionDraft, UserId,
};
use crate::time::fixed_now;

fn question(answer: i64) -> QuizQuestionDraft {
    QuizQuestionDraft {
        question: "비상구 위치를 확인했습니까?".into(),
        options: vec!["예".into(), "아니오".into()],
        answer,
    }
}

fn cards(audio: &[&str], quiz: Vec<QuizQuestionDraft>) -> Material {
    MaterialDraft {
        title: "출입 통제".into(),
        kind: Some(MaterialKind::Card),
        card_images: (0..audio.len()).map(|i| format!("/objects/slide{i}.png")).collect(),
        audio_urls: audio.iter().map(|a| (*a).to_owned()).collect(),
        quiz,
        ..MaterialDraft::default()
    }
    .validate(fixed_now())
    .unwrap()
    .assign_id(MaterialId::generate())
}

fn videos(urls: &[&str], quiz: Vec<QuizQuestionDraft>) -> Material {
    MaterialDraft {
        title: "화재 대응".into(),
        kind: Some(MaterialKind::Video),
        video_urls: urls.iter().map(|u| (*u).to_owned()).collect(),
        quiz,
        ..MaterialDraft::default()
    }
    .validate(fixed_now())
    .unwrap()
    .assign_id(MaterialId::generate())
}

fn completions(effects: &[PlaybackEffect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, PlaybackEffect::IssueCompletion(_)))
        .count()
}

const EMBED: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[test]
fn silent_slides_are_unlocked_on_entry() {
    let material = cards(&["", "", ""], vec![question(0)]);
    let (mut s, effects) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    assert!(effects.is_empty());
    for i in 0..3 {
        assert_eq!(s.cursor(), i);
        assert!(s.can_proceed());
        if i < 2 {
            assert!(s.apply(PlaybackEvent::Next).unwrap().is_empty());
        }
    }
    assert!(s.can_start_quiz());
}

#[test]
fn narrated_slide_blocks_until_audio_ends() {
    let material = cards(&["", "/objects/two.mp3"], vec![question(0)]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();

    let effects = s.apply(PlaybackEvent::Next).unwrap();
    assert!(matches!(
        effects.as_slice(),
        [PlaybackEffect::PlayAudio { slide: 1, .. }]
    ));
    assert!(!s.can_proceed());

    s.apply(PlaybackEvent::AudioStarted { slide: 1 }).unwrap();
    s.apply(PlaybackEvent::AudioPaused { slide: 1 }).unwrap();
    assert_eq!(s.apply(PlaybackEvent::Next), Err(PlaybackError::Locked));
    assert_eq!(s.apply(PlaybackEvent::StartQuiz), Err(PlaybackError::Locked));

    s.apply(PlaybackEvent::AudioEnded { slide: 1 }).unwrap();
    assert!(s.can_start_quiz());
}

#[test]
fn stale_audio_callback_cannot_unlock_another_slide() {
    let material = cards(&["/objects/one.mp3", "/objects/two.mp3"], vec![question(0)]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::AudioEnded { slide: 0 }).unwrap();
    s.apply(PlaybackEvent::Next).unwrap();

    s.apply(PlaybackEvent::AudioEnded { slide: 0 }).unwrap();
    assert!(!s.can_proceed());
}

#[test]
fn moving_back_is_free_and_re_gates() {
    let material = cards(&["/objects/one.mp3", ""], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    assert_eq!(s.apply(PlaybackEvent::Previous), Ok(Vec::new()));

    s.apply(PlaybackEvent::AudioEnded { slide: 0 }).unwrap();
    s.apply(PlaybackEvent::Next).unwrap();
    let effects = s.apply(PlaybackEvent::Previous).unwrap();
    assert!(matches!(
        effects.as_slice(),
        [PlaybackEffect::PlayAudio { slide: 0, .. }]
    ));
    assert_eq!(s.cursor(), 0);
    assert!(!s.can_proceed());
}

#[test]
fn leaving_mid_narration_pauses_audio() {
    let material = cards(&["/objects/one.mp3"], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::AudioStarted { slide: 0 }).unwrap();
    assert_eq!(
        s.apply(PlaybackEvent::Leave),
        Ok(vec![PlaybackEffect::PauseAudio { slide: 0 }])
    );
    assert_eq!(s.apply(PlaybackEvent::Next), Err(PlaybackError::SessionClosed));
}

#[test]
fn toggle_needs_narration() {
    let material = cards(&[""], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    assert_eq!(s.apply(PlaybackEvent::ToggleAudio), Err(PlaybackError::NoAudio(0)));
}

#[test]
fn two_correct_answers_pass_and_write_once() {
    let material = cards(&[""], vec![question(0), question(1)]);
    let guard = UserId::generate();
    let (mut s, _) = PlaybackSession::start(&material, guard).unwrap();
    s.apply(PlaybackEvent::StartQuiz).unwrap();
    assert_eq!(s.step(), Step::Quiz);

    s.apply(PlaybackEvent::SelectAnswer { question: 0, option: 0 }).unwrap();
    assert_eq!(
        s.apply(PlaybackEvent::SubmitQuiz),
        Err(PlaybackError::QuizIncomplete { unanswered: 1 })
    );
    s.apply(PlaybackEvent::SelectAnswer { question: 1, option: 1 }).unwrap();
    let effects = s.apply(PlaybackEvent::SubmitQuiz).unwrap();

    let result = s.result().unwrap();
    assert_eq!(result.score(), 100);
    assert!(result.passed());
    let [PlaybackEffect::IssueCompletion(record)] = effects.as_slice() else {
        panic!("expected one completion, got {effects:?}");
    };
    assert_eq!(record.guard_id, guard);
    assert_eq!(record.material_id, material.id);
    assert_eq!(record.material_title, "출입 통제");
    assert_eq!(record.passed, Some(true));

    assert_eq!(
        s.apply(PlaybackEvent::SubmitQuiz),
        Err(PlaybackError::NotInStep(Step::Result))
    );
    assert_eq!(s.apply(PlaybackEvent::RetryQuiz), Err(PlaybackError::NoRetryAfterPass));
}

#[test]
fn half_correct_fails_without_write_and_retry_clears_answers() {
    let material = cards(&[""], vec![question(0), question(1)]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::Next).unwrap();
    s.apply(PlaybackEvent::SelectAnswer { question: 0, option: 0 }).unwrap();
    s.apply(PlaybackEvent::SelectAnswer { question: 1, option: 0 }).unwrap();

    let effects = s.apply(PlaybackEvent::SubmitQuiz).unwrap();
    assert_eq!(completions(&effects), 0);
    assert_eq!(s.result().map(|r| r.score()), Some(50));
    assert!(!s.completion_issued());

    s.apply(PlaybackEvent::RetryQuiz).unwrap();
    assert_eq!(s.step(), Step::Quiz);
    assert!(s.answers().iter().all(Option::is_none));
    assert!(s.result().is_none());

    s.apply(PlaybackEvent::SelectAnswer { question: 0, option: 0 }).unwrap();
    s.apply(PlaybackEvent::SelectAnswer { question: 1, option: 1 }).unwrap();
    let effects = s.apply(PlaybackEvent::SubmitQuiz).unwrap();
    assert_eq!(completions(&effects), 1);
}

#[test]
fn empty_quiz_completes_immediately() {
    let material = cards(&["", ""], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::Next).unwrap();
    let effects = s.apply(PlaybackEvent::Next).unwrap();
    assert_eq!(s.step(), Step::Result);
    assert_eq!(s.result().map(|r| r.score()), Some(100));
    assert_eq!(completions(&effects), 1);
}

#[test]
fn answer_indices_are_checked() {
    let material = cards(&[""], vec![question(0)]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    assert_eq!(
        s.apply(PlaybackEvent::SelectAnswer { question: 0, option: 0 }),
        Err(PlaybackError::NotInStep(Step::Content))
    );
    s.apply(PlaybackEvent::StartQuiz).unwrap();
    assert_eq!(
        s.apply(PlaybackEvent::SelectAnswer { question: 1, option: 0 }),
        Err(PlaybackError::QuestionOutOfRange { question: 1, count: 1 })
    );
    assert_eq!(
        s.apply(PlaybackEvent::SelectAnswer { question: 0, option: 2 }),
        Err(PlaybackError::OptionOutOfRange { question: 0, option: 2 })
    );
}

#[test]
fn seeking_past_threshold_unlocks_before_end() {
    let material = videos(&[EMBED], vec![question(0)]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::VideoPlaying { index: 0 }).unwrap();
    s.apply(PlaybackEvent::VideoProgress { index: 0, percent: 85.0 }).unwrap();
    assert!(s.can_proceed());

    let effects = s.apply(PlaybackEvent::VideoEnded { index: 0 }).unwrap();
    assert_eq!(effects, vec![PlaybackEffect::StopProgressPolling { index: 0 }]);
    assert!(s.can_start_quiz());
}

#[test]
fn video_gate_requires_threshold_or_end() {
    let material = videos(&["/objects/a.mp4", "/objects/b.mp4"], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::VideoProgress { index: 0, percent: 50.0 }).unwrap();
    assert_eq!(s.apply(PlaybackEvent::Next), Err(PlaybackError::Locked));

    s.apply(PlaybackEvent::VideoEnded { index: 0 }).unwrap();
    s.apply(PlaybackEvent::Next).unwrap();
    assert_eq!(s.cursor(), 1);
    assert!(!s.can_proceed());
}

#[test]
fn embedded_polling_stops_on_cursor_change() {
    let material = videos(&[EMBED, EMBED], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    let started = s.apply(PlaybackEvent::VideoPlaying { index: 0 }).unwrap();
    assert_eq!(
        started,
        vec![PlaybackEffect::StartProgressPolling {
            index: 0,
            interval: PROGRESS_POLL_INTERVAL
        }]
    );
    s.apply(PlaybackEvent::VideoProgress { index: 0, percent: 81.0 }).unwrap();
    let moved = s.apply(PlaybackEvent::Next).unwrap();
    assert_eq!(moved, vec![PlaybackEffect::StopProgressPolling { index: 0 }]);

    s.apply(PlaybackEvent::VideoPlaying { index: 1 }).unwrap();
    let left = s.apply(PlaybackEvent::Leave).unwrap();
    assert_eq!(left, vec![PlaybackEffect::StopProgressPolling { index: 1 }]);
}

#[test]
fn player_error_blocks_until_retry() {
    let material = videos(&[EMBED], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    s.apply(PlaybackEvent::VideoProgress { index: 0, percent: 90.0 }).unwrap();
    s.apply(PlaybackEvent::PlayerError { index: 0 }).unwrap();
    assert_eq!(s.apply(PlaybackEvent::StartQuiz), Err(PlaybackError::Locked));

    s.apply(PlaybackEvent::RetryPlayer).unwrap();
    let effects = s.apply(PlaybackEvent::StartQuiz).unwrap();
    assert_eq!(completions(&effects), 1);
}

#[test]
fn wrong_kind_events_are_rejected() {
    let material = videos(&[EMBED], vec![]);
    let (mut s, _) = PlaybackSession::start(&material, UserId::generate()).unwrap();
    assert_eq!(
        s.apply(PlaybackEvent::AudioEnded { slide: 0 }),
        Err(PlaybackError::WrongKind(MaterialKind::Card))
    );
}

#[test]
fn empty_material_cannot_start() {
    let material = cards(&[], vec![]);
    assert_eq!(
        PlaybackSession::start(&material, UserId::generate()).unwrap_err(),
        PlaybackError::EmptyContent
    );
}
