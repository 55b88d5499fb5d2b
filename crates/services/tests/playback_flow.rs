use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use services::playback::{CompletionStatus, PlaybackService, ProgressSource, StaticIdentity};
use services::{Clock, MaterialService, PlaybackServiceError, RecordService};
use storage::repository::{
    CompletionRepository, InMemoryRepository, NotificationRepository, UserRepository,
};
use training_core::model::{
    Material, MaterialDraft, MaterialKind, QuizQuestionDraft, Role, User, UserDraft, UserId,
};
use training_core::playback::{PlaybackEvent, Step};
use training_core::time::fixed_now;

struct Harness {
    repo: InMemoryRepository,
    materials: MaterialService,
    records: Arc<RecordService>,
}

impl Harness {
    fn new() -> Self {
        let repo = InMemoryRepository::new();
        let clock = Clock::Fixed(fixed_now());
        let materials = MaterialService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let records = Arc::new(RecordService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        ));
        Self {
            repo,
            materials,
            records,
        }
    }

    async fn guard(&self) -> User {
        let guard = UserDraft {
            name: "정경비".into(),
            phone: Some("010-2222-3333".into()),
            ..UserDraft::default()
        }
        .validate(UserId::generate(), Role::Guard, fixed_now())
        .unwrap();
        self.repo.insert_user(&guard).await.unwrap();
        guard
    }

    fn playback(&self, guard: Option<UserId>) -> PlaybackService {
        PlaybackService::new(
            Arc::new(self.repo.clone()),
            Arc::clone(&self.records),
            Arc::new(StaticIdentity(guard)),
        )
    }
}

fn question(answer: i64) -> QuizQuestionDraft {
    QuizQuestionDraft {
        question: "순찰 시 확인할 것은?".into(),
        options: vec!["출입문".into(), "화단".into()],
        answer,
    }
}

async fn card_material(h: &Harness) -> Material {
    h.materials
        .create(MaterialDraft {
            title: "야간 순찰".into(),
            kind: Some(MaterialKind::Card),
            card_images: vec!["/objects/1.png".into(), "/objects/2.png".into()],
            audio_urls: vec![String::new(), "/objects/2.mp3".into()],
            quiz: vec![question(0), question(1)],
            ..MaterialDraft::default()
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn card_traversal_pass_writes_one_record_and_clears_notice() {
    let h = Harness::new();
    let guard = h.guard().await;
    let material = card_material(&h).await;
    assert_eq!(h.repo.list_for_guard(guard.id).await.unwrap().len(), 1);

    let (mut driver, opened) = h.playback(Some(guard.id)).open(material.id).await.unwrap();
    assert!(opened.effects.is_empty());

    let moved = driver.dispatch(PlaybackEvent::Next).await.unwrap();
    assert_eq!(moved.effects.len(), 1);
    assert!(matches!(
        driver.dispatch(PlaybackEvent::StartQuiz).await,
        Err(PlaybackServiceError::Playback(_))
    ));
    driver
        .dispatch(PlaybackEvent::AudioEnded { slide: 1 })
        .await
        .unwrap();
    driver.dispatch(PlaybackEvent::StartQuiz).await.unwrap();

    // First attempt: one of two correct.
    for (question, option) in [(0, 0), (1, 0)] {
        driver
            .dispatch(PlaybackEvent::SelectAnswer { question, option })
            .await
            .unwrap();
    }
    let failed = driver.dispatch(PlaybackEvent::SubmitQuiz).await.unwrap();
    assert!(failed.completion.is_none());
    assert!(h.repo.list_records().await.unwrap().is_empty());

    driver.dispatch(PlaybackEvent::RetryQuiz).await.unwrap();
    for (question, option) in [(0, 0), (1, 1)] {
        driver
            .dispatch(PlaybackEvent::SelectAnswer { question, option })
            .await
            .unwrap();
    }
    let passed = driver.dispatch(PlaybackEvent::SubmitQuiz).await.unwrap();

    let Some(CompletionStatus::Saved(record)) = passed.completion else {
        panic!("expected a saved completion, got {:?}", passed.completion);
    };
    assert_eq!(record.score, Some(100));
    assert_eq!(record.material_title, "야간 순찰");
    assert_eq!(h.repo.list_records().await.unwrap().len(), 1);
    assert!(h.repo.list_for_guard(guard.id).await.unwrap().is_empty());
    assert_eq!(driver.step(), Step::Result);
}

struct SteppingPlayer {
    ticks: AtomicU32,
}

#[async_trait]
impl ProgressSource for SteppingPlayer {
    async fn progress_percent(&self, _index: usize) -> Option<f64> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        Some(f64::from(n) * 30.0)
    }
}

#[tokio::test(start_paused = true)]
async fn embedded_video_unlocks_through_polling() {
    let h = Harness::new();
    let guard = h.guard().await;
    let material = h
        .materials
        .create(MaterialDraft {
            title: "소화기 사용법".into(),
            kind: Some(MaterialKind::Video),
            video_urls: vec!["https://youtu.be/dQw4w9WgXcQ".into()],
            ..MaterialDraft::default()
        })
        .await
        .unwrap();

    let (driver, _) = h.playback(Some(guard.id)).open(material.id).await.unwrap();
    let mut driver = driver.with_progress_source(Arc::new(SteppingPlayer {
        ticks: AtomicU32::new(0),
    }));

    driver
        .dispatch(PlaybackEvent::VideoPlaying { index: 0 })
        .await
        .unwrap();
    assert!(driver.is_polling());

    while !driver.session().can_proceed() {
        driver.next_polled().await.unwrap().unwrap();
    }
    assert!(driver.is_polling());

    driver
        .dispatch(PlaybackEvent::VideoPaused { index: 0 })
        .await
        .unwrap();
    assert!(!driver.is_polling());
    driver.pump().await.unwrap();
    assert!(driver.next_polled().await.is_none());

    let done = driver.dispatch(PlaybackEvent::StartQuiz).await.unwrap();
    assert!(matches!(done.completion, Some(CompletionStatus::Saved(_))));
}

#[tokio::test]
async fn completion_write_failure_is_reported_not_raised() {
    let h = Harness::new();
    let material = h
        .materials
        .create(MaterialDraft {
            title: "무전 교신".into(),
            kind: Some(MaterialKind::Card),
            card_images: vec!["/objects/1.png".into()],
            ..MaterialDraft::default()
        })
        .await
        .unwrap();

    // A guard id with no stored user makes the record write fail.
    let (mut driver, _) = h
        .playback(Some(UserId::generate()))
        .open(material.id)
        .await
        .unwrap();
    let outcome = driver.dispatch(PlaybackEvent::StartQuiz).await.unwrap();

    assert!(matches!(outcome.completion, Some(CompletionStatus::Failed(_))));
    assert_eq!(driver.step(), Step::Result);
    driver.leave().await.unwrap();
    assert!(driver.session().is_closed());
}

#[tokio::test]
async fn playback_requires_a_signed_in_guard() {
    let h = Harness::new();
    let material = card_material(&h).await;
    let anonymous = h.playback(None);

    assert!(matches!(
        anonymous.available().await,
        Err(PlaybackServiceError::NoIdentity)
    ));
    assert!(matches!(
        anonymous.open(material.id).await,
        Err(PlaybackServiceError::NoIdentity)
    ));

    let guard = h.guard().await;
    let signed_in = anonymous.for_identity(Arc::new(guard));
    assert_eq!(signed_in.available().await.unwrap().len(), 1);
}
