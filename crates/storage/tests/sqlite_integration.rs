use storage::repository::{
    CompletionRepository, Credential, MaterialRepository, NotificationRepository, SessionRecord,
    SessionRepository, SiteRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;
use training_core::model::{
    Company, Material, MaterialContent, MaterialDraft, MaterialId, MaterialKind, NewCompletion,
    Notification, QuizQuestionDraft, RecordId, Role, Site, SiteDraft, SiteId, User, UserDraft,
    UserId,
};
use training_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!(
        "sqlite:file:{name}?mode=memory&cache=shared"
    ))
    .await
    .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn site(name: &str) -> Site {
    SiteDraft {
        name: name.into(),
        company: Company::DawonPmc,
        address: Some("경기도 성남시".into()),
    }
    .validate(SiteId::generate(), fixed_now())
    .unwrap()
}

fn guard(name: &str, phone: &str, site_id: Option<SiteId>) -> User {
    UserDraft {
        name: name.into(),
        phone: Some(phone.into()),
        company: Some(Company::DawonPmc),
        site_id,
        ..UserDraft::default()
    }
    .validate(UserId::generate(), Role::Guard, fixed_now())
    .unwrap()
}

fn card_material() -> Material {
    MaterialDraft {
        title: "출입 통제 절차".into(),
        kind: Some(MaterialKind::Card),
        card_images: vec!["/objects/1.png".into(), "/objects/2.png".into()],
        audio_urls: vec![String::new(), "/objects/2.mp3".into()],
        quiz: vec![QuizQuestionDraft {
            question: "방문객 확인 방법은?".into(),
            options: vec!["신분증 확인".into(), "확인 생략".into()],
            answer: 0,
        }],
        ..MaterialDraft::default()
    }
    .validate(fixed_now())
    .unwrap()
    .assign_id(MaterialId::generate())
}

fn completion(guard: &User, material: &Material) -> training_core::model::CompletionRecord {
    NewCompletion {
        guard_id: guard.id,
        material_id: material.id,
        material_kind: material.kind(),
        material_title: material.title.clone(),
        score: Some(100),
        passed: Some(true),
    }
    .into_record(RecordId::generate(), fixed_now())
}

#[tokio::test]
async fn material_round_trips_with_slides_and_quiz() {
    let repo = connect("memdb_material_roundtrip").await;
    let material = card_material();
    repo.insert_material(&material).await.unwrap();

    let fetched = repo.get_material(material.id).await.unwrap().expect("material");
    assert_eq!(fetched, material);
    let MaterialContent::Cards(slides) = &fetched.content else {
        panic!("expected cards");
    };
    assert!(slides[0].audio.is_none());
    assert!(slides[1].audio.is_some());
}

#[tokio::test]
async fn legacy_encoded_columns_are_normalized() {
    let repo = connect("memdb_legacy_columns").await;
    let id = MaterialId::generate();
    sqlx::query(
        r"
        INSERT INTO training_materials (
            id, title, description, kind, month, card_images, audio_urls,
            video_urls, quizzes, created_at, updated_at
        )
        VALUES (?1, '소화기 사용', NULL, 'video', '수시', NULL, '', ?2, ?3, ?4, ?4)
        ",
    )
    .bind(id.to_string())
    .bind(r#""[\"https://youtu.be/dQw4w9WgXcQ\"]""#)
    .bind(r#""[{\"question\":\"안전핀?\",\"options\":[\"뽑는다\",\"둔다\"],\"answer\":0}]""#)
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let material = repo.get_material(id).await.unwrap().expect("material");
    let MaterialContent::Videos(videos) = &material.content else {
        panic!("expected videos");
    };
    assert!(videos[0].is_embedded());
    assert_eq!(material.quiz.len(), 1);
}

#[tokio::test]
async fn guard_lookup_and_unique_username() {
    let repo = connect("memdb_guard_lookup").await;
    let g = guard("정수빈", "010-2222-3333", None);
    repo.insert_user(&g).await.unwrap();

    let by_phone = repo.find_guard_by_phone("01022223333").await.unwrap();
    assert_eq!(by_phone.map(|u| u.id), Some(g.id));

    let dup = guard("정수빈", "010-9999-0000", None);
    let err = repo.insert_user(&dup).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn deleting_site_sets_guard_site_null() {
    let repo = connect("memdb_site_delete").await;
    let s = site("분당 지점");
    repo.insert_site(&s).await.unwrap();
    let g = guard("한지민", "01012121212", Some(s.id));
    repo.insert_user(&g).await.unwrap();

    repo.delete_site(s.id).await.unwrap();
    let stored = repo.get_user(g.id).await.unwrap().unwrap();
    assert_eq!(stored.site_id, None);
}

#[tokio::test]
async fn reassign_user_id_relinks_dependents() {
    let repo = connect("memdb_reassign").await;
    let g = guard("오세훈", "01034343434", None);
    let m = card_material();
    repo.insert_user(&g).await.unwrap();
    repo.set_credential(
        g.id,
        &Credential {
            salt: "abc".into(),
            digest: "def".into(),
        },
    )
    .await
    .unwrap();
    repo.insert_material(&m).await.unwrap();
    repo.insert_record(&completion(&g, &m)).await.unwrap();
    repo.insert_notifications(&[Notification::unread(g.id, m.id, fixed_now())])
        .await
        .unwrap();

    let new_id = UserId::generate();
    let moved = repo.reassign_user_id(g.id, new_id).await.unwrap();

    assert_eq!(moved.id, new_id);
    assert_eq!(moved.username, g.username);
    assert!(repo.get_user(g.id).await.unwrap().is_none());
    assert_eq!(
        repo.find_by_username(&g.username).await.unwrap().map(|u| u.id),
        Some(new_id)
    );
    assert!(repo.credential(new_id).await.unwrap().is_some());
    assert_eq!(repo.list_records_for_guard(new_id).await.unwrap().len(), 1);
    assert_eq!(repo.list_for_guard(new_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reassign_to_existing_id_is_rejected() {
    let repo = connect("memdb_reassign_conflict").await;
    let a = guard("가", "01000000001", None);
    let b = guard("나", "01000000002", None);
    repo.insert_user(&a).await.unwrap();
    repo.insert_user(&b).await.unwrap();

    let err = repo.reassign_user_id(a.id, b.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict(_)));
    assert!(repo.get_user(a.id).await.unwrap().is_some());
}

#[tokio::test]
async fn record_for_missing_material_is_not_found() {
    let repo = connect("memdb_record_fk").await;
    let g = guard("임꺽정", "01056565656", None);
    repo.insert_user(&g).await.unwrap();
    let orphan = card_material();

    let err = repo.insert_record(&completion(&g, &orphan)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn notifications_mark_and_delete() {
    let repo = connect("memdb_notifications").await;
    let g = guard("유관순", "01078787878", None);
    let m = card_material();
    repo.insert_user(&g).await.unwrap();
    repo.insert_material(&m).await.unwrap();
    let n = Notification::unread(g.id, m.id, fixed_now());
    repo.insert_notifications(std::slice::from_ref(&n))
        .await
        .unwrap();

    assert_eq!(repo.mark_all_read(g.id).await.unwrap(), 1);
    assert!(repo.get_notification(n.id).await.unwrap().unwrap().is_read);
    assert_eq!(repo.delete_for_material(g.id, m.id).await.unwrap(), 1);
    assert!(repo.list_for_guard(g.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_sessions_are_purged() {
    let repo = connect("memdb_sessions").await;
    let g = guard("강감찬", "01090909090", None);
    repo.insert_user(&g).await.unwrap();
    let session = SessionRecord {
        token: "tok".into(),
        user_id: g.id,
        created_at: fixed_now(),
        expires_at: fixed_now() + chrono::Duration::hours(1),
    };
    repo.insert_session(&session).await.unwrap();
    assert_eq!(repo.get_session("tok").await.unwrap(), Some(session));

    let purged = repo
        .purge_expired(fixed_now() + chrono::Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(repo.get_session("tok").await.unwrap().is_none());
}
