use std::sync::Arc;

use services::auth_service::LoginRequest;
use services::{
    AppServices, AuthConfig, Clock, CompletionRequest, LocalObjectStore, NewGuard, RecordScope,
    ReportFont, ServiceSettings, UploadConfig,
};
use training_core::model::{Company, MaterialDraft, MaterialKind, SiteDraft};
use training_core::time::fixed_now;

async fn services(db: &str, dir: &std::path::Path) -> AppServices {
    AppServices::new_sqlite(
        &format!("sqlite:file:{db}?mode=memory&cache=shared"),
        Clock::Fixed(fixed_now()),
        ServiceSettings {
            auth: AuthConfig::default(),
            uploads: UploadConfig::default(),
            store: Arc::new(LocalObjectStore::new(dir, "/objects")),
            report_font: ReportFont::default(),
        },
    )
    .await
    .expect("connect sqlite")
}

#[tokio::test]
async fn admin_sets_up_site_guard_and_material_then_guard_completes() {
    let dir = tempfile::tempdir().unwrap();
    let app = services("memdb_admin_flow", dir.path()).await;

    let admin = app
        .auth()
        .login(LoginRequest {
            username: "관리자".into(),
            password: "admin123".into(),
        })
        .await
        .unwrap();
    assert!(app.auth().require_admin(&admin.token).await.is_ok());

    let site = app
        .sites()
        .create(SiteDraft {
            name: "역삼 타워".into(),
            company: Company::MiraeAbm,
            address: Some("서울 강남구".into()),
        })
        .await
        .unwrap();
    let guard = app
        .guards()
        .create(NewGuard {
            name: "윤경비".into(),
            phone: Some("010-9876-5432".into()),
            company: Some(Company::MiraeAbm),
            site_id: Some(site.id),
            ..NewGuard::default()
        })
        .await
        .unwrap();
    let material = app
        .materials()
        .create(MaterialDraft {
            title: "주차장 순찰".into(),
            kind: Some(MaterialKind::Card),
            card_images: vec!["/objects/p.png".into()],
            ..MaterialDraft::default()
        })
        .await
        .unwrap();

    let session = app
        .auth()
        .login(LoginRequest {
            username: "윤경비".into(),
            password: "5432".into(),
        })
        .await
        .unwrap();
    let me = app.auth().current_user(&session.token).await.unwrap();
    assert_eq!(me.id, guard.id);
    assert_eq!(app.notifications().list_mine(me.id).await.unwrap().len(), 1);

    app.records()
        .submit(
            me.id,
            CompletionRequest {
                material_id: material.id,
                score: Some(100),
                passed: Some(true),
            },
        )
        .await
        .unwrap();

    let stats = app.records().site_stats().await.unwrap();
    assert_eq!(stats[0].completion_rate, 100);
    assert!(app.notifications().list_mine(me.id).await.unwrap().is_empty());

    let pdf = app.reports().render(RecordScope::Site(site.id)).await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}
