use std::fmt;

use chrono::{DateTime, Duration, Utc};
use storage::repository::Storage;
use training_core::model::{
    Company, MaterialDraft, MaterialId, MaterialKind, Notification, QuizQuestionDraft, Role,
    SiteDraft, SiteId, UserDraft, UserId,
};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    guards: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidGuards { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidGuards { raw } => write!(f, "invalid --guards value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("GUARD_TRAINING_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://guard-training.sqlite3?mode=rwc".into());
        let mut guards = std::env::var("GUARD_TRAINING_SEED_GUARDS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--guards" => {
                    let value = require_value(&mut args, "--guards")?;
                    guards = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidGuards { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            guards,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://guard-training.sqlite3)");
    eprintln!("  --guards <n>              Number of demo guards per site (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  GUARD_TRAINING_DATABASE_URL, GUARD_TRAINING_SEED_GUARDS");
}

fn demo_materials() -> Vec<MaterialDraft> {
    let quiz = vec![
        QuizQuestionDraft {
            question: "근무 교대 시 가장 먼저 확인할 것은?".into(),
            options: vec![
                "출입 기록부".into(),
                "휴게실 청소 상태".into(),
                "주차 요금".into(),
            ],
            answer: 0,
        },
        QuizQuestionDraft {
            question: "화재 발견 시 첫 번째 행동은?".into(),
            options: vec!["119 신고 및 경보".into(), "현장 사진 촬영".into()],
            answer: 0,
        },
    ];
    vec![
        MaterialDraft {
            title: "야간 순찰 기본 수칙".into(),
            description: Some("순찰 경로와 점검 항목".into()),
            kind: Some(MaterialKind::Card),
            card_images: vec![
                "/objects/seed/patrol-1.png".into(),
                "/objects/seed/patrol-2.png".into(),
            ],
            audio_urls: vec!["/objects/seed/patrol-1.mp3".into()],
            quiz: quiz.clone(),
            ..MaterialDraft::default()
        },
        MaterialDraft {
            title: "소방 설비 사용법".into(),
            month: Some("3월".into()),
            kind: Some(MaterialKind::Video),
            video_urls: vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".into()],
            quiz,
            ..MaterialDraft::default()
        },
    ]
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut site_ids = Vec::new();
    for (name, company) in [
        ("강남 오피스", Company::MiraeAbm),
        ("판교 물류센터", Company::DawonPmc),
    ] {
        let site = SiteDraft {
            name: name.into(),
            company,
            address: None,
        }
        .validate(SiteId::generate(), now)?;
        storage.sites.insert_site(&site).await?;
        site_ids.push((site.id, company));
    }

    let mut guard_ids = Vec::new();
    for (s, (site_id, company)) in site_ids.iter().enumerate() {
        for g in 0..args.guards {
            let guard = UserDraft {
                username: None,
                name: format!("경비원{}-{}", s + 1, g + 1),
                phone: Some(format!("010-{:04}-{:04}", 1000 + s, 1000 + g)),
                company: Some(*company),
                site_id: Some(*site_id),
            }
            .validate(UserId::generate(), Role::Guard, now)?;
            storage.users.insert_user(&guard).await?;
            guard_ids.push(guard.id);
        }
    }

    let mut materials = 0;
    for (i, draft) in demo_materials().into_iter().enumerate() {
        let created_at = now - Duration::days(i64::try_from(i)?);
        let material = draft.validate(created_at)?.assign_id(MaterialId::generate());
        storage.materials.insert_material(&material).await?;
        let notices: Vec<Notification> = guard_ids
            .iter()
            .map(|g| Notification::unread(*g, material.id, created_at))
            .collect();
        storage.notifications.insert_notifications(&notices).await?;
        materials += 1;
    }

    println!(
        "Seeded {} sites, {} guards and {} materials into {}",
        site_ids.len(),
        guard_ids.len(),
        materials,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
