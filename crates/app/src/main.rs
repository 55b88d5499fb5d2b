use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use server::{AppState, RouterConfig, build_router};
use services::{
    AppServices, AuthConfig, Clock, HttpObjectStore, LocalObjectStore, ObjectStore, ReportFont,
    ServiceSettings, UploadConfig,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use training_core::model::UserId;

mod config;
mod db;

use config::{Cli, Command, Settings, UploadTarget};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn service_settings(settings: &Settings) -> Result<(ServiceSettings, RouterConfig)> {
    let mut router = RouterConfig {
        body_limit: settings.max_upload_bytes,
        ..RouterConfig::default()
    };
    let store: Arc<dyn ObjectStore> = match &settings.uploads {
        UploadTarget::Local { dir, public_base } => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating upload directory {}", dir.display()))?;
            router.objects_dir = Some(dir.clone());
            router.objects_path.clone_from(public_base);
            Arc::new(LocalObjectStore::new(dir.clone(), public_base.clone()))
        }
        UploadTarget::Http {
            endpoint,
            api_key,
            public_base,
        } => Arc::new(HttpObjectStore::new(
            endpoint.clone(),
            api_key.clone(),
            public_base.clone(),
        )),
    };
    let report_font = match &settings.report_font {
        Some(path) => ReportFont::from_path(path)?,
        None => ReportFont::default(),
    };

    let services = ServiceSettings {
        auth: AuthConfig {
            admin_username: settings.admin_username.clone(),
            admin_password: settings.admin_password.clone(),
            session_ttl: chrono::Duration::hours(settings.session_ttl_hours),
        },
        uploads: UploadConfig {
            max_bytes: settings.max_upload_bytes,
            ..UploadConfig::default()
        },
        store,
        report_font,
    };
    Ok((services, router))
}

async fn open_services(settings: &Settings) -> Result<(AppServices, RouterConfig)> {
    db::prepare_sqlite_file(&settings.database_url)
        .with_context(|| format!("preparing database {}", settings.database_url))?;
    let (service_settings, router) = service_settings(settings)?;
    let services = AppServices::new_sqlite(&settings.database_url, Clock::System, service_settings)
        .await
        .with_context(|| format!("opening database {}", settings.database_url))?;
    Ok((services, router))
}

async fn serve(settings: Settings) -> Result<()> {
    if settings.uses_default_admin_password() {
        warn!("admin password is the built-in default; set GUARD_TRAINING_ADMIN_PASSWORD");
    }
    let (services, router_config) = open_services(&settings).await?;

    let auth = services.auth();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match auth.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired sessions purged"),
                Err(err) => warn!(error = %err, "session purge failed"),
            }
        }
    });

    let app = build_router(AppState::new(services), &router_config);
    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("binding {}", settings.bind))?;
    info!(addr = %settings.bind, db = %settings.database_url, "guard training server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server shutdown complete");
    Ok(())
}

async fn seed_admin(settings: Settings) -> Result<()> {
    let (services, _) = open_services(&settings).await?;
    let admin = services.auth().ensure_admin().await?;
    info!(user_id = %admin.id, username = %admin.username, "admin account ready");
    Ok(())
}

async fn reassign_guard(settings: Settings, from: &str, to: &str) -> Result<()> {
    let old_id = UserId::from_str(from).with_context(|| format!("invalid --from id {from}"))?;
    let new_id = UserId::from_str(to).with_context(|| format!("invalid --to id {to}"))?;
    let (services, _) = open_services(&settings).await?;
    let guard = services.guards().reassign_identity(old_id, new_id).await?;
    info!(guard_id = %guard.id, name = %guard.name, "guard reassigned");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::from_args(&cli.global)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::SeedAdmin => seed_admin(settings).await,
        Command::ReassignGuard { from, to } => reassign_guard(settings, &from, &to).await,
    }
}
