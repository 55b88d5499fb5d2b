use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::auth_service::{AuthConfig, AuthService};
use crate::error::AppServicesError;
use crate::guard_service::GuardService;
use crate::material_service::MaterialService;
use crate::notification_service::NotificationService;
use crate::playback::{IdentityProvider, PlaybackService, StaticIdentity};
use crate::record_service::RecordService;
use crate::report::{ReportFont, ReportService};
use crate::roster_import::RosterImport;
use crate::site_service::SiteService;
use crate::uploads::{ObjectStore, UploadConfig, UploadService};

/// Settings the services need beyond storage.
#[derive(Clone)]
pub struct ServiceSettings {
    pub auth: AuthConfig,
    pub uploads: UploadConfig,
    pub store: Arc<dyn ObjectStore>,
    pub report_font: ReportFont,
}

/// Assembles every use-case service over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    auth: Arc<AuthService>,
    materials: Arc<MaterialService>,
    sites: Arc<SiteService>,
    guards: Arc<GuardService>,
    records: Arc<RecordService>,
    notifications: Arc<NotificationService>,
    reports: Arc<ReportService>,
    roster: Arc<RosterImport>,
    uploads: Arc<UploadService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and make sure the admin
    /// account exists.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or admin setup fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ServiceSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let services = Self::from_storage(storage, clock, settings);
        services.auth.ensure_admin().await?;
        Ok(services)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, settings: ServiceSettings) -> Self {
        let auth = Arc::new(AuthService::new(
            clock,
            settings.auth,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));
        let materials = Arc::new(MaterialService::new(
            clock,
            Arc::clone(&storage.materials),
            Arc::clone(&storage.users),
            Arc::clone(&storage.notifications),
        ));
        let sites = Arc::new(SiteService::new(
            clock,
            Arc::clone(&storage.sites),
            Arc::clone(&storage.users),
        ));
        let guards = Arc::new(GuardService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sites),
        ));
        let records = Arc::new(RecordService::new(
            clock,
            Arc::clone(&storage.records),
            Arc::clone(&storage.materials),
            Arc::clone(&storage.users),
            Arc::clone(&storage.sites),
            Arc::clone(&storage.notifications),
        ));
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&storage.notifications),
            Arc::clone(&storage.materials),
        ));
        let reports = Arc::new(ReportService::new(
            clock,
            Arc::clone(&records),
            Arc::clone(&storage.users),
            Arc::clone(&storage.sites),
            settings.report_font,
        ));
        let roster = Arc::new(RosterImport::new(Arc::clone(&sites), Arc::clone(&guards)));
        let uploads = Arc::new(UploadService::new(clock, settings.uploads, settings.store));

        Self {
            storage,
            auth,
            materials,
            sites,
            guards,
            records,
            notifications,
            reports,
            roster,
            uploads,
        }
    }

    /// Playback bound to whoever `identity` reports as signed in.
    #[must_use]
    pub fn playback_for(&self, identity: Arc<dyn IdentityProvider>) -> PlaybackService {
        PlaybackService::new(
            Arc::clone(&self.storage.materials),
            Arc::clone(&self.records),
            identity,
        )
    }

    /// Playback with nobody signed in; every entry point refuses until
    /// rebound with [`PlaybackService::for_identity`].
    #[must_use]
    pub fn playback(&self) -> PlaybackService {
        self.playback_for(Arc::new(StaticIdentity(None)))
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn materials(&self) -> Arc<MaterialService> {
        Arc::clone(&self.materials)
    }

    #[must_use]
    pub fn sites(&self) -> Arc<SiteService> {
        Arc::clone(&self.sites)
    }

    #[must_use]
    pub fn guards(&self) -> Arc<GuardService> {
        Arc::clone(&self.guards)
    }

    #[must_use]
    pub fn records(&self) -> Arc<RecordService> {
        Arc::clone(&self.records)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }

    #[must_use]
    pub fn roster(&self) -> Arc<RosterImport> {
        Arc::clone(&self.roster)
    }

    #[must_use]
    pub fn uploads(&self) -> Arc<UploadService> {
        Arc::clone(&self.uploads)
    }
}
