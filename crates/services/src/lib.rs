#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod error;
pub mod guard_service;
pub mod material_service;
pub mod notification_service;
pub mod password;
pub mod patch;
pub mod playback;
pub mod record_service;
pub mod report;
pub mod roster_import;
pub mod site_service;
pub mod uploads;

pub use training_core::Clock;

pub use app_services::{AppServices, ServiceSettings};
pub use auth_service::{AuthConfig, AuthService, AuthSession, LoginRequest};
pub use error::{
    AppServicesError, AuthError, GuardServiceError, ImportError, MaterialServiceError,
    NotificationServiceError, PlaybackServiceError, RecordServiceError, ReportError,
    SiteServiceError, UploadError,
};
pub use guard_service::{GuardPatch, GuardService, GuardWithSite, NewGuard};
pub use material_service::MaterialService;
pub use notification_service::{NotificationService, NotificationWithMaterial};
pub use playback::{
    CompletionStatus, DispatchOutcome, IdentityProvider, PlaybackDriver, PlaybackService,
    ProgressSource, StaticIdentity,
};
pub use record_service::{CompletionRequest, RecordScope, RecordService, RecordWithGuard, SiteStat};
pub use report::{RecordReport, ReportFont, ReportService};
pub use roster_import::{ImportSummary, RosterImport};
pub use site_service::{SitePatch, SiteService, SiteWithGuards};
pub use uploads::{
    HttpObjectStore, LocalObjectStore, ObjectStore, StoredObject, UploadConfig, UploadRequest,
    UploadService, UploadTicket,
};
