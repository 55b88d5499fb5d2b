//! Command line, environment and config file handling.
//!
//! Precedence: flag, then `GUARD_TRAINING_*` environment variable, then the
//! TOML file named by `--config`, then the built-in default.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://guard-training.sqlite3";
pub const DEFAULT_ADMIN_USERNAME: &str = "관리자";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
const DEFAULT_LOCAL_DIR: &str = "uploads";
const DEFAULT_PUBLIC_BASE: &str = "/objects";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid bind address: {0}")]
    InvalidBind(String),
    #[error("invalid database url: {0}")]
    InvalidDbUrl(String),
    #[error("session ttl must be between 1 and 8760 hours, got {0}")]
    InvalidSessionTtl(i64),
    #[error("local uploads are served by this server; public base must be a path such as /objects, got {0:?}")]
    InvalidPublicBase(String),
    #[error("the http upload backend needs an endpoint")]
    MissingEndpoint,
}

#[derive(Debug, Parser)]
#[command(name = "guard-training")]
#[command(about = "Security guard training service")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// TOML config file
    #[arg(long, global = true, env = "GUARD_TRAINING_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database url or path
    #[arg(long = "db", global = true, env = "GUARD_TRAINING_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address the HTTP server listens on
    #[arg(long, global = true, env = "GUARD_TRAINING_BIND")]
    pub bind: Option<String>,

    #[arg(long, global = true, env = "GUARD_TRAINING_SESSION_TTL_HOURS")]
    pub session_ttl_hours: Option<i64>,

    #[arg(long, global = true, env = "GUARD_TRAINING_UPLOAD_BACKEND")]
    pub upload_backend: Option<UploadBackend>,

    #[arg(long, global = true, env = "GUARD_TRAINING_UPLOAD_DIR")]
    pub upload_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "GUARD_TRAINING_UPLOAD_ENDPOINT")]
    pub upload_endpoint: Option<String>,

    #[arg(long, global = true, env = "GUARD_TRAINING_UPLOAD_API_KEY", hide_env_values = true)]
    pub upload_api_key: Option<String>,

    #[arg(long, global = true, env = "GUARD_TRAINING_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    #[arg(long, global = true, env = "GUARD_TRAINING_ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, global = true, env = "GUARD_TRAINING_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// TrueType font used for PDF exports (needed for Hangul)
    #[arg(long, global = true, env = "GUARD_TRAINING_REPORT_FONT")]
    pub report_font: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create the admin account if it does not exist yet
    SeedAdmin,
    /// Move a guard to a new id, carrying records and notifications along
    ReassignGuard {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    #[default]
    Local,
    Http,
}

// ─── FILE ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub database_url: Option<String>,
    pub session_ttl_hours: Option<i64>,
    pub report_font: Option<PathBuf>,
    pub uploads: UploadsSection,
    pub admin: AdminSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadsSection {
    pub backend: Option<UploadBackend>,
    pub local_dir: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl FileConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ─── RESOLVED ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadTarget {
    Local {
        dir: PathBuf,
        public_base: String,
    },
    Http {
        endpoint: String,
        api_key: Option<String>,
        public_base: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind: SocketAddr,
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub admin_username: String,
    pub admin_password: String,
    pub uploads: UploadTarget,
    pub max_upload_bytes: usize,
    pub report_font: Option<PathBuf>,
}

/// Local uploads are mounted on the router at their public base, so it has
/// to be a plain path that does not shadow the API.
fn local_public_base(raw: String) -> Result<String, ConfigError> {
    let path = raw.trim().trim_end_matches('/');
    let reserved = ["/api", "/health"]
        .iter()
        .any(|r| path == *r || path.starts_with(&format!("{r}/")));
    let valid = path.starts_with('/')
        && path.len() > 1
        && !reserved
        && !path.contains("//")
        && !path.contains([':', '*', '?', '#', '{', '}']);
    if valid {
        Ok(path.to_owned())
    } else {
        Err(ConfigError::InvalidPublicBase(raw))
    }
}

impl Settings {
    /// # Errors
    ///
    /// Returns `ConfigError` when the config file cannot be loaded or a
    /// value is invalid.
    pub fn from_args(args: &GlobalArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for invalid values.
    pub fn resolve(args: &GlobalArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let bind_raw = args
            .bind
            .clone()
            .or(file.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let database_url = crate::db::normalize_sqlite_url(
            args.database_url
                .clone()
                .or(file.database_url)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
        )?;

        let session_ttl_hours = args
            .session_ttl_hours
            .or(file.session_ttl_hours)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(ConfigError::InvalidSessionTtl(session_ttl_hours));
        }

        let uploads_file = file.uploads;
        let public_base = args
            .public_base_url
            .clone()
            .or(uploads_file.public_base_url)
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE.to_owned());
        let uploads = match args.upload_backend.or(uploads_file.backend).unwrap_or_default() {
            UploadBackend::Local => UploadTarget::Local {
                dir: args
                    .upload_dir
                    .clone()
                    .or(uploads_file.local_dir)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DIR)),
                public_base: local_public_base(public_base)?,
            },
            UploadBackend::Http => UploadTarget::Http {
                endpoint: args
                    .upload_endpoint
                    .clone()
                    .or(uploads_file.endpoint)
                    .ok_or(ConfigError::MissingEndpoint)?,
                api_key: args.upload_api_key.clone().or(uploads_file.api_key),
                public_base,
            },
        };

        Ok(Self {
            bind,
            database_url,
            session_ttl_hours,
            admin_username: args
                .admin_username
                .clone()
                .or(file.admin.username)
                .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_owned()),
            admin_password: args
                .admin_password
                .clone()
                .or(file.admin.password)
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_owned()),
            uploads,
            max_upload_bytes: uploads_file.max_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            report_font: args.report_font.clone().or(file.report_font),
        })
    }

    #[must_use]
    pub fn uses_default_admin_password(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let settings = Settings::resolve(&GlobalArgs::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.bind, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(settings.session_ttl_hours, 24);
        assert_eq!(settings.admin_username, "관리자");
        assert!(settings.uses_default_admin_password());
        assert!(settings.database_url.starts_with("sqlite://"));
        assert!(matches!(settings.uploads, UploadTarget::Local { .. }));
    }

    #[test]
    fn flags_beat_file_values() {
        let file: FileConfig = toml::from_str(
            r#"
            bind = "0.0.0.0:8080"
            session_ttl_hours = 12

            [uploads]
            backend = "http"
            endpoint = "https://bucket.example/put"
            public_base_url = "https://cdn.example"

            [admin]
            password = "from-file"
            "#,
        )
        .unwrap();
        let args = GlobalArgs {
            bind: Some("127.0.0.1:9000".into()),
            ..GlobalArgs::default()
        };

        let settings = Settings::resolve(&args, file).unwrap();
        assert_eq!(settings.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.session_ttl_hours, 12);
        assert_eq!(settings.admin_password, "from-file");
        assert_eq!(
            settings.uploads,
            UploadTarget::Http {
                endpoint: "https://bucket.example/put".into(),
                api_key: None,
                public_base: "https://cdn.example".into(),
            }
        );
    }

    #[test]
    fn http_backend_needs_endpoint() {
        let args = GlobalArgs {
            upload_backend: Some(UploadBackend::Http),
            ..GlobalArgs::default()
        };
        assert!(matches!(
            Settings::resolve(&args, FileConfig::default()),
            Err(ConfigError::MissingEndpoint)
        ));
    }

    #[test]
    fn bad_values_are_rejected() {
        let args = GlobalArgs {
            bind: Some("nowhere".into()),
            ..GlobalArgs::default()
        };
        assert!(matches!(
            Settings::resolve(&args, FileConfig::default()),
            Err(ConfigError::InvalidBind(_))
        ));
        let args = GlobalArgs {
            session_ttl_hours: Some(0),
            ..GlobalArgs::default()
        };
        assert!(matches!(
            Settings::resolve(&args, FileConfig::default()),
            Err(ConfigError::InvalidSessionTtl(0))
        ));
    }

    #[test]
    fn session_ttl_is_capped_at_a_year() {
        let ttl = |hours| GlobalArgs {
            session_ttl_hours: Some(hours),
            ..GlobalArgs::default()
        };
        for hours in [24 * 365 + 1, 1_000_000_000, 10_000_000_000_000, i64::MAX] {
            assert!(matches!(
                Settings::resolve(&ttl(hours), FileConfig::default()),
                Err(ConfigError::InvalidSessionTtl(h)) if h == hours
            ));
        }
        let settings = Settings::resolve(&ttl(24 * 365), FileConfig::default()).unwrap();
        assert_eq!(settings.session_ttl_hours, 8760);
    }

    #[test]
    fn local_public_base_must_be_a_mountable_path() {
        let base = |raw: &str| GlobalArgs {
            public_base_url: Some(raw.into()),
            ..GlobalArgs::default()
        };
        let settings = Settings::resolve(&base("/media/"), FileConfig::default()).unwrap();
        assert!(matches!(
            settings.uploads,
            UploadTarget::Local { ref public_base, .. } if public_base == "/media"
        ));
        for raw in ["https://cdn.example", "media", "/", "/api", "/api/files", "/health", "/a/:id"] {
            assert!(
                matches!(
                    Settings::resolve(&base(raw), FileConfig::default()),
                    Err(ConfigError::InvalidPublicBase(_))
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn config_file_is_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guard-training.toml");
        std::fs::write(&path, "database_url = \"sqlite::memory:\"\n").unwrap();
        let args = GlobalArgs {
            config: Some(path),
            ..GlobalArgs::default()
        };
        assert_eq!(Settings::from_args(&args).unwrap().database_url, "sqlite::memory:");
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from([
            "guard-training",
            "reassign-guard",
            "--from",
            "a",
            "--to",
            "b",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::ReassignGuard { .. })));
        assert!(Cli::try_parse_from(["guard-training"]).unwrap().command.is_none());
    }
}
