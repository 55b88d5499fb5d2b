use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use storage::repository::{SessionRecord, SessionRepository, UserRepository};
use tracing::{info, warn};
use training_core::model::{Company, Role, User, UserDraft, UserId, default_guard_password};

use crate::Clock;
use crate::error::AuthError;
use crate::password;

/// Login and session settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The one administrator login.
    pub admin_username: String,
    pub admin_password: String,
    pub session_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: "관리자".into(),
            admin_password: "admin123".into(),
            session_ttl: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// An issued bearer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    config: AuthConfig,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            config,
            users,
            sessions,
        }
    }

    /// Returns the admin account, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if persistence fails.
    pub async fn ensure_admin(&self) -> Result<User, AuthError> {
        let username = &self.config.admin_username;
        if let Some(existing) = self.users.find_by_username(username).await? {
            return Ok(existing);
        }
        let admin = UserDraft {
            username: Some(username.clone()),
            name: username.clone(),
            company: Some(Company::MiraeAbm),
            ..UserDraft::default()
        }
        .validate(UserId::generate(), Role::Admin, self.clock.now())?;
        self.users.insert_user(&admin).await?;
        self.users
            .set_credential(admin.id, &password::new_credential(&self.config.admin_password))
            .await?;
        info!(user_id = %admin.id, "admin account created");
        Ok(admin)
    }

    /// Authenticates either the admin or a guard and opens a session.
    ///
    /// Guards may use their stored password or the last four digits of their
    /// phone number. Admin accounts cannot sign in through the guard path.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnknownUser`, `AuthError::InvalidPassword` or
    /// `AuthError::AdminOnGuardLogin` for rejected logins.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let username = request.username.trim();
        let user = if username == self.config.admin_username {
            if request.password != self.config.admin_password {
                warn!("admin login rejected");
                return Err(AuthError::InvalidPassword);
            }
            self.ensure_admin().await?
        } else {
            self.authenticate_guard(username, &request.password).await?
        };
        self.open_session(user).await
    }

    async fn authenticate_guard(&self, username: &str, secret: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            warn!(username, "login for unknown user");
            return Err(AuthError::UnknownUser);
        };
        if user.is_admin() {
            warn!(username, "admin account on guard login");
            return Err(AuthError::AdminOnGuardLogin);
        }
        let by_phone = user
            .phone
            .as_deref()
            .is_some_and(|p| default_guard_password(Some(p)) == secret);
        let by_credential = self
            .users
            .credential(user.id)
            .await?
            .is_some_and(|c| password::verify(&c, secret));
        if !(by_phone || by_credential) {
            warn!(user_id = %user.id, "guard login rejected");
            return Err(AuthError::InvalidPassword);
        }
        Ok(user)
    }

    async fn open_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();
        let record = SessionRecord {
            token: password::new_token(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.config.session_ttl,
        };
        self.sessions.insert_session(&record).await?;
        info!(user_id = %user.id, role = user.role.as_str(), "signed in");
        Ok(AuthSession {
            token: record.token,
            user,
            expires_at: record.expires_at,
        })
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the session cannot be removed.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Resolves a bearer token to its user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` for unknown or expired tokens and
    /// for sessions whose user was deleted.
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let session = self
            .sessions
            .get_session(token)
            .await?
            .ok_or(AuthError::Unauthenticated)?;
        if session.expires_at <= self.clock.now() {
            self.sessions.delete_session(token).await?;
            return Err(AuthError::Unauthenticated);
        }
        self.users
            .get_user(session.user_id)
            .await?
            .ok_or(AuthError::Unauthenticated)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` when the token belongs to a guard.
    pub async fn require_admin(&self, token: &str) -> Result<User, AuthError> {
        let user = self.current_user(token).await?;
        if !user.is_admin() {
            return Err(AuthError::Forbidden);
        }
        Ok(user)
    }

    /// Drops expired sessions, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if repository access fails.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        Ok(self.sessions.purge_expired(self.clock.now()).await?)
    }
}
