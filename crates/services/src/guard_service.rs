use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage::repository::{SiteRepository, StorageError, UserRepository};
use tracing::info;
use training_core::model::{
    Company, Role, Site, SiteId, User, UserDraft, UserError, UserId, default_guard_password,
    normalize_phone,
};

use crate::Clock;
use crate::error::GuardServiceError;
use crate::password;
use crate::patch::nullable;

/// A guard with its site resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardWithSite {
    #[serde(flatten)]
    pub guard: User,
    pub site: Option<Site>,
}

/// Guard registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGuard {
    #[serde(default)]
    pub username: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub site_id: Option<SiteId>,
}

/// Partial guard update.
///
/// Renaming also renames the login; a new phone number resets the password
/// to its last four digits unless `password` is given too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub company: Option<Option<Company>>,
    #[serde(default, deserialize_with = "nullable")]
    pub site_id: Option<Option<SiteId>>,
}

/// Roster row handed over by the spreadsheet import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub phone: String,
    pub company: Company,
    pub site_id: Option<SiteId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(User),
    Updated(User),
}

#[derive(Clone)]
pub struct GuardService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    sites: Arc<dyn SiteRepository>,
}

fn conflict_as_duplicate(username: &str) -> impl FnOnce(StorageError) -> GuardServiceError + '_ {
    move |err| match err {
        StorageError::Conflict(_) => GuardServiceError::DuplicateUsername(username.to_owned()),
        other => other.into(),
    }
}

impl GuardService {
    #[must_use]
    pub fn new(clock: Clock, users: Arc<dyn UserRepository>, sites: Arc<dyn SiteRepository>) -> Self {
        Self {
            clock,
            users,
            sites,
        }
    }

    /// Guards ordered by name, each with its site.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError::Storage` if repository access fails.
    pub async fn list_with_sites(&self) -> Result<Vec<GuardWithSite>, GuardServiceError> {
        let sites: HashMap<SiteId, Site> = self
            .sites
            .list_sites()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        Ok(self
            .users
            .list_guards()
            .await?
            .into_iter()
            .map(|guard| {
                let site = guard.site_id.and_then(|id| sites.get(&id).cloned());
                GuardWithSite { guard, site }
            })
            .collect())
    }

    /// Fetches a guard profile. Admin accounts are reported as not guards.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError::Storage` if the user does not exist.
    pub async fn get(&self, id: UserId) -> Result<User, GuardServiceError> {
        let user = self.users.get_user(id).await?.ok_or(StorageError::NotFound)?;
        if user.role != Role::Guard {
            return Err(GuardServiceError::NotAGuard(id.to_string()));
        }
        Ok(user)
    }

    /// Registers a guard. The login defaults to the display name and the
    /// password to the last four phone digits.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError::DuplicateUsername` if the login is taken.
    /// Returns `GuardServiceError::User` for a blank name.
    pub async fn create(&self, form: NewGuard) -> Result<User, GuardServiceError> {
        let draft = UserDraft {
            username: form.username,
            name: form.name,
            phone: form.phone,
            company: form.company,
            site_id: form.site_id,
        };
        let guard = draft.validate(UserId::generate(), Role::Guard, self.clock.now())?;
        if self.users.find_by_username(&guard.username).await?.is_some() {
            return Err(GuardServiceError::DuplicateUsername(guard.username));
        }
        self.users
            .insert_user(&guard)
            .await
            .map_err(conflict_as_duplicate(&guard.username))?;

        let secret = form
            .password
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| default_guard_password(guard.phone.as_deref()));
        self.users
            .set_credential(guard.id, &password::new_credential(&secret))
            .await?;
        info!(guard_id = %guard.id, username = %guard.username, "guard registered");
        Ok(guard)
    }

    /// # Errors
    ///
    /// Returns `GuardServiceError::DuplicateUsername` if a rename collides.
    /// Returns `GuardServiceError::Storage` if the guard is missing.
    pub async fn update(&self, id: UserId, patch: GuardPatch) -> Result<User, GuardServiceError> {
        let mut guard = self.get(id).await?;
        let mut new_secret = None;

        if let Some(name) = patch.name {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(UserError::EmptyName.into());
            }
            guard.username.clone_from(&name);
            guard.name = name;
        }
        if let Some(username) = patch.username {
            let username = username.trim().to_owned();
            if username.is_empty() {
                return Err(UserError::EmptyUsername.into());
            }
            guard.username = username;
        }
        if let Some(phone) = patch.phone {
            let phone = normalize_phone(&phone);
            guard.phone = (!phone.is_empty()).then_some(phone);
            new_secret = Some(default_guard_password(guard.phone.as_deref()));
        }
        if let Some(password) = patch.password.filter(|p| !p.trim().is_empty()) {
            new_secret = Some(password);
        }
        if let Some(company) = patch.company {
            guard.company = company;
        }
        if let Some(site_id) = patch.site_id {
            guard.site_id = site_id;
        }

        self.users
            .update_user(&guard)
            .await
            .map_err(conflict_as_duplicate(&guard.username))?;
        if let Some(secret) = new_secret {
            self.users
                .set_credential(id, &password::new_credential(&secret))
                .await?;
        }
        info!(guard_id = %id, "guard updated");
        Ok(guard)
    }

    /// Deletes a guard together with their records and notifications.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError` if the guard is missing or not a guard.
    pub async fn delete(&self, id: UserId) -> Result<(), GuardServiceError> {
        self.get(id).await?;
        self.users.delete_user(id).await?;
        info!(guard_id = %id, "guard deleted");
        Ok(())
    }

    /// Moves a guard to a new primary key, re-linking everything that
    /// points at the old one.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError::Storage` with `Conflict` if `new_id` is
    /// taken, or `NotFound` if `old_id` does not exist.
    pub async fn reassign_identity(
        &self,
        old_id: UserId,
        new_id: UserId,
    ) -> Result<User, GuardServiceError> {
        self.get(old_id).await?;
        let moved = self.users.reassign_user_id(old_id, new_id).await?;
        info!(%old_id, %new_id, "guard identity reassigned");
        Ok(moved)
    }

    /// Creates or refreshes a guard matched by phone number.
    ///
    /// # Errors
    ///
    /// Returns `GuardServiceError` if validation or persistence fails.
    pub async fn upsert_by_phone(
        &self,
        entry: RosterEntry,
    ) -> Result<UpsertOutcome, GuardServiceError> {
        let phone = normalize_phone(&entry.phone);
        if let Some(mut guard) = self.users.find_guard_by_phone(&phone).await? {
            let name = entry.name.trim().to_owned();
            if name.is_empty() {
                return Err(UserError::EmptyName.into());
            }
            if guard.name != name {
                guard.username.clone_from(&name);
                guard.name = name;
            }
            guard.company = Some(entry.company);
            if entry.site_id.is_some() {
                guard.site_id = entry.site_id;
            }
            self.users
                .update_user(&guard)
                .await
                .map_err(conflict_as_duplicate(&guard.username))?;
            return Ok(UpsertOutcome::Updated(guard));
        }

        let guard = self
            .create(NewGuard {
                name: entry.name,
                phone: Some(phone),
                company: Some(entry.company),
                site_id: entry.site_id,
                ..NewGuard::default()
            })
            .await?;
        Ok(UpsertOutcome::Created(guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use training_core::model::SiteDraft;
    use training_core::time::fixed_now;

    fn service(repo: &InMemoryRepository) -> GuardService {
        GuardService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn form(name: &str, phone: &str) -> NewGuard {
        NewGuard {
            name: name.into(),
            phone: Some(phone.into()),
            company: Some(Company::DawonPmc),
            ..NewGuard::default()
        }
    }

    #[tokio::test]
    async fn create_defaults_login_and_password() {
        let repo = InMemoryRepository::new();
        let guard = service(&repo).create(form("최경비", "010-4321-8765")).await.unwrap();

        assert_eq!(guard.username, "최경비");
        assert_eq!(guard.phone.as_deref(), Some("01043218765"));
        let credential = repo.credential(guard.id).await.unwrap().unwrap();
        assert!(password::verify(&credential, "8765"));
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        svc.create(form("최경비", "01011112222")).await.unwrap();
        let err = svc.create(form("최경비", "01033334444")).await.unwrap_err();
        assert!(matches!(err, GuardServiceError::DuplicateUsername(name) if name == "최경비"));
    }

    #[tokio::test]
    async fn rename_and_phone_change_follow_through() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let guard = svc.create(form("최경비", "01011112222")).await.unwrap();

        let patch: GuardPatch =
            serde_json::from_str(r#"{"name":"최반장","phone":"010-5555-9999"}"#).unwrap();
        let updated = svc.update(guard.id, patch).await.unwrap();

        assert_eq!(updated.username, "최반장");
        assert_eq!(updated.name, "최반장");
        let credential = repo.credential(guard.id).await.unwrap().unwrap();
        assert!(password::verify(&credential, "9999"));
        assert!(!password::verify(&credential, "2222"));
    }

    #[tokio::test]
    async fn site_can_be_cleared_with_null() {
        let repo = InMemoryRepository::new();
        let site = SiteDraft {
            name: "판교".into(),
            company: Company::DawonPmc,
            address: None,
        }
        .validate(SiteId::generate(), fixed_now())
        .unwrap();
        repo.insert_site(&site).await.unwrap();
        let svc = service(&repo);
        let guard = svc
            .create(NewGuard {
                site_id: Some(site.id),
                ..form("한경비", "01077778888")
            })
            .await
            .unwrap();

        let listed = svc.list_with_sites().await.unwrap();
        assert_eq!(listed[0].site.as_ref().map(|s| s.id), Some(site.id));

        let patch: GuardPatch = serde_json::from_str(r#"{"siteId":null}"#).unwrap();
        let updated = svc.update(guard.id, patch).await.unwrap();
        assert_eq!(updated.site_id, None);
        assert_eq!(updated.company, Some(Company::DawonPmc));
    }

    #[tokio::test]
    async fn upsert_matches_on_phone() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let entry = RosterEntry {
            name: "윤경비".into(),
            phone: "010-1212-3434".into(),
            company: Company::MiraeAbm,
            site_id: None,
        };
        let created = svc.upsert_by_phone(entry.clone()).await.unwrap();
        let UpsertOutcome::Created(first) = created else {
            panic!("expected a new guard");
        };

        let again = svc
            .upsert_by_phone(RosterEntry {
                name: "윤반장".into(),
                ..entry
            })
            .await
            .unwrap();
        let UpsertOutcome::Updated(second) = again else {
            panic!("expected an update");
        };
        assert_eq!(first.id, second.id);
        assert_eq!(second.username, "윤반장");
    }

    #[tokio::test]
    async fn reassign_keeps_profile() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let guard = svc.create(form("서경비", "01090901010")).await.unwrap();
        let new_id = UserId::generate();

        let moved = svc.reassign_identity(guard.id, new_id).await.unwrap();

        assert_eq!(moved.id, new_id);
        assert_eq!(moved.username, guard.username);
        assert!(matches!(
            svc.get(guard.id).await.unwrap_err(),
            GuardServiceError::Storage(StorageError::NotFound)
        ));
    }
}
