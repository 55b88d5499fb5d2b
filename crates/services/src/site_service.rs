use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage::repository::{SiteRepository, StorageError, UserRepository};
use tracing::info;
use training_core::model::{Company, Site, SiteDraft, SiteError, SiteId, User};

use crate::Clock;
use crate::error::SiteServiceError;
use crate::patch::nullable;

/// A site with the guards currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteWithGuards {
    #[serde(flatten)]
    pub site: Site,
    pub guards: Vec<User>,
}

/// Partial site update. `address: null` clears the address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
}

#[derive(Clone)]
pub struct SiteService {
    clock: Clock,
    sites: Arc<dyn SiteRepository>,
    users: Arc<dyn UserRepository>,
}

impl SiteService {
    #[must_use]
    pub fn new(clock: Clock, sites: Arc<dyn SiteRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self {
            clock,
            sites,
            users,
        }
    }

    /// Sites ordered by name, each with its guards.
    ///
    /// # Errors
    ///
    /// Returns `SiteServiceError::Storage` if repository access fails.
    pub async fn list_with_guards(&self) -> Result<Vec<SiteWithGuards>, SiteServiceError> {
        let sites = self.sites.list_sites().await?;
        let mut by_site: HashMap<SiteId, Vec<User>> = HashMap::new();
        for guard in self.users.list_guards().await? {
            if let Some(site_id) = guard.site_id {
                by_site.entry(site_id).or_default().push(guard);
            }
        }
        Ok(sites
            .into_iter()
            .map(|site| {
                let guards = by_site.remove(&site.id).unwrap_or_default();
                SiteWithGuards { site, guards }
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `SiteServiceError::Storage` if the site does not exist.
    pub async fn get(&self, id: SiteId) -> Result<Site, SiteServiceError> {
        Ok(self.sites.get_site(id).await?.ok_or(StorageError::NotFound)?)
    }

    /// # Errors
    ///
    /// Returns `SiteServiceError::Site` for a blank name.
    /// Returns `SiteServiceError::Storage` if persistence fails.
    pub async fn create(&self, draft: SiteDraft) -> Result<Site, SiteServiceError> {
        let site = draft.validate(SiteId::generate(), self.clock.now())?;
        self.sites.insert_site(&site).await?;
        info!(site_id = %site.id, name = %site.name, "site created");
        Ok(site)
    }

    /// # Errors
    ///
    /// Returns `SiteServiceError::Site` if the patched name is blank.
    /// Returns `SiteServiceError::Storage` if the site is missing or persistence fails.
    pub async fn update(&self, id: SiteId, patch: SitePatch) -> Result<Site, SiteServiceError> {
        let mut site = self.get(id).await?;
        if let Some(name) = patch.name {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(SiteError::EmptyName.into());
            }
            site.name = name;
        }
        if let Some(company) = patch.company {
            site.company = company;
        }
        if let Some(address) = patch.address {
            site.address = address.map(|a| a.trim().to_owned()).filter(|a| !a.is_empty());
        }
        self.sites.update_site(&site).await?;
        info!(site_id = %id, "site updated");
        Ok(site)
    }

    /// Deletes a site; its guards become unassigned.
    ///
    /// # Errors
    ///
    /// Returns `SiteServiceError::Storage` if the site is missing.
    pub async fn delete(&self, id: SiteId) -> Result<(), SiteServiceError> {
        self.sites.delete_site(id).await?;
        info!(site_id = %id, "site deleted");
        Ok(())
    }

    /// Looks a site up by company and trimmed name, creating it when absent.
    /// The flag is `true` when a new site was created.
    ///
    /// # Errors
    ///
    /// Returns `SiteServiceError` if validation or persistence fails.
    pub async fn find_or_create(
        &self,
        name: &str,
        company: Company,
    ) -> Result<(Site, bool), SiteServiceError> {
        let wanted = name.trim();
        let existing = self
            .sites
            .list_sites()
            .await?
            .into_iter()
            .find(|s| s.company == company && s.name == wanted);
        if let Some(site) = existing {
            return Ok((site, false));
        }
        let site = self
            .create(SiteDraft {
                name: wanted.to_owned(),
                company,
                address: None,
            })
            .await?;
        Ok((site, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use training_core::model::{Role, UserDraft, UserId};
    use training_core::time::fixed_now;

    fn service(repo: &InMemoryRepository) -> SiteService {
        SiteService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    fn draft(name: &str) -> SiteDraft {
        SiteDraft {
            name: name.into(),
            company: Company::MiraeAbm,
            address: Some("서울시 강남구".into()),
        }
    }

    #[tokio::test]
    async fn list_groups_guards_by_site() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let a = svc.create(draft("역삼 타워")).await.unwrap();
        let b = svc.create(draft("선릉 센터")).await.unwrap();
        for (name, site) in [("김", Some(a.id)), ("이", Some(a.id)), ("박", None)] {
            let guard = UserDraft {
                name: name.into(),
                site_id: site,
                ..UserDraft::default()
            }
            .validate(UserId::generate(), Role::Guard, fixed_now())
            .unwrap();
            repo.insert_user(&guard).await.unwrap();
        }

        let listed = svc.list_with_guards().await.unwrap();
        let count = |id: SiteId| {
            listed
                .iter()
                .find(|s| s.site.id == id)
                .map(|s| s.guards.len())
        };
        assert_eq!(count(a.id), Some(2));
        assert_eq!(count(b.id), Some(0));
    }

    #[tokio::test]
    async fn patch_clears_address_and_keeps_company() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let site = svc.create(draft("역삼 타워")).await.unwrap();

        let patch: SitePatch = serde_json::from_str(r#"{"name":"역삼 타워 B동","address":null}"#).unwrap();
        let updated = svc.update(site.id, patch).await.unwrap();

        assert_eq!(updated.name, "역삼 타워 B동");
        assert_eq!(updated.address, None);
        assert_eq!(updated.company, Company::MiraeAbm);
    }

    #[tokio::test]
    async fn blank_rename_is_rejected() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let site = svc.create(draft("역삼 타워")).await.unwrap();
        let err = svc
            .update(
                site.id,
                SitePatch {
                    name: Some(" ".into()),
                    ..SitePatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SiteServiceError::Site(SiteError::EmptyName)));
    }

    #[tokio::test]
    async fn find_or_create_reuses_matching_site() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let (first, created) = svc.find_or_create(" 판교 센터 ", Company::DawonPmc).await.unwrap();
        assert!(created);
        let (again, created) = svc.find_or_create("판교 센터", Company::DawonPmc).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, again.id);
        let (other, created) = svc.find_or_create("판교 센터", Company::MiraeAbm).await.unwrap();
        assert!(created);
        assert_ne!(other.id, first.id);
    }
}
