use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storage::repository::{
    CompletionRepository, MaterialRepository, NotificationRepository, SiteRepository,
    StorageError, UserRepository,
};
use tracing::{info, warn};
use training_core::model::{
    CompletionRecord, MaterialId, NewCompletion, RecordId, Site, SiteId, User, UserId,
};

use crate::Clock;
use crate::error::RecordServiceError;
use crate::guard_service::GuardWithSite;

/// A record joined with the guard that earned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordWithGuard {
    #[serde(flatten)]
    pub record: CompletionRecord,
    pub guard: Option<GuardWithSite>,
}

/// Completion body posted by a guard's client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub material_id: MaterialId,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub passed: Option<bool>,
}

/// Per-site compliance summary for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStat {
    pub site_id: SiteId,
    pub name: String,
    /// Percent of (guard, material) pairs completed.
    pub completion_rate: u32,
    pub total_guards: usize,
    pub completed: usize,
}

/// Which records a report or listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    All,
    Guard(UserId),
    Site(SiteId),
}

#[derive(Clone)]
pub struct RecordService {
    clock: Clock,
    records: Arc<dyn CompletionRepository>,
    materials: Arc<dyn MaterialRepository>,
    users: Arc<dyn UserRepository>,
    sites: Arc<dyn SiteRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl RecordService {
    #[must_use]
    pub fn new(
        clock: Clock,
        records: Arc<dyn CompletionRepository>,
        materials: Arc<dyn MaterialRepository>,
        users: Arc<dyn UserRepository>,
        sites: Arc<dyn SiteRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            clock,
            records,
            materials,
            users,
            sites,
            notifications,
        }
    }

    /// Persists a passing completion.
    ///
    /// Kind and title are taken from the stored material, not the request.
    /// The guard's notice for the material is dropped afterwards.
    ///
    /// # Errors
    ///
    /// Returns `RecordServiceError::FailedAttempt` for `passed = false`.
    /// Returns `RecordServiceError::Storage` if the guard or material is
    /// missing or the write fails.
    pub async fn record_completion(
        &self,
        request: NewCompletion,
    ) -> Result<CompletionRecord, RecordServiceError> {
        if request.passed == Some(false) {
            return Err(RecordServiceError::FailedAttempt);
        }
        if let Some(score) = request.score.filter(|s| *s > 100) {
            return Err(RecordServiceError::ScoreOutOfRange(score));
        }
        let material = self
            .materials
            .get_material(request.material_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        self.users
            .get_user(request.guard_id)
            .await?
            .ok_or(StorageError::NotFound)?;

        let record = NewCompletion {
            material_kind: material.kind(),
            material_title: material.title.clone(),
            ..request
        }
        .into_record(RecordId::generate(), self.clock.now());
        self.records.insert_record(&record).await?;
        info!(
            record_id = %record.id,
            guard_id = %record.guard_id,
            material_id = %record.material_id,
            "completion recorded"
        );

        if let Err(err) = self
            .notifications
            .delete_for_material(record.guard_id, record.material_id)
            .await
        {
            warn!(guard_id = %record.guard_id, error = %err, "could not clear notification");
        }
        Ok(record)
    }

    /// Convenience wrapper for the records endpoint.
    ///
    /// # Errors
    ///
    /// See [`RecordService::record_completion`].
    pub async fn submit(
        &self,
        guard_id: UserId,
        request: CompletionRequest,
    ) -> Result<CompletionRecord, RecordServiceError> {
        let material = self
            .materials
            .get_material(request.material_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        self.record_completion(NewCompletion {
            guard_id,
            material_id: material.id,
            material_kind: material.kind(),
            material_title: material.title,
            score: request.score,
            passed: request.passed,
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `RecordServiceError::Storage` if repository access fails.
    pub async fn list_mine(
        &self,
        guard_id: UserId,
    ) -> Result<Vec<CompletionRecord>, RecordServiceError> {
        Ok(self.records.list_records_for_guard(guard_id).await?)
    }

    /// Records in `scope`, newest first, joined with guard and site.
    ///
    /// # Errors
    ///
    /// Returns `RecordServiceError::Storage` if repository access fails.
    pub async fn list(&self, scope: RecordScope) -> Result<Vec<RecordWithGuard>, RecordServiceError> {
        let sites: HashMap<SiteId, Site> = self
            .sites
            .list_sites()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let guards: HashMap<UserId, User> = self
            .users
            .list_guards()
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        let records = match scope {
            RecordScope::Guard(id) => self.records.list_records_for_guard(id).await?,
            RecordScope::All | RecordScope::Site(_) => self.records.list_records().await?,
        };

        Ok(records
            .into_iter()
            .filter(|r| match scope {
                RecordScope::Site(site) => {
                    guards.get(&r.guard_id).and_then(|g| g.site_id) == Some(site)
                }
                RecordScope::All | RecordScope::Guard(_) => true,
            })
            .map(|record| {
                let guard = guards.get(&record.guard_id).cloned().map(|guard| {
                    let site = guard.site_id.and_then(|id| sites.get(&id).cloned());
                    GuardWithSite { guard, site }
                });
                RecordWithGuard { record, guard }
            })
            .collect())
    }

    /// Completion rate per site, highest first.
    ///
    /// The rate is `round(100 * completed / (guards * materials))` where
    /// `completed` counts distinct (guard, material) pairs, so repeat passes
    /// do not push a site over 100.
    ///
    /// # Errors
    ///
    /// Returns `RecordServiceError::Storage` if repository access fails.
    pub async fn site_stats(&self) -> Result<Vec<SiteStat>, RecordServiceError> {
        let sites = self.sites.list_sites().await?;
        let guards = self.users.list_guards().await?;
        let material_count = self.materials.list_materials().await?.len();
        let records = self.records.list_records().await?;

        let guard_site: HashMap<UserId, SiteId> = guards
            .iter()
            .filter_map(|g| g.site_id.map(|s| (g.id, s)))
            .collect();
        let mut done: HashMap<SiteId, HashSet<(UserId, MaterialId)>> = HashMap::new();
        for record in records.iter().filter(|r| r.passed != Some(false)) {
            if let Some(site) = guard_site.get(&record.guard_id) {
                done.entry(*site)
                    .or_default()
                    .insert((record.guard_id, record.material_id));
            }
        }

        let mut stats: Vec<SiteStat> = sites
            .into_iter()
            .map(|site| {
                let total_guards = guard_site.values().filter(|s| **s == site.id).count();
                let completed = done.get(&site.id).map_or(0, HashSet::len);
                SiteStat {
                    site_id: site.id,
                    name: site.name,
                    completion_rate: completion_rate(completed, total_guards * material_count),
                    total_guards,
                    completed,
                }
            })
            .collect();
        stats.sort_by(|a, b| b.completion_rate.cmp(&a.completion_rate));
        Ok(stats)
    }
}

fn completion_rate(completed: usize, required: usize) -> u32 {
    if required == 0 {
        return 0;
    }
    let pct = (200 * completed + required) / (2 * required);
    u32::try_from(pct.min(100)).unwrap_or(100)
}
