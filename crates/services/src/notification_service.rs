use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use storage::repository::{MaterialRepository, NotificationRepository, StorageError};
use training_core::model::{
    Material, MaterialId, MaterialKind, Notification, NotificationId, UserId,
};

use crate::error::NotificationServiceError;

/// Just enough of a material to render a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSummary {
    pub id: MaterialId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    pub month: String,
}

impl From<&Material> for MaterialSummary {
    fn from(m: &Material) -> Self {
        Self {
            id: m.id,
            title: m.title.clone(),
            kind: m.kind(),
            month: m.month.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationWithMaterial {
    #[serde(flatten)]
    pub notification: Notification,
    pub material: Option<MaterialSummary>,
}

/// A guard's own notices. Every operation is scoped to the caller.
#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    materials: Arc<dyn MaterialRepository>,
}

impl NotificationService {
    #[must_use]
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        materials: Arc<dyn MaterialRepository>,
    ) -> Self {
        Self {
            notifications,
            materials,
        }
    }

    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if repository access fails.
    pub async fn list_mine(
        &self,
        guard_id: UserId,
    ) -> Result<Vec<NotificationWithMaterial>, NotificationServiceError> {
        let materials: HashMap<MaterialId, MaterialSummary> = self
            .materials
            .list_materials()
            .await?
            .iter()
            .map(|m| (m.id, MaterialSummary::from(m)))
            .collect();
        Ok(self
            .notifications
            .list_for_guard(guard_id)
            .await?
            .into_iter()
            .map(|notification| {
                let material = materials.get(&notification.material_id).cloned();
                NotificationWithMaterial {
                    notification,
                    material,
                }
            })
            .collect())
    }

    async fn owned(
        &self,
        guard_id: UserId,
        id: NotificationId,
    ) -> Result<Notification, NotificationServiceError> {
        let notification = self
            .notifications
            .get_notification(id)
            .await?
            .filter(|n| n.guard_id == guard_id)
            .ok_or(StorageError::NotFound)?;
        Ok(notification)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) if the notice does not exist
    /// or belongs to someone else.
    pub async fn mark_read(
        &self,
        guard_id: UserId,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        self.owned(guard_id, id).await?;
        self.notifications.mark_read(id).await?;
        Ok(())
    }

    /// Returns how many notices changed.
    ///
    /// # Errors
    ///
    /// Returns `NotificationServiceError::Storage` if repository access fails.
    pub async fn mark_all_read(&self, guard_id: UserId) -> Result<u64, NotificationServiceError> {
        Ok(self.notifications.mark_all_read(guard_id).await?)
    }

    /// Deletes the notice only when `guard_id` owns it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) otherwise.
    pub async fn delete_if_owner(
        &self,
        guard_id: UserId,
        id: NotificationId,
    ) -> Result<(), NotificationServiceError> {
        self.owned(guard_id, id).await?;
        self.notifications.delete_notification(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::{InMemoryRepository, UserRepository};
    use training_core::model::{MaterialDraft, Role, UserDraft};
    use training_core::time::fixed_now;

    async fn setup() -> (InMemoryRepository, NotificationService, UserId, UserId, Notification) {
        let repo = InMemoryRepository::new();
        let mut ids = Vec::new();
        for name in ["주인", "남"] {
            let guard = UserDraft {
                name: name.into(),
                ..UserDraft::default()
            }
            .validate(UserId::generate(), Role::Guard, fixed_now())
            .unwrap();
            repo.insert_user(&guard).await.unwrap();
            ids.push(guard.id);
        }
        let material = MaterialDraft {
            title: "응급 처치".into(),
            month: Some("5월".into()),
            ..MaterialDraft::default()
        }
        .validate(fixed_now())
        .unwrap()
        .assign_id(MaterialId::generate());
        repo.insert_material(&material).await.unwrap();
        let notice = Notification::unread(ids[0], material.id, fixed_now());
        repo.insert_notifications(std::slice::from_ref(&notice))
            .await
            .unwrap();
        let svc = NotificationService::new(Arc::new(repo.clone()), Arc::new(repo.clone()));
        (repo, svc, ids[0], ids[1], notice)
    }

    #[tokio::test]
    async fn list_joins_material_summary() {
        let (_repo, svc, owner, _other, _notice) = setup().await;
        let listed = svc.list_mine(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        let summary = listed[0].material.as_ref().unwrap();
        assert_eq!(summary.title, "응급 처치");
        assert_eq!(summary.month, "5월");
    }

    #[tokio::test]
    async fn only_owner_can_delete() {
        let (repo, svc, owner, other, notice) = setup().await;
        let err = svc.delete_if_owner(other, notice.id).await.unwrap_err();
        assert!(matches!(err, NotificationServiceError::Storage(StorageError::NotFound)));
        assert!(repo.get_notification(notice.id).await.unwrap().is_some());

        svc.delete_if_owner(owner, notice.id).await.unwrap();
        assert!(repo.get_notification(notice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_read_and_read_all() {
        let (repo, svc, owner, other, notice) = setup().await;
        assert!(svc.mark_read(other, notice.id).await.is_err());
        svc.mark_read(owner, notice.id).await.unwrap();
        assert!(repo.get_notification(notice.id).await.unwrap().unwrap().is_read);
        assert_eq!(svc.mark_all_read(owner).await.unwrap(), 0);
    }
}
