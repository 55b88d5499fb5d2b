use std::sync::Arc;

use storage::normalize::MaterialDocument;
use storage::repository::{
    MaterialRepository, NotificationRepository, StorageError, UserRepository,
};
use tracing::{info, warn};
use training_core::model::{Material, MaterialDraft, MaterialId, Notification};

use crate::Clock;
use crate::error::MaterialServiceError;

/// Admin-side material management plus the "new material" fan-out.
#[derive(Clone)]
pub struct MaterialService {
    clock: Clock,
    materials: Arc<dyn MaterialRepository>,
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
}

impl MaterialService {
    #[must_use]
    pub fn new(
        clock: Clock,
        materials: Arc<dyn MaterialRepository>,
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
    ) -> Self {
        Self {
            clock,
            materials,
            users,
            notifications,
        }
    }

    /// All materials, newest first.
    ///
    /// # Errors
    ///
    /// Returns `MaterialServiceError::Storage` if repository access fails.
    pub async fn list(&self) -> Result<Vec<Material>, MaterialServiceError> {
        Ok(self.materials.list_materials().await?)
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) if the material does not exist.
    pub async fn get(&self, id: MaterialId) -> Result<Material, MaterialServiceError> {
        let material = self
            .materials
            .get_material(id)
            .await?
            .ok_or(StorageError::NotFound)?;
        Ok(material)
    }

    /// Validate, persist and notify every guard.
    ///
    /// A failed fan-out is logged; the material itself stays created.
    ///
    /// # Errors
    ///
    /// Returns `MaterialServiceError::Material` for validation failures.
    /// Returns `MaterialServiceError::Storage` if the insert fails.
    pub async fn create(&self, draft: MaterialDraft) -> Result<Material, MaterialServiceError> {
        let now = self.clock.now();
        let material = draft.validate(now)?.assign_id(MaterialId::generate());
        self.materials.insert_material(&material).await?;
        info!(material_id = %material.id, title = %material.title, "material created");

        match self.notify_guards(&material).await {
            Ok(count) => info!(material_id = %material.id, count, "guards notified"),
            Err(err) => warn!(material_id = %material.id, error = %err, "notification fan-out failed"),
        }
        Ok(material)
    }

    async fn notify_guards(&self, material: &Material) -> Result<usize, StorageError> {
        let guards = self.users.list_guards().await?;
        let notices: Vec<Notification> = guards
            .iter()
            .map(|g| Notification::unread(g.id, material.id, material.created_at))
            .collect();
        if !notices.is_empty() {
            self.notifications.insert_notifications(&notices).await?;
        }
        Ok(notices.len())
    }

    /// Overlay the fields present in `patch` and re-validate.
    ///
    /// # Errors
    ///
    /// Returns `MaterialServiceError::Material` if the merged material is invalid.
    /// Returns `MaterialServiceError::Storage` if the material is missing or
    /// persistence fails.
    pub async fn update(
        &self,
        id: MaterialId,
        patch: MaterialDocument,
    ) -> Result<Material, MaterialServiceError> {
        let existing = self.get(id).await?;
        let draft = patch.apply_to(existing.to_draft())?;
        let updated = draft.validate(self.clock.now())?.replace(&existing);
        self.materials.update_material(&updated).await?;
        info!(material_id = %id, "material updated");
        Ok(updated)
    }

    /// Deletes the material with its records and notifications.
    ///
    /// # Errors
    ///
    /// Returns `MaterialServiceError::Storage` if the material is missing.
    pub async fn delete(&self, id: MaterialId) -> Result<(), MaterialServiceError> {
        self.materials.delete_material(id).await?;
        info!(material_id = %id, "material deleted");
        Ok(())
    }
}
