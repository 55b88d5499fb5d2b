//! Guard-side playback: loads a material, runs the session and carries out
//! its effects.

mod driver;
mod poller;

use std::sync::Arc;

use storage::repository::{MaterialRepository, StorageError};
use tracing::debug;
use training_core::model::{Material, MaterialId, User, UserId};
use training_core::playback::PlaybackSession;

use crate::error::PlaybackServiceError;
use crate::record_service::RecordService;

pub use driver::{CompletionStatus, DispatchOutcome, PlaybackDriver};
pub use poller::{ProgressSource, ProgressPoller};

/// Tells the playback service who is signed in.
pub trait IdentityProvider: Send + Sync {
    fn current_guard_id(&self) -> Option<UserId>;
}

/// A fixed identity, e.g. resolved from a bearer token for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticIdentity(pub Option<UserId>);

impl IdentityProvider for StaticIdentity {
    fn current_guard_id(&self) -> Option<UserId> {
        self.0
    }
}

impl IdentityProvider for User {
    fn current_guard_id(&self) -> Option<UserId> {
        (!self.is_admin()).then_some(self.id)
    }
}

#[derive(Clone)]
pub struct PlaybackService {
    materials: Arc<dyn MaterialRepository>,
    records: Arc<RecordService>,
    identity: Arc<dyn IdentityProvider>,
}

impl PlaybackService {
    #[must_use]
    pub fn new(
        materials: Arc<dyn MaterialRepository>,
        records: Arc<RecordService>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            materials,
            records,
            identity,
        }
    }

    /// Same service for another signed-in user.
    #[must_use]
    pub fn for_identity(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    /// Materials a guard can open, newest first.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackServiceError::NoIdentity` when nobody is signed in.
    pub async fn available(&self) -> Result<Vec<Material>, PlaybackServiceError> {
        self.identity
            .current_guard_id()
            .ok_or(PlaybackServiceError::NoIdentity)?;
        Ok(self.materials.list_materials().await?)
    }

    /// Loads the material and starts a traversal at its first item.
    ///
    /// The returned outcome carries the start effects (autoplay of the first
    /// slide's narration).
    ///
    /// # Errors
    ///
    /// Returns `PlaybackServiceError::NoIdentity` when nobody is signed in,
    /// `Storage(NotFound)` for a missing material and `Playback(EmptyContent)`
    /// for a material with nothing to play.
    pub async fn open(
        &self,
        material_id: MaterialId,
    ) -> Result<(PlaybackDriver, DispatchOutcome), PlaybackServiceError> {
        let guard_id = self
            .identity
            .current_guard_id()
            .ok_or(PlaybackServiceError::NoIdentity)?;
        let material = self
            .materials
            .get_material(material_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let (session, effects) = PlaybackSession::start(&material, guard_id)?;
        debug!(%material_id, %guard_id, "playback opened");
        let driver = PlaybackDriver::new(session, Arc::clone(&self.records));
        Ok((
            driver,
            DispatchOutcome {
                effects,
                completion: None,
            },
        ))
    }
}
