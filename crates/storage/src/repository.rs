use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use training_core::model::{
    CompletionRecord, Material, MaterialId, Notification, NotificationId, Role, Site, SiteId, User,
    UserId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Salted password digest kept next to a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub salt: String,
    pub digest: String,
}

/// Bearer session issued at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id or username is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StorageError>;

    /// Overwrite an existing profile.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist, or
    /// `StorageError::Conflict` if the new username is taken.
    async fn update_user(&self, user: &User) -> Result<(), StorageError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Looks a guard up by normalized phone digits.
    async fn find_guard_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError>;

    /// All guards ordered by name.
    async fn list_guards(&self) -> Result<Vec<User>, StorageError>;

    /// Delete a user together with their records, notifications and sessions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), StorageError>;

    async fn credential(&self, id: UserId) -> Result<Option<Credential>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn set_credential(&self, id: UserId, credential: &Credential)
    -> Result<(), StorageError>;

    /// Moves a user to a new primary key.
    ///
    /// The old row's username is parked, a copy is inserted under `new_id`,
    /// dependent records and notifications are re-linked and the old row
    /// is removed. Either every step lands or none does.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if `old_id` does not exist and
    /// `StorageError::Conflict` if `new_id` is already taken.
    async fn reassign_user_id(&self, old_id: UserId, new_id: UserId)
    -> Result<User, StorageError>;
}

#[async_trait]
pub trait SiteRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert_site(&self, site: &Site) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the site does not exist.
    async fn update_site(&self, site: &Site) -> Result<(), StorageError>;

    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StorageError>;

    /// All sites ordered by name.
    async fn list_sites(&self) -> Result<Vec<Site>, StorageError>;

    /// Delete a site. Guards assigned to it become unassigned.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the site does not exist.
    async fn delete_site(&self, id: SiteId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait MaterialRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id already exists.
    async fn insert_material(&self, material: &Material) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the material does not exist.
    async fn update_material(&self, material: &Material) -> Result<(), StorageError>;

    async fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StorageError>;

    /// All materials, newest first.
    async fn list_materials(&self) -> Result<Vec<Material>, StorageError>;

    /// Delete a material with its records and notifications.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the material does not exist.
    async fn delete_material(&self, id: MaterialId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the guard or material is missing.
    async fn insert_record(&self, record: &CompletionRecord) -> Result<(), StorageError>;

    /// All records, most recent completion first.
    async fn list_records(&self) -> Result<Vec<CompletionRecord>, StorageError>;

    async fn list_records_for_guard(
        &self,
        guard_id: UserId,
    ) -> Result<Vec<CompletionRecord>, StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notifications(&self, items: &[Notification]) -> Result<(), StorageError>;

    /// A guard's notifications, newest first.
    async fn list_for_guard(&self, guard_id: UserId) -> Result<Vec<Notification>, StorageError>;

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notification does not exist.
    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError>;

    /// Returns how many notifications changed.
    async fn mark_all_read(&self, guard_id: UserId) -> Result<u64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notification does not exist.
    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError>;

    /// Drops a guard's notice for one material, returning how many were removed.
    async fn delete_for_material(
        &self,
        guard_id: UserId,
        material_id: MaterialId,
    ) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;

    /// Removes sessions that expired before `now`, returning how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    credentials: HashMap<UserId, Credential>,
    sites: HashMap<SiteId, Site>,
    materials: HashMap<MaterialId, Material>,
    records: Vec<CompletionRecord>,
    notifications: Vec<Notification>,
    sessions: HashMap<String, SessionRecord>,
}

impl MemoryState {
    fn username_taken(&self, username: &str, except: UserId) -> bool {
        self.users
            .values()
            .any(|u| u.id != except && u.username == username)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Mirrors the relational adapter's cascade rules.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&user.id) || state.username_taken(&user.username, user.id) {
            return Err(StorageError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user.id) {
            return Err(StorageError::NotFound);
        }
        if state.username_taken(&user.username, user.id) {
            return Err(StorageError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_guard_by_phone(&self, phone: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.role == Role::Guard && u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn list_guards(&self) -> Result<Vec<User>, StorageError> {
        let mut guards: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|u| u.role == Role::Guard)
            .cloned()
            .collect();
        guards.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        Ok(guards)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.users.remove(&id).ok_or(StorageError::NotFound)?;
        state.credentials.remove(&id);
        state.records.retain(|r| r.guard_id != id);
        state.notifications.retain(|n| n.guard_id != id);
        state.sessions.retain(|_, s| s.user_id != id);
        Ok(())
    }

    async fn credential(&self, id: UserId) -> Result<Option<Credential>, StorageError> {
        Ok(self.lock()?.credentials.get(&id).cloned())
    }

    async fn set_credential(
        &self,
        id: UserId,
        credential: &Credential,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        state.credentials.insert(id, credential.clone());
        Ok(())
    }

    async fn reassign_user_id(
        &self,
        old_id: UserId,
        new_id: UserId,
    ) -> Result<User, StorageError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&new_id) {
            return Err(StorageError::Conflict(format!("user {new_id} already exists")));
        }
        let mut user = state.users.remove(&old_id).ok_or(StorageError::NotFound)?;
        user.id = new_id;
        state.users.insert(new_id, user.clone());
        if let Some(credential) = state.credentials.remove(&old_id) {
            state.credentials.insert(new_id, credential);
        }
        for record in state.records.iter_mut().filter(|r| r.guard_id == old_id) {
            record.guard_id = new_id;
        }
        for n in state.notifications.iter_mut().filter(|n| n.guard_id == old_id) {
            n.guard_id = new_id;
        }
        for s in state.sessions.values_mut().filter(|s| s.user_id == old_id) {
            s.user_id = new_id;
        }
        Ok(user)
    }
}

#[async_trait]
impl SiteRepository for InMemoryRepository {
    async fn insert_site(&self, site: &Site) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.sites.contains_key(&site.id) {
            return Err(StorageError::Conflict(format!("site {} already exists", site.id)));
        }
        state.sites.insert(site.id, site.clone());
        Ok(())
    }

    async fn update_site(&self, site: &Site) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state.sites.get_mut(&site.id).ok_or(StorageError::NotFound)?;
        *slot = site.clone();
        Ok(())
    }

    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StorageError> {
        Ok(self.lock()?.sites.get(&id).cloned())
    }

    async fn list_sites(&self) -> Result<Vec<Site>, StorageError> {
        let mut sites: Vec<Site> = self.lock()?.sites.values().cloned().collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sites)
    }

    async fn delete_site(&self, id: SiteId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.sites.remove(&id).ok_or(StorageError::NotFound)?;
        for user in state.users.values_mut().filter(|u| u.site_id == Some(id)) {
            user.site_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl MaterialRepository for InMemoryRepository {
    async fn insert_material(&self, material: &Material) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.materials.contains_key(&material.id) {
            return Err(StorageError::Conflict(format!(
                "material {} already exists",
                material.id
            )));
        }
        state.materials.insert(material.id, material.clone());
        Ok(())
    }

    async fn update_material(&self, material: &Material) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let slot = state
            .materials
            .get_mut(&material.id)
            .ok_or(StorageError::NotFound)?;
        *slot = material.clone();
        Ok(())
    }

    async fn get_material(&self, id: MaterialId) -> Result<Option<Material>, StorageError> {
        Ok(self.lock()?.materials.get(&id).cloned())
    }

    async fn list_materials(&self) -> Result<Vec<Material>, StorageError> {
        let mut materials: Vec<Material> = self.lock()?.materials.values().cloned().collect();
        materials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(materials)
    }

    async fn delete_material(&self, id: MaterialId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.materials.remove(&id).ok_or(StorageError::NotFound)?;
        state.records.retain(|r| r.material_id != id);
        state.notifications.retain(|n| n.material_id != id);
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn insert_record(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&record.guard_id)
            || !state.materials.contains_key(&record.material_id)
        {
            return Err(StorageError::NotFound);
        }
        state.records.push(record.clone());
        Ok(())
    }

    async fn list_records(&self) -> Result<Vec<CompletionRecord>, StorageError> {
        let mut records = self.lock()?.records.clone();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }

    async fn list_records_for_guard(
        &self,
        guard_id: UserId,
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let mut records: Vec<CompletionRecord> = self
            .lock()?
            .records
            .iter()
            .filter(|r| r.guard_id == guard_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn insert_notifications(&self, items: &[Notification]) -> Result<(), StorageError> {
        self.lock()?.notifications.extend_from_slice(items);
        Ok(())
    }

    async fn list_for_guard(&self, guard_id: UserId) -> Result<Vec<Notification>, StorageError> {
        let mut items: Vec<Notification> = self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.guard_id == guard_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn get_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, StorageError> {
        Ok(self
            .lock()?
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let n = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(StorageError::NotFound)?;
        n.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, guard_id: UserId) -> Result<u64, StorageError> {
        let mut state = self.lock()?;
        let mut changed = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.guard_id == guard_id && !n.is_read)
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_notification(&self, id: NotificationId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != id);
        if state.notifications.len() == before {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_for_material(
        &self,
        guard_id: UserId,
        material_id: MaterialId,
    ) -> Result<u64, StorageError> {
        let mut state = self.lock()?;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|n| !(n.guard_id == guard_id && n.material_id == material_id));
        Ok((before - state.notifications.len()) as u64)
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        self.lock()?
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.lock()?.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        self.lock()?.sessions.remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut state = self.lock()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - state.sessions.len()) as u64)
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sites: Arc<dyn SiteRepository>,
    pub materials: Arc<dyn MaterialRepository>,
    pub records: Arc<dyn CompletionRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            users: Arc::new(repo.clone()),
            sites: Arc::new(repo.clone()),
            materials: Arc::new(repo.clone()),
            records: Arc::new(repo.clone()),
            notifications: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        }
    }
}
