use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::{MaterialId, NotificationId, UserId};

/// "New material" notice for one guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub guard_id: UserId,
    pub material_id: MaterialId,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    #[must_use]
    pub fn unread(guard_id: UserId, material_id: MaterialId, now: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::generate(),
            guard_id,
            material_id,
            is_read: false,
            created_at: now,
        }
    }
}
