use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SiteId, UserId};
use crate::model::site::Company;

/// Password a guard gets when the phone number has fewer than four digits.
pub const FALLBACK_GUARD_PASSWORD: &str = "0000";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("name cannot be empty")]
    EmptyName,

    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Guard,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Guard => "guard",
        }
    }

    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for anything but `admin`/`guard`.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        match raw.trim() {
            "admin" => Ok(Role::Admin),
            "guard" => Ok(Role::Guard),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }
}

/// A profile row. Credentials live beside it in storage, never on the struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub company: Option<Company>,
    pub site_id: Option<SiteId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserDraft {
    pub username: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub company: Option<Company>,
    pub site_id: Option<SiteId>,
}

impl UserDraft {
    /// Builds a profile. The username falls back to the display name.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyName` if the name is blank.
    pub fn validate(self, id: UserId, role: Role, now: DateTime<Utc>) -> Result<User, UserError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        let username = self
            .username
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| name.clone());
        let phone = self
            .phone
            .as_deref()
            .map(normalize_phone)
            .filter(|p| !p.is_empty());
        Ok(User {
            id,
            username,
            name,
            phone,
            role,
            company: self.company,
            site_id: self.site_id,
            created_at: now,
        })
    }
}

/// Keeps only the digits of a phone number.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Initial guard password: the last four digits of the phone number.
#[must_use]
pub fn default_guard_password(phone: Option<&str>) -> String {
    let digits = phone.map(normalize_phone).unwrap_or_default();
    if digits.len() < 4 {
        return FALLBACK_GUARD_PASSWORD.to_owned();
    }
    digits[digits.len() - 4..].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn phone_is_digits_only() {
        assert_eq!(normalize_phone(" 010-1234-5678 "), "01012345678");
    }

    #[test]
    fn default_password_uses_last_four_digits() {
        assert_eq!(default_guard_password(Some("010-1234-5678")), "5678");
        assert_eq!(default_guard_password(Some("12")), FALLBACK_GUARD_PASSWORD);
        assert_eq!(default_guard_password(None), FALLBACK_GUARD_PASSWORD);
    }

    #[test]
    fn username_defaults_to_name() {
        let user = UserDraft {
            name: " 김경비 ".into(),
            phone: Some("010 9999 0001".into()),
            ..UserDraft::default()
        }
        .validate(UserId::generate(), Role::Guard, fixed_now())
        .unwrap();
        assert_eq!(user.username, "김경비");
        assert_eq!(user.phone.as_deref(), Some("01099990001"));
        assert!(!user.is_admin());
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = UserDraft::default()
            .validate(UserId::generate(), Role::Guard, fixed_now())
            .unwrap_err();
        assert_eq!(err, UserError::EmptyName);
    }
}
