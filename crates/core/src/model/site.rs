use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::SiteId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SiteError {
    #[error("site name cannot be empty")]
    EmptyName,

    #[error("unknown company: {0}")]
    UnknownCompany(String),
}

//
// ─── COMPANY ───────────────────────────────────────────────────────────────────
//

/// Contracting company a site and its guards belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Company {
    MiraeAbm,
    DawonPmc,
}

impl Company {
    pub const ALL: [Company; 2] = [Company::MiraeAbm, Company::DawonPmc];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Company::MiraeAbm => "mirae_abm",
            Company::DawonPmc => "dawon_pmc",
        }
    }

    /// # Errors
    ///
    /// Returns `SiteError::UnknownCompany` for unrecognized codes.
    pub fn parse(raw: &str) -> Result<Self, SiteError> {
        match raw.trim() {
            "mirae_abm" => Ok(Company::MiraeAbm),
            "dawon_pmc" => Ok(Company::DawonPmc),
            other => Err(SiteError::UnknownCompany(other.to_owned())),
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Company::MiraeAbm => "미래에이비엠",
            Company::DawonPmc => "다원PMC",
        }
    }

    /// Detects the company from free text such as a worksheet name.
    #[must_use]
    pub fn from_marker(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("미래") || lower.contains("mirae") {
            Some(Company::MiraeAbm)
        } else if lower.contains("다원") || lower.contains("dawon") {
            Some(Company::DawonPmc)
        } else {
            None
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── SITE ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub company: Company,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDraft {
    pub name: String,
    pub company: Company,
    #[serde(default)]
    pub address: Option<String>,
}

impl SiteDraft {
    /// # Errors
    ///
    /// Returns `SiteError::EmptyName` if the name is blank.
    pub fn validate(self, id: SiteId, now: DateTime<Utc>) -> Result<Site, SiteError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(SiteError::EmptyName);
        }
        Ok(Site {
            id,
            name,
            company: self.company,
            address: self
                .address
                .map(|a| a.trim().to_owned())
                .filter(|a| !a.is_empty()),
            created_at: now,
        })
    }
}
