//! Permission override model - per-user exceptions to role-derived grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Whether an override adds or removes a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "override_polarity", rename_all = "lowercase")]
pub enum OverridePolarity {
    Granted,
    Revoked,
}

/// Per-user permission override.
///
/// At most one active override exists per (user, permission code) pair.
/// An expired override is treated as absent. Overrides always take
/// precedence over role-derived grants for the same code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionOverride {
    pub user_id: Uuid,
    pub perm_code: String,
    pub polarity: OverridePolarity,
    pub expires_utc: Option<DateTime<Utc>>,
    pub granted_utc: DateTime<Utc>,
}

impl PermissionOverride {
    /// Create an override with no expiry, granted now.
    pub fn new(user_id: Uuid, perm_code: String, polarity: OverridePolarity) -> Self {
        Self {
            user_id,
            perm_code,
            polarity,
            expires_utc: None,
            granted_utc: Utc::now(),
        }
    }

    /// Create an override that lapses at the given instant.
    pub fn with_expiry(
        user_id: Uuid,
        perm_code: String,
        polarity: OverridePolarity,
        expires_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            perm_code,
            polarity,
            expires_utc: Some(expires_utc),
            granted_utc: Utc::now(),
        }
    }

    /// Whether the override has lapsed.
    pub fn is_expired(&self) -> bool {
        self.expires_utc.is_some_and(|end| end <= Utc::now())
    }
}
