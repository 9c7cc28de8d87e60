//! Permission model - atomic `<module>:<action>` capability descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Permission entity (global registry, not factory-scoped).
///
/// The code is a stable identifier and is never reinterpreted once issued.
/// Category and level are display metadata only; they play no part in
/// authorization decisions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub perm_id: Uuid,
    pub perm_code: String,
    pub active: bool,
    pub category: Option<String>,
    pub level: Option<i16>,
    pub created_utc: DateTime<Utc>,
}

impl Permission {
    /// Create a new active permission.
    pub fn new(perm_code: String) -> Self {
        Self {
            perm_id: Uuid::new_v4(),
            perm_code,
            active: true,
            category: None,
            level: None,
            created_utc: Utc::now(),
        }
    }

    /// The module segment of the code ("equipment" in "equipment:read").
    pub fn module(&self) -> Option<&str> {
        self.perm_code.split(':').next()
    }
}

/// Permission response for API.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub perm_id: Uuid,
    pub perm_code: String,
    pub active: bool,
    pub category: Option<String>,
    pub level: Option<i16>,
}

impl From<Permission> for PermissionResponse {
    fn from(p: Permission) -> Self {
        Self {
            perm_id: p.perm_id,
            perm_code: p.perm_code,
            active: p.active,
            category: p.category,
            level: p.level,
        }
    }
}
