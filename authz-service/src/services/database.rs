//! PostgreSQL identity store.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{
    Permission, PermissionOverride, Principal, Role, RoleWithPermissions, UserRecord,
};
use crate::services::identity::IdentityStore;

/// PostgreSQL-backed identity store.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_role_id(&self, role_code: &str) -> Result<Uuid, AppError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT role_id FROM roles WHERE role_code = $1")
                .bind(role_code)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(id,)| id)
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown role {role_code}")))
    }

    async fn find_perm_id(&self, perm_code: &str) -> Result<Uuid, AppError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT perm_id FROM permissions WHERE perm_code = $1")
                .bind(perm_code)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(id,)| id).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("unknown permission {perm_code}"))
        })
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_active_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError> {
        let user: Option<UserRecord> =
            sqlx::query_as("SELECT * FROM users WHERE user_id = $1 AND active = TRUE")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        let role_rows: Vec<Role> = sqlx::query_as(
            "SELECT r.* FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.role_id \
             WHERE ur.user_id = $1 \
             ORDER BY r.role_code",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut roles = Vec::with_capacity(role_rows.len());
        for role in role_rows {
            let permissions: Vec<Permission> = sqlx::query_as(
                "SELECT p.* FROM permissions p \
                 JOIN role_permissions rp ON rp.perm_id = p.perm_id \
                 WHERE rp.role_id = $1",
            )
            .bind(role.role_id)
            .fetch_all(&self.pool)
            .await?;

            roles.push(RoleWithPermissions { role, permissions });
        }

        // Expired overrides are filtered here and skipped again during
        // resolution, so a stale row can never grant anything.
        let overrides: Vec<PermissionOverride> = sqlx::query_as(
            "SELECT user_id, perm_code, polarity, expires_utc, granted_utc \
             FROM user_permission_overrides \
             WHERE user_id = $1 AND (expires_utc IS NULL OR expires_utc > NOW())",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let factory_rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT factory_id FROM user_factories WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(Some(Principal {
            user,
            factory_ids: factory_rows.into_iter().map(|(id,)| id).collect(),
            roles,
            overrides,
        }))
    }

    async fn upsert_override(&self, override_: &PermissionOverride) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO user_permission_overrides \
             (user_id, perm_code, polarity, expires_utc, granted_utc) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, perm_code) DO UPDATE SET \
             polarity = EXCLUDED.polarity, \
             expires_utc = EXCLUDED.expires_utc, \
             granted_utc = EXCLUDED.granted_utc",
        )
        .bind(override_.user_id)
        .bind(&override_.perm_code)
        .bind(override_.polarity)
        .bind(override_.expires_utc)
        .bind(override_.granted_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_override(&self, user_id: Uuid, perm_code: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_permission_overrides WHERE user_id = $1 AND perm_code = $2",
        )
        .bind(user_id)
        .bind(perm_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn assign_role(&self, user_id: Uuid, role_code: &str) -> Result<(), AppError> {
        let role_id = self.find_role_id(role_code).await?;
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_role(&self, user_id: Uuid, role_code: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_roles ur USING roles r \
             WHERE ur.role_id = r.role_id AND ur.user_id = $1 AND r.role_code = $2",
        )
        .bind(user_id)
        .bind(role_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn grant_role_permission(
        &self,
        role_code: &str,
        perm_code: &str,
    ) -> Result<(), AppError> {
        let role_id = self.find_role_id(role_code).await?;
        let perm_id = self.find_perm_id(perm_code).await?;
        sqlx::query(
            "INSERT INTO role_permissions (role_id, perm_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(perm_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_role_permission(
        &self,
        role_code: &str,
        perm_code: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM role_permissions rp \
             USING roles r, permissions p \
             WHERE rp.role_id = r.role_id AND rp.perm_id = p.perm_id \
             AND r.role_code = $1 AND p.perm_code = $2",
        )
        .bind(role_code)
        .bind(perm_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
        })?;
        Ok(())
    }
}
