use sqlx::PgPool;

use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{Permission, RolePermission};

/// Grants of fine-grained permissions to gym-scoped roles.
#[derive(Debug, Clone)]
pub struct PermissionService {
    db: PgPool,
}

impl PermissionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Install the default matrix when no grant exists yet. Returns the number
    /// of rows written.
    pub async fn seed_defaults(&self) -> AppResult<u64> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions")
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        let mut written = 0;
        for role in UserRole::ALL {
            for permission in Permission::defaults_for(role) {
                written += sqlx::query(
                    "INSERT INTO role_permissions (role, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(role)
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await?
                .rows_affected();
            }
        }
        tx.commit().await?;

        tracing::info!(grants = written, "seeded default role permissions");
        Ok(written)
    }

    pub async fn list_grants(&self, role: Option<UserRole>) -> AppResult<Vec<RolePermission>> {
        let grants = sqlx::query_as::<_, RolePermission>(
            r#"
            SELECT role, permission FROM role_permissions
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY role, permission
            "#,
        )
        .bind(role)
        .fetch_all(&self.db)
        .await?;

        Ok(grants)
    }

    pub async fn role_has(&self, role: UserRole, permission: Permission) -> AppResult<bool> {
        if implicit_holder(role) {
            return Ok(true);
        }

        let granted: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM role_permissions WHERE role = $1 AND permission = $2)",
        )
        .bind(role)
        .bind(permission.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(granted)
    }

    pub async fn grant(&self, role: UserRole, permission: Permission) -> AppResult<RolePermission> {
        if implicit_holder(role) {
            return Err(AppError::Validation(format!(
                "{} holds every permission implicitly",
                role
            )));
        }

        sqlx::query("INSERT INTO role_permissions (role, permission) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(role)
            .bind(permission.as_str())
            .execute(&self.db)
            .await?;

        tracing::info!(%role, %permission, "granted permission");
        Ok(RolePermission {
            role,
            permission: permission.as_str().to_string(),
        })
    }

    pub async fn revoke(&self, role: UserRole, permission: Permission) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role = $1 AND permission = $2")
            .bind(role)
            .bind(permission.as_str())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Permission grant"));
        }

        tracing::info!(%role, %permission, "revoked permission");
        Ok(())
    }
}

/// The platform operator and gym owners are never looked up in the table.
pub fn implicit_holder(role: UserRole) -> bool {
    matches!(role, UserRole::Og | UserRole::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_holders() {
        assert!(implicit_holder(UserRole::Og));
        assert!(implicit_holder(UserRole::Admin));
        assert!(!implicit_holder(UserRole::Staff));
        assert!(!implicit_holder(UserRole::Trainer));
        assert!(!implicit_holder(UserRole::Member));
    }
}
