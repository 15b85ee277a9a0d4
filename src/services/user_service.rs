use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::auth::UserRole;
use crate::errors::{AppError, AppResult};
use crate::models::{normalize_email, page, CreateUser, UpdateUser, User, UserFilter};
use crate::services::gym_service::lock_gym;

#[derive(Debug, Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, user_data: CreateUser) -> AppResult<User> {
        let password_hash = prepare_account(&user_data)?;

        let mut conn = self.db.acquire().await?;
        insert_user(&mut conn, &user_data, &password_hash).await
    }

    /// Create a member account while holding the gym row, so the member count
    /// cannot move between the cap check and the insert.
    pub async fn create_member(&self, user_data: CreateUser, max_members: Option<i32>) -> AppResult<User> {
        let gym_id = match (user_data.role, user_data.gym_id) {
            (UserRole::Member, Some(gym_id)) => gym_id,
            _ => {
                return Err(AppError::Validation(
                    "a member account must belong to a gym".to_string(),
                ))
            }
        };
        let password_hash = prepare_account(&user_data)?;

        let mut tx = self.db.begin().await?;
        lock_gym(&mut tx, gym_id).await?;

        if let Some(max_members) = max_members {
            let members: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM users WHERE gym_id = $1 AND role = 'member'",
            )
            .bind(gym_id)
            .fetch_one(&mut *tx)
            .await?;

            if members >= i64::from(max_members) {
                return Err(AppError::SubscriptionLimitReached(format!(
                    "The gym's plan allows at most {} members",
                    max_members
                )));
            }
        }

        let user = insert_user(&mut tx, &user_data, &password_hash).await?;
        tx.commit().await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> AppResult<User> {
        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(normalize_email(email))
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// A user of `gym_id` whose role is one of `roles`; anything else reads as
    /// missing so gyms cannot probe each other's accounts.
    pub async fn get_gym_user(&self, gym_id: Uuid, user_id: Uuid, roles: &[UserRole]) -> AppResult<User> {
        let entity = if roles == [UserRole::Member] { "Member" } else { "User" };

        match self.find_by_id(user_id).await? {
            Some(user) if user.gym_id == Some(gym_id) && roles.contains(&user.role) => Ok(user),
            _ => Err(AppError::not_found(entity)),
        }
    }

    /// Users matching `filter`. A non-empty `roles` further limits the result
    /// to those roles within the same page.
    pub async fn list_users(&self, filter: &UserFilter, roles: &[UserRole]) -> AppResult<Vec<User>> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let roles: Vec<&str> = roles.iter().map(|role| role.as_str()).collect();

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::uuid IS NULL OR gym_id = $2)
              AND ($3::boolean IS NULL OR is_active = $3)
              AND ($4::text IS NULL OR full_name ILIKE '%' || $4 || '%' OR email ILIKE '%' || $4 || '%')
              AND (cardinality($7::text[]) = 0 OR role::text = ANY($7::text[]))
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.role)
        .bind(filter.gym_id)
        .bind(filter.is_active)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .bind(&roles)
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    pub async fn update_user(&self, user_id: Uuid, user_data: UpdateUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                phone = COALESCE($4, phone),
                role = COALESCE($5, role),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(user_data.email.as_deref().map(normalize_email))
        .bind(user_data.full_name.as_deref().map(str::trim))
        .bind(&user_data.phone)
        .bind(user_data.role)
        .bind(user_data.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

        Ok(user)
    }

    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> AppResult<User> {
        self.update_user(
            user_id,
            UpdateUser {
                is_active: Some(is_active),
                ..UpdateUser::default()
            },
        )
        .await
    }

    pub async fn update_password(&self, user_id: Uuid, new_password: &str) -> AppResult<()> {
        let password_hash = hash_password(new_password)?;

        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(&password_hash)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }

        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User"));
        }

        tracing::info!(%user_id, "deleted user");
        Ok(())
    }
}

/// Check the role/gym pairing and hash the password, ahead of any lock.
fn prepare_account(user_data: &CreateUser) -> AppResult<String> {
    if user_data.role.is_gym_scoped() != user_data.gym_id.is_some() {
        return Err(AppError::Validation(format!(
            "a {} account {} belong to a gym",
            user_data.role,
            if user_data.role.is_gym_scoped() { "must" } else { "cannot" }
        )));
    }

    Ok(hash_password(&user_data.password)?)
}

async fn insert_user(conn: &mut PgConnection, user_data: &CreateUser, password_hash: &str) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, phone, role, gym_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(normalize_email(&user_data.email))
    .bind(password_hash)
    .bind(user_data.full_name.trim())
    .bind(&user_data.phone)
    .bind(user_data.role)
    .bind(user_data.gym_id)
    .fetch_one(conn)
    .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "created user");
    Ok(user)
}
