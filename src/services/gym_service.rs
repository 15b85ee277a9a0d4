use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{page, CreateGymRequest, Gym, GymFilter, UpdateGymRequest};

#[derive(Debug, Clone)]
pub struct GymService {
    db: PgPool,
}

impl GymService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_gym(&self, owner_id: Uuid, request: CreateGymRequest) -> AppResult<Gym> {
        let gym = sqlx::query_as::<_, Gym>(
            r#"
            INSERT INTO gyms (id, owner_id, name, address, phone, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(request.name.trim())
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(gym_id = %gym.id, %owner_id, "created gym");
        Ok(gym)
    }

    pub async fn get_gym(&self, gym_id: Uuid) -> AppResult<Gym> {
        sqlx::query_as::<_, Gym>("SELECT * FROM gyms WHERE id = $1")
            .bind(gym_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Gym"))
    }

    pub async fn list_gyms(&self, filter: &GymFilter) -> AppResult<Vec<Gym>> {
        let (limit, offset) = page(filter.limit, filter.offset);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let gyms = sqlx::query_as::<_, Gym>(
            r#"
            SELECT * FROM gyms
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
              AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.owner_id)
        .bind(filter.is_active)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(gyms)
    }

    pub async fn list_gyms_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<Gym>> {
        let gyms = sqlx::query_as::<_, Gym>(
            "SELECT * FROM gyms WHERE owner_id = $1 ORDER BY name",
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(gyms)
    }

    pub async fn update_gym(&self, gym_id: Uuid, request: UpdateGymRequest) -> AppResult<Gym> {
        sqlx::query_as::<_, Gym>(
            r#"
            UPDATE gyms
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(gym_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Gym"))
    }

    pub async fn set_active(&self, gym_id: Uuid, is_active: bool) -> AppResult<Gym> {
        let gym = sqlx::query_as::<_, Gym>(
            "UPDATE gyms SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(gym_id)
        .bind(is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Gym"))?;

        tracing::info!(%gym_id, is_active, "changed gym activation");
        Ok(gym)
    }

    pub async fn delete_gym(&self, gym_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM gyms WHERE id = $1")
            .bind(gym_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Gym"));
        }

        tracing::info!(%gym_id, "deleted gym");
        Ok(())
    }
}

/// Hold the gym row until the surrounding transaction ends.
pub(crate) async fn lock_gym(conn: &mut PgConnection, gym_id: Uuid) -> AppResult<()> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM gyms WHERE id = $1 FOR UPDATE")
        .bind(gym_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Gym"))?;

    Ok(())
}
