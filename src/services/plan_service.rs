use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{CreatePlanRequest, Plan, PlanRemoval, UpdatePlanRequest};

/// Membership plans sold by a single gym.
#[derive(Debug, Clone)]
pub struct PlanService {
    db: PgPool,
}

impl PlanService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_plan(&self, gym_id: Uuid, request: CreatePlanRequest) -> AppResult<Plan> {
        let plan = sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (id, gym_id, name, description, price_cents, duration_days)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.duration_days)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(plan_id = %plan.id, %gym_id, "created plan");
        Ok(plan)
    }

    /// Plans of other gyms read as missing.
    pub async fn get_plan(&self, gym_id: Uuid, plan_id: Uuid) -> AppResult<Plan> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1 AND gym_id = $2")
            .bind(plan_id)
            .bind(gym_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Plan"))
    }

    pub async fn list_plans(&self, gym_id: Uuid, active_only: bool) -> AppResult<Vec<Plan>> {
        let plans = sqlx::query_as::<_, Plan>(
            r#"
            SELECT * FROM plans
            WHERE gym_id = $1 AND (NOT $2 OR is_active)
            ORDER BY price_cents, name
            "#,
        )
        .bind(gym_id)
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn update_plan(&self, gym_id: Uuid, plan_id: Uuid, request: UpdatePlanRequest) -> AppResult<Plan> {
        sqlx::query_as::<_, Plan>(
            r#"
            UPDATE plans
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                price_cents = COALESCE($5, price_cents),
                duration_days = COALESCE($6, duration_days),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1 AND gym_id = $2
            RETURNING *
            "#,
        )
        .bind(plan_id)
        .bind(gym_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.duration_days)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Plan"))
    }

    /// Delete an unused plan. Plans that memberships still point at are
    /// deactivated so history stays intact.
    pub async fn delete_plan(&self, gym_id: Uuid, plan_id: Uuid) -> AppResult<PlanRemoval> {
        let plan = self.get_plan(gym_id, plan_id).await?;

        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM memberships WHERE plan_id = $1)")
                .bind(plan.id)
                .fetch_one(&self.db)
                .await?;

        if in_use {
            sqlx::query("UPDATE plans SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(plan.id)
                .execute(&self.db)
                .await?;

            tracing::info!(%plan_id, %gym_id, "deactivated plan still referenced by memberships");
            return Ok(PlanRemoval::Deactivated);
        }

        sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(plan.id)
            .execute(&self.db)
            .await?;

        tracing::info!(%plan_id, %gym_id, "deleted plan");
        Ok(PlanRemoval::Deleted)
    }
}
