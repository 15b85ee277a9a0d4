use chrono::{Days, NaiveDate};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::services::gym_service::lock_gym;
use crate::models::{
    page, period_end, CreateOgPlanRequest, GymSubscription, OgPlan, SubscriptionFilter,
    SubscriptionStatus, UpdateOgPlanRequest,
};

/// OG plans and the subscriptions gyms hold on them.
#[derive(Debug, Clone)]
pub struct SubscriptionService {
    db: PgPool,
}

impl SubscriptionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // OG plan CRUD

    pub async fn create_og_plan(&self, request: CreateOgPlanRequest) -> AppResult<OgPlan> {
        let plan = sqlx::query_as::<_, OgPlan>(
            r#"
            INSERT INTO og_plans (id, name, description, price_cents, duration_days, max_members)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.duration_days)
        .bind(request.max_members)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(og_plan_id = %plan.id, "created og plan");
        Ok(plan)
    }

    pub async fn get_og_plan(&self, og_plan_id: Uuid) -> AppResult<OgPlan> {
        sqlx::query_as::<_, OgPlan>("SELECT * FROM og_plans WHERE id = $1")
            .bind(og_plan_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("OG plan"))
    }

    pub async fn list_og_plans(&self, active_only: bool) -> AppResult<Vec<OgPlan>> {
        let plans = sqlx::query_as::<_, OgPlan>(
            "SELECT * FROM og_plans WHERE (NOT $1 OR is_active) ORDER BY price_cents, name",
        )
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(plans)
    }

    pub async fn update_og_plan(&self, og_plan_id: Uuid, request: UpdateOgPlanRequest) -> AppResult<OgPlan> {
        sqlx::query_as::<_, OgPlan>(
            r#"
            UPDATE og_plans
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                duration_days = COALESCE($5, duration_days),
                max_members = COALESCE($6, max_members),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(og_plan_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.duration_days)
        .bind(request.max_members)
        .bind(request.is_active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("OG plan"))
    }

    /// Plans that were ever subscribed to are protected by the foreign key and
    /// surface as a bad request.
    pub async fn delete_og_plan(&self, og_plan_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM og_plans WHERE id = $1")
            .bind(og_plan_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("OG plan"));
        }

        Ok(())
    }

    // Subscriptions

    /// Start a subscription period for `gym_id`. Without an explicit start the
    /// period is stacked after the gym's current one, or begins today.
    pub async fn subscribe(
        &self,
        gym_id: Uuid,
        og_plan_id: Uuid,
        start_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> AppResult<GymSubscription> {
        let plan = self.get_og_plan(og_plan_id).await?;
        if !plan.is_active {
            return Err(AppError::Validation(format!(
                "OG plan '{}' is no longer offered",
                plan.name
            )));
        }

        let mut tx = self.db.begin().await?;
        // concurrent purchases for one gym stack one after the other
        lock_gym(&mut tx, gym_id).await?;

        let start = match start_date {
            Some(start) => start,
            None => {
                let until = covered_until(&mut tx, gym_id, today).await?;
                next_period_start(until, today)
            }
        };
        let end = period_end(start, plan.duration_days);

        let subscription = sqlx::query_as::<_, GymSubscription>(
            r#"
            INSERT INTO gym_subscriptions (id, gym_id, og_plan_id, start_date, end_date, status, amount_cents)
            VALUES ($1, $2, $3, $4, $5, 'active', $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(gym_id)
        .bind(plan.id)
        .bind(start)
        .bind(end)
        .bind(plan.price_cents)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            subscription_id = %subscription.id,
            %gym_id,
            start = %subscription.start_date,
            end = %subscription.end_date,
            "gym subscribed"
        );
        Ok(subscription)
    }

    /// Flip overdue `active` rows to `expired`.
    pub async fn expire_overdue(&self, gym_id: Option<Uuid>, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE gym_subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND end_date < $2 AND ($1::uuid IS NULL OR gym_id = $1)
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Subscription covering `today`, if any.
    pub async fn current_subscription(&self, gym_id: Uuid, today: NaiveDate) -> AppResult<Option<GymSubscription>> {
        self.expire_overdue(Some(gym_id), today).await?;

        let subscription = sqlx::query_as::<_, GymSubscription>(
            r#"
            SELECT * FROM gym_subscriptions
            WHERE gym_id = $1 AND status = 'active' AND start_date <= $2 AND end_date >= $2
            ORDER BY end_date DESC
            LIMIT 1
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .fetch_optional(&self.db)
        .await?;

        Ok(subscription)
    }

    /// Most recent subscription of any status, used to explain a lapse.
    pub async fn latest_subscription(&self, gym_id: Uuid) -> AppResult<Option<GymSubscription>> {
        let subscription = sqlx::query_as::<_, GymSubscription>(
            "SELECT * FROM gym_subscriptions WHERE gym_id = $1 ORDER BY end_date DESC, created_at DESC LIMIT 1",
        )
        .bind(gym_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(subscription)
    }

    /// Member cap from the plan behind the current subscription.
    pub async fn member_limit(&self, gym_id: Uuid, today: NaiveDate) -> AppResult<Option<i32>> {
        let limit: Option<Option<i32>> = sqlx::query_scalar(
            r#"
            SELECT p.max_members FROM gym_subscriptions s
            JOIN og_plans p ON p.id = s.og_plan_id
            WHERE s.gym_id = $1 AND s.status = 'active' AND s.start_date <= $2 AND s.end_date >= $2
            ORDER BY s.end_date DESC
            LIMIT 1
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .fetch_optional(&self.db)
        .await?;

        Ok(limit.flatten())
    }

    pub async fn get_subscription(&self, subscription_id: Uuid) -> AppResult<GymSubscription> {
        sqlx::query_as::<_, GymSubscription>("SELECT * FROM gym_subscriptions WHERE id = $1")
            .bind(subscription_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Subscription"))
    }

    pub async fn list_subscriptions(&self, filter: &SubscriptionFilter) -> AppResult<Vec<GymSubscription>> {
        let (limit, offset) = page(filter.limit, filter.offset);

        let subscriptions = sqlx::query_as::<_, GymSubscription>(
            r#"
            SELECT * FROM gym_subscriptions
            WHERE ($1::uuid IS NULL OR gym_id = $1)
              AND ($2::subscription_status IS NULL OR status = $2)
            ORDER BY end_date DESC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.gym_id)
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(subscriptions)
    }

    pub async fn cancel_subscription(&self, subscription_id: Uuid) -> AppResult<GymSubscription> {
        let cancelled = sqlx::query_as::<_, GymSubscription>(
            r#"
            UPDATE gym_subscriptions
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.db)
        .await?;

        match cancelled {
            Some(subscription) => {
                tracing::info!(%subscription_id, gym_id = %subscription.gym_id, "cancelled subscription");
                Ok(subscription)
            }
            None => {
                let existing = self.get_subscription(subscription_id).await?;
                Err(AppError::BadRequest(format!(
                    "Subscription is already {}",
                    status_label(existing.status)
                )))
            }
        }
    }
}

fn status_label(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Expired => "expired",
        SubscriptionStatus::Cancelled => "cancelled",
    }
}

/// Last day covered by an active subscription that has not ended yet.
async fn covered_until(conn: &mut PgConnection, gym_id: Uuid, today: NaiveDate) -> AppResult<Option<NaiveDate>> {
    let end: Option<NaiveDate> = sqlx::query_scalar(
        r#"
        SELECT MAX(end_date) FROM gym_subscriptions
        WHERE gym_id = $1 AND status = 'active' AND end_date >= $2
        "#,
    )
    .bind(gym_id)
    .bind(today)
    .fetch_one(conn)
    .await?;

    Ok(end)
}

/// A new period continues the day after the current coverage, or starts today.
pub fn next_period_start(covered_until: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    match covered_until {
        Some(end) if end >= today => end.checked_add_days(Days::new(1)).unwrap_or(end),
        _ => today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_period_start_stacks_on_running_subscription() {
        let today = date(2024, 3, 10);

        assert_eq!(next_period_start(Some(date(2024, 3, 31)), today), date(2024, 4, 1));
        assert_eq!(next_period_start(Some(today), today), date(2024, 3, 11));
    }

    #[test]
    fn test_next_period_start_without_coverage() {
        let today = date(2024, 3, 10);

        assert_eq!(next_period_start(None, today), today);
        assert_eq!(next_period_start(Some(date(2024, 1, 1)), today), today);
    }
}
