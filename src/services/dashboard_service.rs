use chrono::{Days, NaiveDate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{
    fill_monthly_revenue, month_start, trailing_month_starts, GymDashboard, OgPlanBreakdown,
    PlanBreakdown, PlatformDashboard, RoleCount,
};

/// Memberships ending within this many days count as expiring.
pub const EXPIRING_WINDOW_DAYS: i32 = 7;
/// Months covered by the revenue series, current month included.
pub const REVENUE_MONTHS: u32 = 6;

/// KPI aggregation for gym owners and the platform operator.
#[derive(Debug, Clone)]
pub struct DashboardService {
    db: PgPool,
}

impl DashboardService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn gym_dashboard(&self, gym_id: Uuid, today: NaiveDate) -> AppResult<GymDashboard> {
        let this_month = month_start(today);
        let thirty_days_ago = today.checked_sub_days(Days::new(29)).unwrap_or(today);

        let (total_members, active_members, new_members_this_month): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE EXISTS (
                    SELECT 1 FROM memberships m
                    WHERE m.user_id = u.id AND m.gym_id = $1 AND m.status = 'active'
                      AND m.start_date <= $2 AND m.end_date >= $2
                )),
                COUNT(*) FILTER (WHERE u.created_at >= $3::date)
            FROM users u
            WHERE u.gym_id = $1 AND u.role = 'member'
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .bind(this_month)
        .fetch_one(&self.db)
        .await?;

        let (active_memberships, expiring_memberships, expired_memberships): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE status = 'active' AND start_date <= $2 AND end_date >= $2),
                    COUNT(*) FILTER (WHERE status = 'active' AND end_date BETWEEN $2 AND $2 + $3::int),
                    COUNT(*) FILTER (WHERE status = 'expired' OR (status = 'active' AND end_date < $2))
                FROM memberships
                WHERE gym_id = $1
                "#,
            )
            .bind(gym_id)
            .bind(today)
            .bind(EXPIRING_WINDOW_DAYS)
            .fetch_one(&self.db)
            .await?;

        let (revenue_this_month_cents, revenue_last_30_days_cents, refunds_this_month_cents): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(amount_cents) FILTER (WHERE status = 'completed' AND paid_at >= $2::date), 0)::BIGINT,
                    COALESCE(SUM(amount_cents) FILTER (WHERE status = 'completed' AND paid_at >= $3::date), 0)::BIGINT,
                    COALESCE(SUM(amount_cents) FILTER (WHERE status = 'refunded' AND paid_at >= $2::date), 0)::BIGINT
                FROM payments
                WHERE gym_id = $1
                "#,
            )
            .bind(gym_id)
            .bind(this_month)
            .bind(thirty_days_ago)
            .fetch_one(&self.db)
            .await?;

        let (check_ins_today, currently_checked_in): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE check_in_at::date = $2),
                COUNT(*) FILTER (WHERE check_out_at IS NULL)
            FROM attendance
            WHERE gym_id = $1
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let months = trailing_month_starts(today, REVENUE_MONTHS);
        let series_start = months.first().copied().unwrap_or(this_month);
        let monthly_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT to_char(date_trunc('month', paid_at), 'YYYY-MM'), COALESCE(SUM(amount_cents), 0)::BIGINT
            FROM payments
            WHERE gym_id = $1 AND status = 'completed' AND paid_at >= $2::date
            GROUP BY 1
            "#,
        )
        .bind(gym_id)
        .bind(series_start)
        .fetch_all(&self.db)
        .await?;

        let plan_breakdown = sqlx::query_as::<_, PlanBreakdown>(
            r#"
            SELECT p.id AS plan_id, p.name AS plan_name, COUNT(m.id) AS active_memberships
            FROM plans p
            LEFT JOIN memberships m
              ON m.plan_id = p.id AND m.status = 'active' AND m.start_date <= $2 AND m.end_date >= $2
            WHERE p.gym_id = $1
            GROUP BY p.id, p.name
            ORDER BY active_memberships DESC, p.name
            "#,
        )
        .bind(gym_id)
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        Ok(GymDashboard {
            gym_id,
            as_of: today,
            total_members,
            active_members,
            new_members_this_month,
            active_memberships,
            expiring_memberships,
            expired_memberships,
            revenue_this_month_cents,
            revenue_last_30_days_cents,
            refunds_this_month_cents,
            check_ins_today,
            currently_checked_in,
            monthly_revenue: fill_monthly_revenue(&months, &monthly_rows),
            plan_breakdown,
        })
    }

    pub async fn platform_dashboard(&self, today: NaiveDate) -> AppResult<PlatformDashboard> {
        let this_month = month_start(today);

        let (total_gyms, active_gyms): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM gyms")
                .fetch_one(&self.db)
                .await?;

        let (gyms_with_active_subscription, expired_subscriptions): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT gym_id) FILTER (WHERE status = 'active' AND start_date <= $1 AND end_date >= $1),
                COUNT(*) FILTER (WHERE status = 'expired' OR (status = 'active' AND end_date < $1))
            FROM gym_subscriptions
            "#,
        )
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let (subscription_revenue_total_cents, subscription_revenue_this_month_cents): (i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(amount_cents), 0)::BIGINT,
                    COALESCE(SUM(amount_cents) FILTER (WHERE created_at >= $1::date), 0)::BIGINT
                FROM gym_subscriptions
                WHERE status <> 'cancelled'
                "#,
            )
            .bind(this_month)
            .fetch_one(&self.db)
            .await?;

        let users_by_role = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.db)
        .await?;

        let og_plan_breakdown = sqlx::query_as::<_, OgPlanBreakdown>(
            r#"
            SELECT
                p.id AS og_plan_id,
                p.name AS og_plan_name,
                COUNT(s.id) FILTER (WHERE s.status = 'active' AND s.start_date <= $1 AND s.end_date >= $1) AS active_subscriptions,
                COUNT(s.id) AS total_subscriptions
            FROM og_plans p
            LEFT JOIN gym_subscriptions s ON s.og_plan_id = p.id
            GROUP BY p.id, p.name
            ORDER BY p.name
            "#,
        )
        .bind(today)
        .fetch_all(&self.db)
        .await?;

        Ok(PlatformDashboard {
            as_of: today,
            total_gyms,
            active_gyms,
            gyms_with_active_subscription,
            expired_subscriptions,
            users_by_role,
            subscription_revenue_total_cents,
            subscription_revenue_this_month_cents,
            og_plan_breakdown,
        })
    }
}
