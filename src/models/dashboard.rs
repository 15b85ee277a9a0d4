use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::UserRole;

#[derive(Debug, Clone, Serialize)]
pub struct GymDashboard {
    pub gym_id: Uuid,
    pub as_of: NaiveDate,
    pub total_members: i64,
    pub active_members: i64,
    pub new_members_this_month: i64,
    pub active_memberships: i64,
    pub expiring_memberships: i64,
    pub expired_memberships: i64,
    pub revenue_this_month_cents: i64,
    pub revenue_last_30_days_cents: i64,
    pub refunds_this_month_cents: i64,
    pub check_ins_today: i64,
    pub currently_checked_in: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub plan_breakdown: Vec<PlanBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlanBreakdown {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub active_memberships: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformDashboard {
    pub as_of: NaiveDate,
    pub total_gyms: i64,
    pub active_gyms: i64,
    pub gyms_with_active_subscription: i64,
    pub expired_subscriptions: i64,
    pub users_by_role: Vec<RoleCount>,
    pub subscription_revenue_total_cents: i64,
    pub subscription_revenue_this_month_cents: i64,
    pub og_plan_breakdown: Vec<OgPlanBreakdown>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoleCount {
    pub role: UserRole,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OgPlanBreakdown {
    pub og_plan_id: Uuid,
    pub og_plan_name: String,
    pub active_subscriptions: i64,
    pub total_subscriptions: i64,
}

pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// First days of the `count` months ending with the month of `today`, oldest first.
pub fn trailing_month_starts(today: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let current = month_start(today);
    (0..count)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .collect()
}

/// Spread aggregated `(YYYY-MM, cents)` rows over the trailing months so that
/// months without payments show up as zero.
pub fn fill_monthly_revenue(months: &[NaiveDate], rows: &[(String, i64)]) -> Vec<MonthlyRevenue> {
    months
        .iter()
        .map(|start| {
            let month = start.format("%Y-%m").to_string();
            let revenue_cents = rows
                .iter()
                .find(|(label, _)| *label == month)
                .map(|(_, cents)| *cents)
                .unwrap_or(0);
            MonthlyRevenue {
                month,
                revenue_cents,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trailing_month_starts_cross_year() {
        let months = trailing_month_starts(date(2024, 2, 29), 4);

        assert_eq!(
            months,
            vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]
        );
    }

    #[test]
    fn test_fill_monthly_revenue_zero_fills_gaps() {
        let months = trailing_month_starts(date(2024, 3, 10), 3);
        let rows = vec![("2024-01".to_string(), 5_000), ("2024-03".to_string(), 12_500)];

        let filled = fill_monthly_revenue(&months, &rows);

        assert_eq!(
            filled,
            vec![
                MonthlyRevenue { month: "2024-01".into(), revenue_cents: 5_000 },
                MonthlyRevenue { month: "2024-02".into(), revenue_cents: 0 },
                MonthlyRevenue { month: "2024-03".into(), revenue_cents: 12_500 },
            ]
        );
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(date(2024, 7, 31)), date(2024, 7, 1));
    }
}
