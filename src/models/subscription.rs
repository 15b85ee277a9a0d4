use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// SaaS plan the platform operator sells to gym owners.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OgPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_days: i32,
    /// Upper bound on member accounts per gym, unlimited when absent.
    pub max_members: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOgPlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(range(min = 1, max = 3660))]
    pub duration_days: i32,
    #[validate(range(min = 1))]
    pub max_members: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOgPlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 1, max = 3660))]
    pub duration_days: Option<i32>,
    #[validate(range(min = 1))]
    pub max_members: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GymSubscription {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub og_plan_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GymSubscription {
    /// Active and covering `today`.
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.status == SubscriptionStatus::Active
            && self.start_date <= today
            && today <= self.end_date
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days().max(0)
    }
}

/// Owner-side subscription purchase.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub og_plan_id: Uuid,
}

/// Operator-side grant, optionally backdated or scheduled.
#[derive(Debug, Deserialize)]
pub struct GrantSubscriptionRequest {
    pub gym_id: Uuid,
    pub og_plan_id: Uuid,
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionFilter {
    pub gym_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OgPlanQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusResponse {
    pub subscription: Option<GymSubscription>,
    pub is_active: bool,
    pub days_remaining: Option<i64>,
}

impl SubscriptionStatusResponse {
    pub fn new(subscription: Option<GymSubscription>, today: NaiveDate) -> Self {
        let is_active = subscription
            .as_ref()
            .map(|s| s.is_current(today))
            .unwrap_or(false);
        let days_remaining = subscription.as_ref().map(|s| s.days_remaining(today));

        Self {
            subscription,
            is_active,
            days_remaining,
        }
    }
}
