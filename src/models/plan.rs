use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Membership plan a gym sells to its members.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(range(min = 1, max = 3660))]
    pub duration_days: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 1, max = 3660))]
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    pub active_only: Option<bool>,
}

/// Result of deleting a plan: plans still referenced by memberships are
/// retired instead of removed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanRemoval {
    Deleted,
    Deactivated,
}
