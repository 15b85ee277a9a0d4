use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Frozen,
    Expired,
    Cancelled,
}

impl MembershipStatus {
    /// Active and frozen periods count towards the overlap rule.
    pub fn is_running(self) -> bool {
        matches!(self, MembershipStatus::Active | MembershipStatus::Frozen)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gym_id: Uuid,
    pub plan_id: Uuid,
    pub trainer_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn effective_status(&self, today: NaiveDate) -> MembershipStatus {
        effective_status(self.status, self.end_date, today)
    }

    /// Grants access to the gym on `today`.
    pub fn covers(&self, today: NaiveDate) -> bool {
        self.effective_status(today) == MembershipStatus::Active && self.start_date <= today
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMembershipRequest {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub trainer_id: Option<Uuid>,
    /// Defaults to today
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMembershipRequest {
    pub trainer_id: Option<Uuid>,
    /// Removes the assigned trainer; wins over `trainer_id`.
    #[serde(default)]
    pub clear_trainer: bool,
    /// Only `active` and `frozen` can be set directly.
    pub status: Option<MembershipStatus>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RenewMembershipRequest {
    /// Switch plans on renewal; defaults to the current plan.
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MembershipFilter {
    pub user_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub trainer_id: Option<Uuid>,
    pub status: Option<MembershipStatus>,
    /// Active memberships ending within this many days from today
    pub expiring_within_days: Option<i32>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Status as seen on `today`: active memberships past their end date are
/// expired even before the row has been updated.
pub fn effective_status(
    status: MembershipStatus,
    end_date: NaiveDate,
    today: NaiveDate,
) -> MembershipStatus {
    match status {
        MembershipStatus::Active if end_date < today => MembershipStatus::Expired,
        other => other,
    }
}

/// First day of a renewal period: the day after the current period if it is
/// still running, otherwise today.
pub fn renewal_start(current_end: NaiveDate, today: NaiveDate) -> NaiveDate {
    if current_end >= today {
        current_end
            .checked_add_days(Days::new(1))
            .unwrap_or(current_end)
    } else {
        today
    }
}
