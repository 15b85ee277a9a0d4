use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub user_id: Uuid,
    pub check_in_at: DateTime<Utc>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub recorded_by: Option<Uuid>,
}

impl Attendance {
    pub fn is_open(&self) -> bool {
        self.check_out_at.is_none()
    }

    /// Minutes spent in the gym, for finished visits.
    pub fn duration_minutes(&self) -> Option<i64> {
        self.check_out_at
            .map(|out| (out - self.check_in_at).num_minutes())
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceFilter {
    pub user_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub open_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
