// Database rows and request/response shapes

pub mod announcement;
pub mod attendance;
pub mod dashboard;
pub mod gym;
pub mod membership;
pub mod payment;
pub mod permission;
pub mod plan;
pub mod subscription;
pub mod user;

pub use announcement::*;
pub use attendance::*;
pub use dashboard::*;
pub use gym::*;
pub use membership::*;
pub use payment::*;
pub use permission::*;
pub use plan::*;
pub use subscription::*;
pub use user::*;

use chrono::{Days, NaiveDate};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Normalise optional `limit`/`offset` query values.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Last day of a period of `duration_days` starting on `start`; both ends are
/// inclusive, so a 30 day period starting on the 1st ends on the 30th.
pub fn period_end(start: NaiveDate, duration_days: i32) -> NaiveDate {
    let days = duration_days.max(1) as u64 - 1;
    start.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
