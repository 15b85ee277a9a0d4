use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Completed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub gym_id: Uuid,
    pub user_id: Uuid,
    pub membership_id: Option<Uuid>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub paid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub membership_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub user_id: Option<Uuid>,
    pub membership_id: Option<Uuid>,
    pub method: Option<PaymentMethod>,
    pub status: Option<PaymentStatus>,
    /// Inclusive, on the payment date
    pub from: Option<NaiveDate>,
    /// Inclusive, on the payment date
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
