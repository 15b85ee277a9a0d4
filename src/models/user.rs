use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Internal input for creating any kind of account.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemberRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    /// `staff` or `trainer`
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGymUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    /// Only honoured for employees, and only between `staff` and `trainer`.
    pub role: Option<UserRole>,
}

impl From<UpdateGymUserRequest> for UpdateUser {
    fn from(request: UpdateGymUserRequest) -> Self {
        Self {
            email: request.email,
            full_name: request.full_name,
            phone: request.phone,
            role: request.role,
            is_active: request.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub gym_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            role: user.role,
            gym_id: user.gym_id,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
