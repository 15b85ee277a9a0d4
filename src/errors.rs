use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::password::PasswordError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Missing authorization header")]
    MissingAuthHeader,
    #[error("Invalid authorization header format")]
    InvalidAuthHeaderFormat,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    SubscriptionInactive(String),
    #[error("{0}")]
    SubscriptionLimitReached(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Validation failed")]
    InvalidFields(#[from] validator::ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Password(#[from] PasswordError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(entity.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::MissingAuthHeader
            | AppError::InvalidAuthHeaderFormat
            | AppError::InvalidToken
            | AppError::TokenExpired
            | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::SubscriptionInactive(_) | AppError::SubscriptionLimitReached(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
            AppError::Validation(_) | AppError::InvalidFields(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Password(err) if err.is_policy_violation() => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Password(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Jwt(_) => "Invalid token".to_string(),
            AppError::Password(err) if !err.is_policy_violation() => {
                "Password processing error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AppError::AlreadyExists(constraint_subject(db_err.constraint()).to_string());
            }
            if db_err.is_foreign_key_violation() {
                return AppError::BadRequest(
                    "Referenced record does not exist or is still in use".to_string(),
                );
            }
            if db_err.is_check_violation() {
                return AppError::Validation(format!(
                    "constraint {} violated",
                    db_err.constraint().unwrap_or("check")
                ));
            }
        }

        AppError::Database(err)
    }
}

/// Human readable subject for a unique constraint name from the migrations.
fn constraint_subject(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "User with this email",
        Some("gyms_owner_id_name_key") => "Gym with this name",
        Some("plans_gym_id_name_key") => "Plan with this name",
        Some("og_plans_name_key") => "OG plan with this name",
        Some("attendance_one_open_per_user") => "Open check-in",
        Some("role_permissions_pkey") => "Permission grant",
        _ => "Record",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let data = match &self {
            AppError::InvalidFields(errors) => serde_json::to_value(errors).unwrap_or(Value::Null),
            _ => Value::Null,
        };

        let body = Json(json!({
            "status": "error",
            "message": self.public_message(),
            "data": data,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email)]
        email: String,
    }

    async fn body_json(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::not_found("Gym").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::AlreadyExists("User".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientPermissions.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::SubscriptionInactive("expired".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Password(PasswordError::TooShort).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Password(PasswordError::HashingFailed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Database(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let (status, body) = body_json(AppError::not_found("Membership")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Membership not found");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_database_errors_are_not_leaked() {
        let (status, body) = body_json(AppError::Database(sqlx::Error::PoolTimedOut)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Database error");
    }

    #[tokio::test]
    async fn test_field_errors_are_reported_in_data() {
        let errors = SignupForm {
            email: "not-an-email".to_string(),
        }
        .validate()
        .unwrap_err();

        let (status, body) = body_json(AppError::from(errors)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["data"]["email"].is_array());
    }

    #[test]
    fn test_constraint_subjects() {
        assert_eq!(constraint_subject(Some("users_email_key")), "User with this email");
        assert_eq!(constraint_subject(Some("unknown")), "Record");
        assert_eq!(constraint_subject(None), "Record");
    }
}
