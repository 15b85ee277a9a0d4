use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success envelope: `{"status": "success", "message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    code: StatusCode,
    pub status: &'static str,
    pub message: String,
    pub data: T,
}

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK,
            status: "success",
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, ())
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
