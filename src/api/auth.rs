use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware,
    routing::{get, post},
    Router,
};
use validator::Validate;

use crate::api::extract::Json;
use crate::api::response::{ApiResponse, ApiResult};
use crate::api::AppState;
use crate::auth::{
    extract_bearer_token, jwt_auth_middleware, AuthResponse, ChangePasswordRequest, CurrentUser,
    LoginRequest, RefreshTokenRequest, RegisterOwnerRequest, TokenResponse, UpdateProfileRequest,
};
use crate::errors::AppError;
use crate::models::UserResponse;

/// Authentication routes shared by every role
pub fn auth_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .merge(protected)
        .with_state(state)
}

/// Register a gym owner
#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterOwnerRequest>,
) -> ApiResult<AuthResponse> {
    request.validate()?;
    let response = state.auth_service.register_owner(request).await?;
    Ok(ApiResponse::created("Registration successful", response))
}

#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    request.validate()?;
    let response = state.auth_service.login(request).await?;
    Ok(ApiResponse::ok("Login successful", response))
}

#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> ApiResult<TokenResponse> {
    let response = state.auth_service.refresh_token(request).await?;
    Ok(ApiResponse::ok("Token refreshed", response))
}

#[tracing::instrument(skip(state, headers))]
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<()> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AppError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    state.auth_service.logout(token).await?;
    Ok(ApiResponse::message("Successfully logged out"))
}

#[tracing::instrument(skip(state, session))]
async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<UserResponse> {
    let user = state.auth_service.me(session.user_id).await?;
    Ok(ApiResponse::ok("Profile retrieved", user))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let user = state
        .auth_service
        .update_profile(session.user_id, request)
        .await?;
    Ok(ApiResponse::ok("Profile updated", user))
}

#[tracing::instrument(skip(state, session, request))]
async fn change_password(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    request.validate()?;
    state
        .auth_service
        .change_password(session.user_id, request)
        .await?;
    Ok(ApiResponse::message("Password changed successfully"))
}
