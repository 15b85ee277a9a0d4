use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::{Json, Path, Query};
use crate::api::response::{ApiResponse, ApiResult};
use crate::api::{today, AppState};
use crate::auth::{jwt_auth_middleware, require_og, CurrentUser, UserRole};
use crate::errors::AppError;
use crate::models::*;

/// Platform operator console: tenants, SaaS plans, subscriptions, accounts
/// and the permission matrix.
pub fn platform_admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/gyms", get(list_gyms))
        .route("/gyms/:gym_id", get(get_gym))
        .route("/gyms/:gym_id/activate", post(activate_gym))
        .route("/gyms/:gym_id/deactivate", post(deactivate_gym))
        .route("/og-plans", get(list_og_plans).post(create_og_plan))
        .route(
            "/og-plans/:plan_id",
            get(get_og_plan).put(update_og_plan).delete(delete_og_plan),
        )
        .route(
            "/subscriptions",
            get(list_subscriptions).post(grant_subscription),
        )
        .route("/subscriptions/:subscription_id/cancel", post(cancel_subscription))
        .route("/users", get(list_users))
        .route("/users/:user_id/activate", post(activate_user))
        .route("/users/:user_id/deactivate", post(deactivate_user))
        .route("/permissions", get(list_permissions).post(grant_permission))
        .route("/permissions/:role/:permission", delete(revoke_permission))
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(require_og))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .with_state(state)
}

// Gyms

#[tracing::instrument(skip(state))]
async fn list_gyms(
    State(state): State<AppState>,
    Query(filter): Query<GymFilter>,
) -> ApiResult<Vec<Gym>> {
    let gyms = state.gyms.list_gyms(&filter).await?;
    Ok(ApiResponse::ok("Gyms retrieved", gyms))
}

#[tracing::instrument(skip(state))]
async fn get_gym(State(state): State<AppState>, Path(gym_id): Path<Uuid>) -> ApiResult<Gym> {
    let gym = state.gyms.get_gym(gym_id).await?;
    Ok(ApiResponse::ok("Gym retrieved", gym))
}

#[tracing::instrument(skip(state))]
async fn activate_gym(State(state): State<AppState>, Path(gym_id): Path<Uuid>) -> ApiResult<Gym> {
    let gym = state.gyms.set_active(gym_id, true).await?;
    Ok(ApiResponse::ok("Gym activated", gym))
}

#[tracing::instrument(skip(state))]
async fn deactivate_gym(State(state): State<AppState>, Path(gym_id): Path<Uuid>) -> ApiResult<Gym> {
    let gym = state.gyms.set_active(gym_id, false).await?;
    Ok(ApiResponse::ok("Gym deactivated", gym))
}

// OG plans

#[tracing::instrument(skip(state))]
async fn list_og_plans(
    State(state): State<AppState>,
    Query(query): Query<OgPlanQuery>,
) -> ApiResult<Vec<OgPlan>> {
    let plans = state
        .subscriptions
        .list_og_plans(query.active_only.unwrap_or(false))
        .await?;
    Ok(ApiResponse::ok("OG plans retrieved", plans))
}

#[tracing::instrument(skip(state, request))]
async fn create_og_plan(
    State(state): State<AppState>,
    Json(request): Json<CreateOgPlanRequest>,
) -> ApiResult<OgPlan> {
    request.validate()?;
    let plan = state.subscriptions.create_og_plan(request).await?;
    Ok(ApiResponse::created("OG plan created", plan))
}

#[tracing::instrument(skip(state))]
async fn get_og_plan(State(state): State<AppState>, Path(plan_id): Path<Uuid>) -> ApiResult<OgPlan> {
    let plan = state.subscriptions.get_og_plan(plan_id).await?;
    Ok(ApiResponse::ok("OG plan retrieved", plan))
}

#[tracing::instrument(skip(state, request))]
async fn update_og_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<UpdateOgPlanRequest>,
) -> ApiResult<OgPlan> {
    request.validate()?;
    let plan = state.subscriptions.update_og_plan(plan_id, request).await?;
    Ok(ApiResponse::ok("OG plan updated", plan))
}

#[tracing::instrument(skip(state))]
async fn delete_og_plan(State(state): State<AppState>, Path(plan_id): Path<Uuid>) -> ApiResult<()> {
    state.subscriptions.delete_og_plan(plan_id).await?;
    Ok(ApiResponse::message("OG plan deleted"))
}

// Subscriptions

#[tracing::instrument(skip(state))]
async fn list_subscriptions(
    State(state): State<AppState>,
    Query(filter): Query<SubscriptionFilter>,
) -> ApiResult<Vec<GymSubscription>> {
    state.subscriptions.expire_overdue(filter.gym_id, today()).await?;
    let subscriptions = state.subscriptions.list_subscriptions(&filter).await?;
    Ok(ApiResponse::ok("Subscriptions retrieved", subscriptions))
}

#[tracing::instrument(skip(state))]
async fn grant_subscription(
    State(state): State<AppState>,
    Json(request): Json<GrantSubscriptionRequest>,
) -> ApiResult<GymSubscription> {
    let gym = state.gyms.get_gym(request.gym_id).await?;
    let subscription = state
        .subscriptions
        .subscribe(gym.id, request.og_plan_id, request.start_date, today())
        .await?;
    Ok(ApiResponse::created("Subscription granted", subscription))
}

#[tracing::instrument(skip(state))]
async fn cancel_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<Uuid>,
) -> ApiResult<GymSubscription> {
    let subscription = state.subscriptions.cancel_subscription(subscription_id).await?;
    Ok(ApiResponse::ok("Subscription cancelled", subscription))
}

// Users

#[tracing::instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<UserResponse>> {
    let users = state.users.list_users(&filter, &[]).await?;
    Ok(ApiResponse::ok(
        "Users retrieved",
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state))]
async fn activate_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserResponse> {
    let user = state.users.set_active(user_id, true).await?;
    Ok(ApiResponse::ok("User activated", user.into()))
}

#[tracing::instrument(skip(state, session))]
async fn deactivate_user(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserResponse> {
    if user_id == session.user_id {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let user = state.users.set_active(user_id, false).await?;
    Ok(ApiResponse::ok("User deactivated", user.into()))
}

// Permissions

#[tracing::instrument(skip(state))]
async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<Vec<RolePermission>> {
    let grants = state.permissions.list_grants(query.role).await?;
    Ok(ApiResponse::ok("Permissions retrieved", grants))
}

#[tracing::instrument(skip(state))]
async fn grant_permission(
    State(state): State<AppState>,
    Json(request): Json<PermissionGrantRequest>,
) -> ApiResult<RolePermission> {
    let grant = state
        .permissions
        .grant(request.role, request.permission)
        .await?;
    Ok(ApiResponse::created("Permission granted", grant))
}

#[tracing::instrument(skip(state))]
async fn revoke_permission(
    State(state): State<AppState>,
    Path((role, permission)): Path<(UserRole, String)>,
) -> ApiResult<()> {
    let permission = permission
        .parse::<Permission>()
        .map_err(AppError::Validation)?;
    state.permissions.revoke(role, permission).await?;
    Ok(ApiResponse::message("Permission revoked"))
}

#[tracing::instrument(skip(state))]
async fn dashboard(State(state): State<AppState>) -> ApiResult<PlatformDashboard> {
    let dashboard = state.dashboard.platform_dashboard(today()).await?;
    Ok(ApiResponse::ok("Dashboard retrieved", dashboard))
}
