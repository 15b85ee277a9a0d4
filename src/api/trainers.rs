use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::extract::{Json, Path, Query};
use crate::api::response::{ApiResponse, ApiResult};
use crate::api::{today, AppState};
use crate::auth::{jwt_auth_middleware, require_trainer, CurrentUser};
use crate::errors::AppError;
use crate::models::*;

/// Trainer routes, scoped to the trainer's gym and the members assigned to
/// them through memberships.
pub fn trainer_routes(state: AppState) -> Router {
    Router::new()
        .route("/members", get(list_assigned_members))
        .route("/members/:user_id/attendance", get(member_attendance))
        .route("/attendance/check-in", post(check_in))
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route("/plans", get(list_plans))
        .route_layer(middleware::from_fn(require_trainer))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .with_state(state)
}

#[tracing::instrument(skip(state, session))]
async fn list_assigned_members(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Vec<UserResponse>> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    state
        .access
        .require_permission(&session, Permission::MembersRead)
        .await?;

    let members = state
        .memberships
        .assigned_members(gym.id, session.user_id, today)
        .await?;
    Ok(ApiResponse::ok(
        "Assigned members retrieved",
        members.into_iter().map(UserResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state, session))]
async fn member_attendance(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Vec<Attendance>> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    state
        .access
        .require_permission(&session, Permission::AttendanceRead)
        .await?;

    if !state
        .memberships
        .is_assigned(gym.id, session.user_id, user_id, today)
        .await?
    {
        return Err(AppError::Forbidden(
            "Member is not assigned to you".to_string(),
        ));
    }

    let filter = AttendanceFilter {
        user_id: Some(user_id),
        ..filter
    };
    let records = state.attendance.list_attendance(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Attendance retrieved", records))
}

#[tracing::instrument(skip(state, session))]
async fn check_in(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Attendance> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    state
        .access
        .require_permission(&session, Permission::AttendanceWrite)
        .await?;

    let attendance = state
        .attendance
        .check_in(gym.id, request.user_id, Some(session.user_id), today)
        .await?;
    Ok(ApiResponse::created("Checked in", attendance))
}

#[tracing::instrument(skip(state, session))]
async fn list_announcements(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<AnnouncementQuery>,
) -> ApiResult<Vec<Announcement>> {
    let gym = state.access.home_gym(&session, today()).await?;
    state
        .access
        .require_permission(&session, Permission::AnnouncementsRead)
        .await?;

    let announcements = state
        .announcements
        .list_announcements(gym.id, session.role, &query)
        .await?;
    Ok(ApiResponse::ok("Announcements retrieved", announcements))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_announcement(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    request.validate()?;
    let gym = state.access.home_gym(&session, today()).await?;
    state
        .access
        .require_permission(&session, Permission::AnnouncementsWrite)
        .await?;

    let announcement = state
        .announcements
        .create_announcement(gym.id, session.user_id, request)
        .await?;
    Ok(ApiResponse::created("Announcement published", announcement))
}

#[tracing::instrument(skip(state, session))]
async fn list_plans(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Vec<Plan>> {
    let gym = state.access.home_gym(&session, today()).await?;
    state
        .access
        .require_permission(&session, Permission::PlansRead)
        .await?;

    let plans = state.plans.list_plans(gym.id, true).await?;
    Ok(ApiResponse::ok("Plans retrieved", plans))
}
