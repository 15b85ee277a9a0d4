use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::extract::Query;
use crate::api::response::{ApiResponse, ApiResult};
use crate::api::{today, AppState};
use crate::auth::{jwt_auth_middleware, require_member, CurrentUser};
use crate::errors::AppError;
use crate::models::*;

/// Self-service routes for members. Every query is pinned to the caller.
pub fn member_routes(state: AppState) -> Router {
    Router::new()
        .route("/gym", get(get_gym))
        .route("/memberships", get(list_memberships))
        .route("/memberships/active", get(active_membership))
        .route("/payments", get(list_payments))
        .route("/attendance", get(list_attendance))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
        .route("/announcements", get(list_announcements))
        .route("/plans", get(list_plans))
        .route_layer(middleware::from_fn(require_member))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .with_state(state)
}

#[tracing::instrument(skip(state, session))]
async fn get_gym(State(state): State<AppState>, CurrentUser(session): CurrentUser) -> ApiResult<Gym> {
    let gym = state.access.home_gym(&session, today()).await?;
    Ok(ApiResponse::ok("Gym retrieved", gym))
}

#[tracing::instrument(skip(state, session))]
async fn list_memberships(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<MembershipFilter>,
) -> ApiResult<Vec<Membership>> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    let filter = MembershipFilter {
        user_id: Some(session.user_id),
        ..filter
    };

    let memberships = state
        .memberships
        .list_memberships(gym.id, &filter, today)
        .await?;
    Ok(ApiResponse::ok("Memberships retrieved", memberships))
}

#[tracing::instrument(skip(state, session))]
async fn active_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Membership> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    let membership = state
        .memberships
        .active_membership_for(session.user_id, gym.id, today)
        .await?
        .ok_or_else(|| AppError::not_found("Active membership"))?;
    Ok(ApiResponse::ok("Active membership retrieved", membership))
}

#[tracing::instrument(skip(state, session))]
async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    let gym = state.access.home_gym(&session, today()).await?;
    let filter = PaymentFilter {
        user_id: Some(session.user_id),
        ..filter
    };

    let payments = state.payments.list_payments(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Payments retrieved", payments))
}

#[tracing::instrument(skip(state, session))]
async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Vec<Attendance>> {
    let gym = state.access.home_gym(&session, today()).await?;
    let filter = AttendanceFilter {
        user_id: Some(session.user_id),
        ..filter
    };

    let records = state.attendance.list_attendance(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Attendance retrieved", records))
}

#[tracing::instrument(skip(state, session))]
async fn check_in(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Attendance> {
    let today = today();
    let gym = state.access.home_gym(&session, today).await?;
    let attendance = state
        .attendance
        .check_in(gym.id, session.user_id, None, today)
        .await?;
    Ok(ApiResponse::created("Checked in", attendance))
}

#[tracing::instrument(skip(state, session))]
async fn check_out(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Attendance> {
    let gym = state.access.home_gym(&session, today()).await?;
    let attendance = state
        .attendance
        .check_out_open(gym.id, session.user_id)
        .await?;
    Ok(ApiResponse::ok("Checked out", attendance))
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
