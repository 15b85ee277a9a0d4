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
use crate::api::{enroll_member, today, update_gym_user, AppState};
use crate::auth::{jwt_auth_middleware, require_staff, CurrentUser, UserRole, UserSession};
use crate::errors::AppResult;
use crate::models::*;

/// Front desk routes. The gym comes from the caller's account; each endpoint
/// also checks the permission stored for the staff role.
pub fn staff_routes(state: AppState) -> Router {
    Router::new()
        .route("/members", get(list_members).post(create_member))
        .route("/members/:user_id", get(get_member).put(update_member))
        .route("/memberships", get(list_memberships).post(create_membership))
        .route(
            "/memberships/:membership_id",
            get(get_membership).put(update_membership),
        )
        .route("/memberships/:membership_id/renew", post(renew_membership))
        .route("/payments", get(list_payments).post(record_payment))
        .route("/payments/:payment_id", get(get_payment))
        .route("/attendance", get(list_attendance))
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/:attendance_id/check-out", post(check_out))
        .route(
            "/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route("/plans", get(list_plans))
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(require_staff))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .with_state(state)
}

/// Caller's gym, after checking `permission`.
async fn permitted_gym(state: &AppState, session: &UserSession, permission: Permission) -> AppResult<Gym> {
    let gym = state.access.home_gym(session, today()).await?;
    state.access.require_permission(session, permission).await?;
    Ok(gym)
}

#[tracing::instrument(skip(state, session))]
async fn list_members(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<UserResponse>> {
    let gym = permitted_gym(&state, &session, Permission::MembersRead).await?;
    let filter = UserFilter {
        role: Some(UserRole::Member),
        gym_id: Some(gym.id),
        ..filter
    };
    let members = state.users.list_users(&filter, &[]).await?;
    Ok(ApiResponse::ok(
        "Members retrieved",
        members.into_iter().map(UserResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_member(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let gym = permitted_gym(&state, &session, Permission::MembersWrite).await?;
    let member = enroll_member(&state, gym.id, request, today()).await?;
    Ok(ApiResponse::created("Member created", member.into()))
}

#[tracing::instrument(skip(state, session))]
async fn get_member(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<UserResponse> {
    let gym = permitted_gym(&state, &session, Permission::MembersRead).await?;
    let member = state
        .users
        .get_gym_user(gym.id, user_id, &[UserRole::Member])
        .await?;
    Ok(ApiResponse::ok("Member retrieved", member.into()))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_member(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateGymUserRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let gym = permitted_gym(&state, &session, Permission::MembersWrite).await?;
    let member = update_gym_user(&state, gym.id, user_id, &[UserRole::Member], request).await?;
    Ok(ApiResponse::ok("Member updated", member.into()))
}

#[tracing::instrument(skip(state, session))]
async fn list_memberships(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<MembershipFilter>,
) -> ApiResult<Vec<Membership>> {
    let gym = permitted_gym(&state, &session, Permission::MembershipsRead).await?;
    let memberships = state
        .memberships
        .list_memberships(gym.id, &filter, today())
        .await?;
    Ok(ApiResponse::ok("Memberships retrieved", memberships))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateMembershipRequest>,
) -> ApiResult<Membership> {
    request.validate()?;
    let gym = permitted_gym(&state, &session, Permission::MembershipsWrite).await?;
    let membership = state
        .memberships
        .create_membership(gym.id, request, today())
        .await?;
    Ok(ApiResponse::created("Membership created", membership))
}

#[tracing::instrument(skip(state, session))]
async fn get_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(membership_id): Path<Uuid>,
) -> ApiResult<Membership> {
    let gym = permitted_gym(&state, &session, Permission::MembershipsRead).await?;
    let membership = state
        .memberships
        .get_membership(gym.id, membership_id, today())
        .await?;
    Ok(ApiResponse::ok("Membership retrieved", membership))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(membership_id): Path<Uuid>,
    Json(request): Json<UpdateMembershipRequest>,
) -> ApiResult<Membership> {
    request.validate()?;
    let gym = permitted_gym(&state, &session, Permission::MembershipsWrite).await?;
    let membership = state
        .memberships
        .update_membership(gym.id, membership_id, request, today())
        .await?;
    Ok(ApiResponse::ok("Membership updated", membership))
}

#[tracing::instrument(skip(state, session, request))]
async fn renew_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(membership_id): Path<Uuid>,
    request: Option<Json<RenewMembershipRequest>>,
) -> ApiResult<Membership> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let gym = permitted_gym(&state, &session, Permission::MembershipsWrite).await?;
    let renewed = state
        .memberships
        .renew_membership(gym.id, membership_id, request.plan_id, today())
        .await?;
    Ok(ApiResponse::created("Membership renewed", renewed))
}

#[tracing::instrument(skip(state, session))]
async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    let gym = permitted_gym(&state, &session, Permission::PaymentsRead).await?;
    let payments = state.payments.list_payments(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Payments retrieved", payments))
}

#[tracing::instrument(skip(state, session, request))]
async fn record_payment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    request.validate()?;
    let gym = permitted_gym(&state, &session, Permission::PaymentsWrite).await?;
    let payment = state
        .payments
        .record_payment(gym.id, session.user_id, request)
        .await?;
    Ok(ApiResponse::created("Payment recorded", payment))
}

#[tracing::instrument(skip(state, session))]
async fn get_payment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(payment_id): Path<Uuid>,
) -> ApiResult<Payment> {
    let gym = permitted_gym(&state, &session, Permission::PaymentsRead).await?;
    let payment = state.payments.get_payment(gym.id, payment_id).await?;
    Ok(ApiResponse::ok("Payment retrieved", payment))
}

#[tracing::instrument(skip(state, session))]
async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Vec<Attendance>> {
    let gym = permitted_gym(&state, &session, Permission::AttendanceRead).await?;
    let records = state.attendance.list_attendance(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Attendance retrieved", records))
}

#[tracing::instrument(skip(state, session))]
async fn check_in(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Attendance> {
    let gym = permitted_gym(&state, &session, Permission::AttendanceWrite).await?;
    let attendance = state
        .attendance
        .check_in(gym.id, request.user_id, Some(session.user_id), today())
        .await?;
    Ok(ApiResponse::created("Checked in", attendance))
}

#[tracing::instrument(skip(state, session))]
async fn check_out(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(attendance_id): Path<Uuid>,
) -> ApiResult<Attendance> {
    let gym = permitted_gym(&state, &session, Permission::AttendanceWrite).await?;
    let attendance = state.attendance.check_out(gym.id, attendance_id).await?;
    Ok(ApiResponse::ok("Checked out", attendance))
}

#[tracing::instrument(skip(state, session))]
async fn list_announcements(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<AnnouncementQuery>,
) -> ApiResult<Vec<Announcement>> {
    let gym = permitted_gym(&state, &session, Permission::AnnouncementsRead).await?;
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
    let gym = permitted_gym(&state, &session, Permission::AnnouncementsWrite).await?;
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
    Query(query): Query<PlanQuery>,
) -> ApiResult<Vec<Plan>> {
    let gym = permitted_gym(&state, &session, Permission::PlansRead).await?;
    let plans = state
        .plans
        .list_plans(gym.id, query.active_only.unwrap_or(false))
        .await?;
    Ok(ApiResponse::ok("Plans retrieved", plans))
}

#[tracing::instrument(skip(state, session))]
async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<GymDashboard> {
    let gym = permitted_gym(&state, &session, Permission::DashboardRead).await?;
    let dashboard = state.dashboard.gym_dashboard(gym.id, today()).await?;
    Ok(ApiResponse::ok("Dashboard retrieved", dashboard))
}
