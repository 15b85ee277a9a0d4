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
use crate::auth::{jwt_auth_middleware, require_owner, CurrentUser, UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::*;

const EMPLOYEE_ROLES: [UserRole; 2] = [UserRole::Staff, UserRole::Trainer];

/// Gym owner routes. Everything below `/gyms/:gym_id` requires the caller to
/// own the gym and the gym to hold a running subscription, except the gym
/// record itself and its subscription, which stay reachable after a lapse.
pub fn owner_routes(state: AppState) -> Router {
    Router::new()
        .route("/gyms", get(list_gyms).post(create_gym))
        .route("/gyms/:gym_id", get(get_gym).put(update_gym).delete(delete_gym))
        .route("/og-plans", get(list_og_plans))
        .route("/gyms/:gym_id/subscription", get(get_subscription).post(subscribe))
        .route("/gyms/:gym_id/plans", get(list_plans).post(create_plan))
        .route(
            "/gyms/:gym_id/plans/:plan_id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/gyms/:gym_id/members", get(list_members).post(create_member))
        .route(
            "/gyms/:gym_id/members/:user_id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/gyms/:gym_id/staff", get(list_staff).post(create_staff))
        .route(
            "/gyms/:gym_id/staff/:user_id",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
        .route(
            "/gyms/:gym_id/memberships",
            get(list_memberships).post(create_membership),
        )
        .route(
            "/gyms/:gym_id/memberships/:membership_id",
            get(get_membership)
                .put(update_membership)
                .delete(delete_membership),
        )
        .route(
            "/gyms/:gym_id/memberships/:membership_id/renew",
            post(renew_membership),
        )
        .route(
            "/gyms/:gym_id/memberships/:membership_id/cancel",
            post(cancel_membership),
        )
        .route("/gyms/:gym_id/payments", get(list_payments).post(record_payment))
        .route(
            "/gyms/:gym_id/payments/:payment_id",
            get(get_payment).delete(delete_payment),
        )
        .route(
            "/gyms/:gym_id/payments/:payment_id/refund",
            post(refund_payment),
        )
        .route("/gyms/:gym_id/attendance", get(list_attendance))
        .route("/gyms/:gym_id/attendance/check-in", post(check_in))
        .route(
            "/gyms/:gym_id/attendance/:attendance_id/check-out",
            post(check_out),
        )
        .route(
            "/gyms/:gym_id/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/gyms/:gym_id/announcements/:announcement_id",
            get(get_announcement)
                .put(update_announcement)
                .delete(delete_announcement),
        )
        .route("/gyms/:gym_id/dashboard", get(gym_dashboard))
        .route_layer(middleware::from_fn(require_owner))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
        .with_state(state)
}

/// Owned gym with a running subscription.
async fn operated_gym(state: &AppState, session: &UserSession, gym_id: Uuid) -> AppResult<Gym> {
    state.access.owner_gym(session, gym_id, today()).await
}

// Gyms

#[tracing::instrument(skip(state, session))]
async fn list_gyms(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(filter): Query<GymFilter>,
) -> ApiResult<Vec<Gym>> {
    let gyms = if session.is_og() {
        state.gyms.list_gyms(&filter).await?
    } else {
        state.gyms.list_gyms_for_owner(session.user_id).await?
    };
    Ok(ApiResponse::ok("Gyms retrieved", gyms))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_gym(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateGymRequest>,
) -> ApiResult<Gym> {
    if session.role != UserRole::Admin {
        return Err(AppError::Forbidden("Only gym owners can create gyms".to_string()));
    }
    request.validate()?;

    let gym = state.gyms.create_gym(session.user_id, request).await?;
    Ok(ApiResponse::created("Gym created", gym))
}

#[tracing::instrument(skip(state, session))]
async fn get_gym(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
) -> ApiResult<Gym> {
    let gym = state.access.owner_gym_billing(&session, gym_id).await?;
    Ok(ApiResponse::ok("Gym retrieved", gym))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_gym(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<UpdateGymRequest>,
) -> ApiResult<Gym> {
    request.validate()?;
    let gym = state.access.owner_gym_billing(&session, gym_id).await?;
    let gym = state.gyms.update_gym(gym.id, request).await?;
    Ok(ApiResponse::ok("Gym updated", gym))
}

#[tracing::instrument(skip(state, session))]
async fn delete_gym(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
) -> ApiResult<()> {
    let gym = state.access.owner_gym_billing(&session, gym_id).await?;
    state.gyms.delete_gym(gym.id).await?;
    Ok(ApiResponse::message("Gym deleted"))
}

// Subscription

#[tracing::instrument(skip(state))]
async fn list_og_plans(State(state): State<AppState>) -> ApiResult<Vec<OgPlan>> {
    let plans = state.subscriptions.list_og_plans(true).await?;
    Ok(ApiResponse::ok("OG plans retrieved", plans))
}

#[tracing::instrument(skip(state, session))]
async fn get_subscription(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
) -> ApiResult<SubscriptionStatusResponse> {
    let gym = state.access.owner_gym_billing(&session, gym_id).await?;
    let today = today();

    let subscription = match state.subscriptions.current_subscription(gym.id, today).await? {
        Some(current) => Some(current),
        None => state.subscriptions.latest_subscription(gym.id).await?,
    };
    Ok(ApiResponse::ok(
        "Subscription retrieved",
        SubscriptionStatusResponse::new(subscription, today),
    ))
}

#[tracing::instrument(skip(state, session, request))]
async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<GymSubscription> {
    let gym = state.access.owner_gym_billing(&session, gym_id).await?;
    let subscription = state
        .subscriptions
        .subscribe(gym.id, request.og_plan_id, None, today())
        .await?;
    Ok(ApiResponse::created("Subscription purchased", subscription))
}

// Plans

#[tracing::instrument(skip(state, session))]
async fn list_plans(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(query): Query<PlanQuery>,
) -> ApiResult<Vec<Plan>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let plans = state
        .plans
        .list_plans(gym.id, query.active_only.unwrap_or(false))
        .await?;
    Ok(ApiResponse::ok("Plans retrieved", plans))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_plan(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreatePlanRequest>,
) -> ApiResult<Plan> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let plan = state.plans.create_plan(gym.id, request).await?;
    Ok(ApiResponse::created("Plan created", plan))
}

#[tracing::instrument(skip(state, session))]
async fn get_plan(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, plan_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Plan> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let plan = state.plans.get_plan(gym.id, plan_id).await?;
    Ok(ApiResponse::ok("Plan retrieved", plan))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_plan(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, plan_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdatePlanRequest>,
) -> ApiResult<Plan> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let plan = state.plans.update_plan(gym.id, plan_id, request).await?;
    Ok(ApiResponse::ok("Plan updated", plan))
}

#[tracing::instrument(skip(state, session))]
async fn delete_plan(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, plan_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<PlanRemoval> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let removal = state.plans.delete_plan(gym.id, plan_id).await?;
    let message = match removal {
        PlanRemoval::Deleted => "Plan deleted",
        PlanRemoval::Deactivated => "Plan is in use and was deactivated",
    };
    Ok(ApiResponse::ok(message, removal))
}

// Members

#[tracing::instrument(skip(state, session))]
async fn list_members(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<UserResponse>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreateMemberRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let member = enroll_member(&state, gym.id, request, today()).await?;
    Ok(ApiResponse::created("Member created", member.into()))
}

#[tracing::instrument(skip(state, session))]
async fn get_member(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<UserResponse> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateGymUserRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let member = update_gym_user(&state, gym.id, user_id, &[UserRole::Member], request).await?;
    Ok(ApiResponse::ok("Member updated", member.into()))
}

#[tracing::instrument(skip(state, session))]
async fn delete_member(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let member = state
        .users
        .get_gym_user(gym.id, user_id, &[UserRole::Member])
        .await?;
    state.users.delete_user(member.id).await?;
    Ok(ApiResponse::message("Member deleted"))
}

// Staff and trainers

#[tracing::instrument(skip(state, session))]
async fn list_staff(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<UserResponse>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let filter = UserFilter {
        gym_id: Some(gym.id),
        ..filter
    };

    let employees = match filter.role {
        Some(role) if !role.is_employee() => Vec::new(),
        _ => state.users.list_users(&filter, &EMPLOYEE_ROLES).await?,
    };

    Ok(ApiResponse::ok(
        "Staff retrieved",
        employees.into_iter().map(UserResponse::from).collect(),
    ))
}

#[tracing::instrument(skip(state, session, request))]
async fn create_staff(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreateStaffRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    if !request.role.is_employee() {
        return Err(AppError::Validation(
            "role must be staff or trainer".to_string(),
        ));
    }

    let gym = operated_gym(&state, &session, gym_id).await?;
    let employee = state
        .users
        .create_user(CreateUser {
            email: request.email,
            password: request.password,
            full_name: request.full_name,
            phone: request.phone,
            role: request.role,
            gym_id: Some(gym.id),
        })
        .await?;
    Ok(ApiResponse::created("Staff member created", employee.into()))
}

#[tracing::instrument(skip(state, session))]
async fn get_staff(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<UserResponse> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let employee = state
        .users
        .get_gym_user(gym.id, user_id, &EMPLOYEE_ROLES)
        .await?;
    Ok(ApiResponse::ok("Staff member retrieved", employee.into()))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_staff(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateGymUserRequest>,
) -> ApiResult<UserResponse> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let employee = update_gym_user(&state, gym.id, user_id, &EMPLOYEE_ROLES, request).await?;
    Ok(ApiResponse::ok("Staff member updated", employee.into()))
}

#[tracing::instrument(skip(state, session))]
async fn delete_staff(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let employee = state
        .users
        .get_gym_user(gym.id, user_id, &EMPLOYEE_ROLES)
        .await?;
    state.users.delete_user(employee.id).await?;
    Ok(ApiResponse::message("Staff member deleted"))
}

// Memberships

#[tracing::instrument(skip(state, session))]
async fn list_memberships(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(filter): Query<MembershipFilter>,
) -> ApiResult<Vec<Membership>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreateMembershipRequest>,
) -> ApiResult<Membership> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path((gym_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Membership> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path((gym_id, membership_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateMembershipRequest>,
) -> ApiResult<Membership> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let membership = state
        .memberships
        .update_membership(gym.id, membership_id, request, today())
        .await?;
    Ok(ApiResponse::ok("Membership updated", membership))
}

#[tracing::instrument(skip(state, session))]
async fn delete_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    state
        .memberships
        .delete_membership(gym.id, membership_id)
        .await?;
    Ok(ApiResponse::message("Membership deleted"))
}

#[tracing::instrument(skip(state, session, request))]
async fn renew_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, membership_id)): Path<(Uuid, Uuid)>,
    request: Option<Json<RenewMembershipRequest>>,
) -> ApiResult<Membership> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let gym = operated_gym(&state, &session, gym_id).await?;
    let renewed = state
        .memberships
        .renew_membership(gym.id, membership_id, request.plan_id, today())
        .await?;
    Ok(ApiResponse::created("Membership renewed", renewed))
}

#[tracing::instrument(skip(state, session))]
async fn cancel_membership(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Membership> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let membership = state
        .memberships
        .cancel_membership(gym.id, membership_id)
        .await?;
    Ok(ApiResponse::ok("Membership cancelled", membership))
}

// Payments

#[tracing::instrument(skip(state, session))]
async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let payments = state.payments.list_payments(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Payments retrieved", payments))
}

#[tracing::instrument(skip(state, session, request))]
async fn record_payment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreatePaymentRequest>,
) -> ApiResult<Payment> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path((gym_id, payment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Payment> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let payment = state.payments.get_payment(gym.id, payment_id).await?;
    Ok(ApiResponse::ok("Payment retrieved", payment))
}

#[tracing::instrument(skip(state, session))]
async fn delete_payment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, payment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    state.payments.delete_payment(gym.id, payment_id).await?;
    Ok(ApiResponse::message("Payment deleted"))
}

#[tracing::instrument(skip(state, session))]
async fn refund_payment(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, payment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Payment> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let payment = state.payments.refund_payment(gym.id, payment_id).await?;
    Ok(ApiResponse::ok("Payment refunded", payment))
}

// Attendance

#[tracing::instrument(skip(state, session))]
async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(filter): Query<AttendanceFilter>,
) -> ApiResult<Vec<Attendance>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let records = state.attendance.list_attendance(gym.id, &filter).await?;
    Ok(ApiResponse::ok("Attendance retrieved", records))
}

#[tracing::instrument(skip(state, session))]
async fn check_in(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> ApiResult<Attendance> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path((gym_id, attendance_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Attendance> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let attendance = state.attendance.check_out(gym.id, attendance_id).await?;
    Ok(ApiResponse::ok("Checked out", attendance))
}

// Announcements

#[tracing::instrument(skip(state, session))]
async fn list_announcements(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
    Query(query): Query<AnnouncementQuery>,
) -> ApiResult<Vec<Announcement>> {
    let gym = operated_gym(&state, &session, gym_id).await?;
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
    Path(gym_id): Path<Uuid>,
    Json(request): Json<CreateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let announcement = state
        .announcements
        .create_announcement(gym.id, session.user_id, request)
        .await?;
    Ok(ApiResponse::created("Announcement published", announcement))
}

#[tracing::instrument(skip(state, session))]
async fn get_announcement(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, announcement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Announcement> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let announcement = state
        .announcements
        .get_announcement(gym.id, announcement_id, session.role)
        .await?;
    Ok(ApiResponse::ok("Announcement retrieved", announcement))
}

#[tracing::instrument(skip(state, session, request))]
async fn update_announcement(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, announcement_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> ApiResult<Announcement> {
    request.validate()?;
    let gym = operated_gym(&state, &session, gym_id).await?;
    let announcement = state
        .announcements
        .update_announcement(gym.id, announcement_id, request)
        .await?;
    Ok(ApiResponse::ok("Announcement updated", announcement))
}

#[tracing::instrument(skip(state, session))]
async fn delete_announcement(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path((gym_id, announcement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    state
        .announcements
        .delete_announcement(gym.id, announcement_id)
        .await?;
    Ok(ApiResponse::message("Announcement deleted"))
}

// Dashboard

#[tracing::instrument(skip(state, session))]
async fn gym_dashboard(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(gym_id): Path<Uuid>,
) -> ApiResult<GymDashboard> {
    let gym = operated_gym(&state, &session, gym_id).await?;
    let dashboard = state.dashboard.gym_dashboard(gym.id, today()).await?;
    Ok(ApiResponse::ok("Dashboard retrieved", dashboard))
}
