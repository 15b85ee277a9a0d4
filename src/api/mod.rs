// API routes and handlers

pub mod auth;
pub mod extract;
pub mod health;
pub mod members;
pub mod owners;
pub mod platform_admin;
pub mod response;
pub mod routes;
pub mod staff;
pub mod trainers;

use axum::extract::FromRef;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{AccessGuard, AuthService, JwtService, UserRole};
use crate::errors::{AppError, AppResult};
use crate::models::{CreateMemberRequest, CreateUser, UpdateGymUserRequest, User};
use crate::services::*;

/// Services shared by every router. Each one owns a pool handle, so cloning
/// the state per request is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub access: AccessGuard,
    pub users: UserService,
    pub gyms: GymService,
    pub subscriptions: SubscriptionService,
    pub plans: PlanService,
    pub memberships: MembershipService,
    pub payments: PaymentService,
    pub attendance: AttendanceService,
    pub announcements: AnnouncementService,
    pub permissions: PermissionService,
    pub dashboard: DashboardService,
}

impl AppState {
    pub fn new(db: PgPool, jwt_service: JwtService) -> Self {
        let gyms = GymService::new(db.clone());
        let subscriptions = SubscriptionService::new(db.clone());
        let permissions = PermissionService::new(db.clone());

        Self {
            auth_service: AuthService::new(db.clone(), jwt_service),
            access: AccessGuard::new(gyms.clone(), subscriptions.clone(), permissions.clone()),
            users: UserService::new(db.clone()),
            plans: PlanService::new(db.clone()),
            memberships: MembershipService::new(db.clone()),
            payments: PaymentService::new(db.clone()),
            attendance: AttendanceService::new(db.clone()),
            announcements: AnnouncementService::new(db.clone()),
            dashboard: DashboardService::new(db),
            gyms,
            subscriptions,
            permissions,
        }
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}

/// Calendar day used for period and subscription checks.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Create a member account in `gym_id`, honouring the member cap of the
/// gym's OG plan.
pub(crate) async fn enroll_member(
    state: &AppState,
    gym_id: Uuid,
    request: CreateMemberRequest,
    today: NaiveDate,
) -> AppResult<User> {
    let max_members = state.subscriptions.member_limit(gym_id, today).await?;

    state
        .users
        .create_member(
            CreateUser {
                email: request.email,
                password: request.password,
                full_name: request.full_name,
                phone: request.phone,
                role: UserRole::Member,
                gym_id: Some(gym_id),
            },
            max_members,
        )
        .await
}

/// Update a gym user whose role is one of `roles`. Role changes are limited to
/// moving employees between staff and trainer.
pub(crate) async fn update_gym_user(
    state: &AppState,
    gym_id: Uuid,
    user_id: Uuid,
    roles: &[UserRole],
    request: UpdateGymUserRequest,
) -> AppResult<User> {
    let user = state.users.get_gym_user(gym_id, user_id, roles).await?;

    if let Some(role) = request.role {
        if role != user.role && !(user.role.is_employee() && role.is_employee()) {
            return Err(AppError::Validation(format!(
                "a {} cannot become a {}",
                user.role, role
            )));
        }
    }

    state.users.update_user(user.id, request.into()).await
}
