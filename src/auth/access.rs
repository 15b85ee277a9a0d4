use chrono::NaiveDate;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{Gym, GymSubscription, Permission};
use crate::services::{GymService, PermissionService, SubscriptionService};

/// Tenant checks that sit between the role gates and the services: which gym
/// a caller may act on, whether that gym is paid up, and which fine-grained
/// permissions the caller's role holds.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    gyms: GymService,
    subscriptions: SubscriptionService,
    permissions: PermissionService,
}

impl AccessGuard {
    pub fn new(gyms: GymService, subscriptions: SubscriptionService, permissions: PermissionService) -> Self {
        Self {
            gyms,
            subscriptions,
            permissions,
        }
    }

    /// A gym the owner may operate on `today`.
    pub async fn owner_gym(&self, session: &UserSession, gym_id: Uuid, today: NaiveDate) -> AppResult<Gym> {
        let gym = self.owner_gym_billing(session, gym_id).await?;
        self.ensure_paid(session, &gym, today).await?;
        Ok(gym)
    }

    /// Ownership only. Used where a lapsed subscription must not lock the
    /// owner out: viewing the gym, editing it and renewing the subscription.
    pub async fn owner_gym_billing(&self, session: &UserSession, gym_id: Uuid) -> AppResult<Gym> {
        let gym = self.gyms.get_gym(gym_id).await?;
        ensure_gym_access(&gym, session)?;
        Ok(gym)
    }

    /// The gym a staff member, trainer or member belongs to.
    pub async fn home_gym(&self, session: &UserSession, today: NaiveDate) -> AppResult<Gym> {
        let gym_id = session
            .gym_id
            .ok_or_else(|| AppError::Forbidden("Account is not attached to a gym".to_string()))?;

        let gym = self.gyms.get_gym(gym_id).await?;
        ensure_gym_access(&gym, session)?;
        self.ensure_paid(session, &gym, today).await?;
        Ok(gym)
    }

    pub async fn require_permission(&self, session: &UserSession, permission: Permission) -> AppResult<()> {
        if self.permissions.role_has(session.role, permission).await? {
            return Ok(());
        }

        tracing::debug!(
            user_id = %session.user_id,
            role = %session.role,
            %permission,
            "permission denied"
        );
        Err(AppError::InsufficientPermissions)
    }

    async fn ensure_paid(&self, session: &UserSession, gym: &Gym, today: NaiveDate) -> AppResult<()> {
        if session.is_og() {
            return Ok(());
        }

        let subscription = match self.subscriptions.current_subscription(gym.id, today).await? {
            Some(current) => Some(current),
            None => self.subscriptions.latest_subscription(gym.id).await?,
        };
        ensure_subscription_active(subscription.as_ref(), today)
    }
}

/// Whether `session` may act on `gym` at all, ignoring billing.
pub fn ensure_gym_access(gym: &Gym, session: &UserSession) -> AppResult<()> {
    if session.is_og() {
        return Ok(());
    }

    let related = match session.role {
        UserRole::Admin => gym.owner_id == session.user_id,
        _ => session.gym_id == Some(gym.id),
    };
    if !related {
        return Err(AppError::Forbidden("You do not have access to this gym".to_string()));
    }

    if !gym.is_active {
        return Err(AppError::Forbidden("Gym has been deactivated".to_string()));
    }

    Ok(())
}

/// Non-OG callers need a subscription covering `today`.
pub fn ensure_subscription_active(subscription: Option<&GymSubscription>, today: NaiveDate) -> AppResult<()> {
    match subscription {
        Some(subscription) if subscription.is_current(today) => Ok(()),
        Some(subscription) if subscription.end_date < today => Err(AppError::SubscriptionInactive(
            format!("Gym subscription expired on {}", subscription.end_date),
        )),
        Some(subscription) if subscription.start_date > today => Err(AppError::SubscriptionInactive(
            format!("Gym subscription starts on {}", subscription.start_date),
        )),
        _ => Err(AppError::SubscriptionInactive(
            "Gym has no active subscription".to_string(),
        )),
    }
}
