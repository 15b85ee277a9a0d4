use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::UserResponse;

/// User roles for role-based access control
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Platform operator selling subscriptions to gym owners
    Og,
    /// Gym owner
    Admin,
    Staff,
    Trainer,
    Member,
}

impl UserRole {
    pub const ALL: [UserRole; 5] = [
        UserRole::Og,
        UserRole::Admin,
        UserRole::Staff,
        UserRole::Trainer,
        UserRole::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Og => "og",
            UserRole::Admin => "admin",
            UserRole::Staff => "staff",
            UserRole::Trainer => "trainer",
            UserRole::Member => "member",
        }
    }

    /// Whether a caller with this role passes a gate requiring `required`.
    /// The platform operator passes every gate.
    pub fn satisfies(&self, required: UserRole) -> bool {
        *self == UserRole::Og || *self == required
    }

    /// Roles that work inside exactly one gym.
    pub fn is_gym_scoped(&self) -> bool {
        matches!(self, UserRole::Staff | UserRole::Trainer | UserRole::Member)
    }

    pub fn is_employee(&self) -> bool {
        matches!(self, UserRole::Staff | UserRole::Trainer)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "og" => Ok(UserRole::Og),
            "admin" => Ok(UserRole::Admin),
            "staff" => Ok(UserRole::Staff),
            "trainer" => Ok(UserRole::Trainer),
            "member" => Ok(UserRole::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
    pub token_type: TokenType,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterOwnerRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: usize,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: usize,
}

/// Authenticated caller, resolved from a validated access token and the
/// current state of the user row.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
    pub jti: String,
    pub exp: usize,
}

impl UserSession {
    pub fn from_claims(claims: &Claims) -> Result<Self, uuid::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub)?,
            email: claims.email.clone(),
            role: claims.role,
            gym_id: claims.gym_id,
            jti: claims.jti.clone(),
            exp: claims.exp,
        })
    }

    pub fn is_og(&self) -> bool {
        self.role == UserRole::Og
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        for role in UserRole::ALL {
            assert!(UserRole::Og.satisfies(role), "og should pass the {} gate", role);
            assert!(role.satisfies(role));
        }

        assert!(!UserRole::Admin.satisfies(UserRole::Og));
        assert!(!UserRole::Staff.satisfies(UserRole::Admin));
        assert!(!UserRole::Member.satisfies(UserRole::Trainer));
        assert!(!UserRole::Trainer.satisfies(UserRole::Staff));
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serialization_matches_database_labels() {
        for role in UserRole::ALL {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.as_str());
        }
    }

    #[test]
    fn test_gym_scoped_roles() {
        assert!(!UserRole::Og.is_gym_scoped());
        assert!(!UserRole::Admin.is_gym_scoped());
        assert!(UserRole::Staff.is_gym_scoped());
        assert!(UserRole::Trainer.is_employee());
        assert!(!UserRole::Member.is_employee());
    }
}
