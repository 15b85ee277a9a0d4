use chrono::DateTime;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::verify_password;
use crate::auth::{
    AuthResponse, ChangePasswordRequest, JwtService, LoginRequest, RefreshTokenRequest,
    RegisterOwnerRequest, TokenResponse, TokenSubject, UpdateProfileRequest, UserRole, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{CreateUser, UpdateUser, User, UserResponse};
use crate::services::UserService;

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
    users: UserService,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_service: JwtService) -> Self {
        Self {
            jwt_service,
            users: UserService::new(db.clone()),
            db,
        }
    }

    /// Register a gym owner. Platform operators are provisioned by the seeder
    /// and staff or members by their gym, so this is the only open sign-up.
    pub async fn register_owner(&self, request: RegisterOwnerRequest) -> AppResult<AuthResponse> {
        if self.users.get_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::AlreadyExists("User with this email".to_string()));
        }

        let user = self
            .users
            .create_user(CreateUser {
                email: request.email,
                password: request.password,
                full_name: request.full_name,
                phone: request.phone,
                role: UserRole::Admin,
                gym_id: None,
            })
            .await?;

        tracing::info!(user_id = %user.id, "registered gym owner");
        self.issue_tokens(user).await
    }

    /// Unknown emails, wrong passwords and deactivated accounts are
    /// indistinguishable to the caller.
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .users
            .get_user_by_email(&request.email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "rejected login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::debug!(user_id = %user.id, "rejected login for deactivated account");
            return Err(AppError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Exchange a stored refresh token for a new access token carrying the
    /// user's current role and gym.
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> AppResult<TokenResponse> {
        let claims = self.jwt_service.validate_refresh_token(&request.refresh_token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AppError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AppError::InvalidToken)?;

        let access_token = self.jwt_service.create_access_token(subject_of(&user))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the access token and revoke every refresh token of its owner.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        let claims = self.jwt_service.validate_access_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        tracing::info!(%user_id, "logged out");
        Ok(())
    }

    pub async fn is_token_blacklisted(&self, jti: &str) -> AppResult<bool> {
        let blacklisted: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW())",
        )
        .bind(jti)
        .fetch_one(&self.db)
        .await?;

        Ok(blacklisted)
    }

    /// Resolve an access token into a session. The user row is authoritative:
    /// deactivated users are rejected and role or gym changes apply at once.
    pub async fn validate_session(&self, token: &str) -> AppResult<UserSession> {
        let mut session = self.jwt_service.extract_user_session(token)?;

        if self.is_token_blacklisted(&session.jti).await? {
            return Err(AppError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AppError::InvalidToken)?;

        session.email = user.email;
        session.role = user.role;
        session.gym_id = user.gym_id;

        Ok(session)
    }

    pub async fn me(&self, user_id: Uuid) -> AppResult<UserResponse> {
        Ok(self.users.get_user_by_id(user_id).await?.into())
    }

    pub async fn update_profile(&self, user_id: Uuid, request: UpdateProfileRequest) -> AppResult<UserResponse> {
        let user = self
            .users
            .update_user(
                user_id,
                UpdateUser {
                    email: request.email,
                    full_name: request.full_name,
                    phone: request.phone,
                    ..UpdateUser::default()
                },
            )
            .await?;

        Ok(user.into())
    }

    /// Replace the password after checking the current one. Every device is
    /// signed out of refreshing.
    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> AppResult<()> {
        let user = self.users.get_user_by_id(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }
        if request.current_password == request.new_password {
            return Err(AppError::Validation(
                "new password must differ from the current one".to_string(),
            ));
        }

        self.users.update_password(user_id, &request.new_password).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        tracing::info!(%user_id, "changed password");
        Ok(())
    }

    // Private helper methods

    async fn issue_tokens(&self, user: User) -> AppResult<AuthResponse> {
        let (access_token, refresh_token) = self.jwt_service.create_token_pair(subject_of(&user))?;
        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: user.into(),
        })
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> AppResult<()> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;
        let expires_at = DateTime::from_timestamp(claims.exp as i64, 0).ok_or(AppError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> AppResult<bool> {
        let valid: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM refresh_tokens
                WHERE user_id = $1 AND token_hash = $2 AND expires_at > NOW() AND NOT revoked
            )
            "#,
        )
        .bind(user_id)
        .bind(token_hash(refresh_token))
        .fetch_one(&self.db)
        .await?;

        Ok(valid)
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> AppResult<()> {
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AppError::InvalidToken)?;

        sqlx::query("INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING")
            .bind(jti)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

fn subject_of(user: &User) -> TokenSubject<'_> {
    TokenSubject {
        user_id: user.id,
        email: &user.email,
        role: user.role,
        gym_id: user.gym_id,
    }
}

/// Refresh tokens are stored hashed.
fn token_hash(token: &str) -> String {
    format!("{:x}", md5::compute(token))
}
