use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::{Claims, TokenType, UserRole, UserSession};
use crate::config::AppConfig;
use crate::errors::AppError;

/// JWT token service for creating and validating tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("access_token_expires_in", &self.access_token_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .finish()
    }
}

/// Identity embedded in every token.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub role: UserRole,
    pub gym_id: Option<Uuid>,
}

impl JwtService {
    /// Create a new JWT service with the given secret and default lifetimes
    pub fn new(secret: &str) -> Self {
        Self::with_lifetimes(secret, Duration::minutes(15), Duration::days(30))
    }

    pub fn with_lifetimes(secret: &str, access: Duration, refresh: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access,
            refresh_token_expires_in: refresh,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_lifetimes(
            &config.jwt_secret,
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::days(config.refresh_token_ttl_days),
        )
    }

    fn create_token(
        &self,
        subject: TokenSubject<'_>,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + lifetime;

        let claims = Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.to_string(),
            role: subject.role,
            gym_id: subject.gym_id,
            token_type,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::Jwt)
    }

    pub fn create_access_token(&self, subject: TokenSubject<'_>) -> Result<String, AppError> {
        self.create_token(subject, TokenType::Access, self.access_token_expires_in)
    }

    pub fn create_refresh_token(&self, subject: TokenSubject<'_>) -> Result<String, AppError> {
        self.create_token(subject, TokenType::Refresh, self.refresh_token_expires_in)
    }

    /// Validate and decode a token of any type
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    /// Extract user session from an access token
    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AppError> {
        let claims = self.validate_access_token(token)?;
        UserSession::from_claims(&claims).map_err(|_| AppError::InvalidToken)
    }

    /// Get access token expiration time in seconds
    pub fn access_token_expires_in_seconds(&self) -> usize {
        self.access_token_expires_in.num_seconds() as usize
    }

    /// Extract JWT ID from token (for blacklisting)
    pub fn extract_jti(&self, token: &str) -> Result<String, AppError> {
        let claims = self.validate_token(token)?;
        Ok(claims.jti)
    }

    /// Create token pair (access + refresh)
    pub fn create_token_pair(&self, subject: TokenSubject<'_>) -> Result<(String, String), AppError> {
        let access_token = self.create_access_token(subject)?;
        let refresh_token = self.create_refresh_token(subject)?;
        Ok((access_token, refresh_token))
    }
}

/// Extract bearer token from authorization header
pub fn extract_bearer_token(auth_header: &str) -> Result<&str, AppError> {
    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AppError::InvalidAuthHeaderFormat),
    }
}
