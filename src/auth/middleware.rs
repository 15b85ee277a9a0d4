use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::auth::{extract_bearer_token, AuthService, UserRole, UserSession};
use crate::errors::AppError;

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AppError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Check the session stored by [`jwt_auth_middleware`] against a role gate.
pub fn require_role(request: &Request, required_role: UserRole) -> Result<(), AppError> {
    let session = extract_user_session(request)?;

    if !session.role.satisfies(required_role) {
        tracing::debug!(
            user_id = %session.user_id,
            role = %session.role,
            required = %required_role,
            "role gate rejected request"
        );
        return Err(AppError::InsufficientPermissions);
    }

    Ok(())
}

/// Platform operator only
pub async fn require_og(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Og)?;
    Ok(next.run(request).await)
}

/// Gym owners (and the platform operator)
pub async fn require_owner(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Admin)?;
    Ok(next.run(request).await)
}

pub async fn require_staff(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Staff)?;
    Ok(next.run(request).await)
}

pub async fn require_trainer(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Trainer)?;
    Ok(next.run(request).await)
}

pub async fn require_member(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(&request, UserRole::Member)?;
    Ok(next.run(request).await)
}

/// Extract user session from request (for use in handlers)
pub fn extract_user_session(request: &Request) -> Result<&UserSession, AppError> {
    request
        .extensions()
        .get::<UserSession>()
        .ok_or(AppError::MissingAuthHeader)
}

/// Handler extractor for the authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserSession);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserSession>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::MissingAuthHeader)
    }
}

/// CORS configuration for the API
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

/// Security headers middleware
pub fn security_headers_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::body::Body;
    use uuid::Uuid;

    fn request_with(role: Option<UserRole>) -> Request {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        if let Some(role) = role {
            request.extensions_mut().insert(UserSession {
                user_id: Uuid::new_v4(),
                email: "someone@example.com".to_string(),
                role,
                gym_id: None,
                jti: Uuid::new_v4().to_string(),
                exp: 0,
            });
        }
        request
    }

    #[test]
    fn test_require_role_uses_session() {
        assert!(require_role(&request_with(Some(UserRole::Staff)), UserRole::Staff).is_ok());
        assert!(require_role(&request_with(Some(UserRole::Og)), UserRole::Member).is_ok());

        assert_matches!(
            require_role(&request_with(Some(UserRole::Member)), UserRole::Admin),
            Err(AppError::InsufficientPermissions)
        );
        assert_matches!(
            require_role(&request_with(Some(UserRole::Admin)), UserRole::Og),
            Err(AppError::InsufficientPermissions)
        );
    }

    #[test]
    fn test_require_role_without_session() {
        assert_matches!(
            require_role(&request_with(None), UserRole::Member),
            Err(AppError::MissingAuthHeader)
        );
    }

    #[tokio::test]
    async fn test_current_user_extractor() {
        let request = request_with(Some(UserRole::Trainer));
        let (mut parts, _) = request.into_parts();

        let CurrentUser(session) = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session.role, UserRole::Trainer);

        let (mut empty, _) = request_with(None).into_parts();
        assert_matches!(
            CurrentUser::from_request_parts(&mut empty, &()).await,
            Err(AppError::MissingAuthHeader)
        );
    }
}
