use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::{Role, User},
    repository::RepositoryState,
};

pub mod password;

/// Roles allowed through `require_admin`.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
/// Roles allowed through `require_staff`.
pub const ADMIN_OR_STAFF: &[Role] = &[Role::Admin, Role::Staff];

/// Claims
///
/// Payload of a session token. Identity and role are embedded so clients can render
/// the admin shell without an extra round trip; the server still re-reads the role
/// from the store on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Inserted into request extensions
/// by `verify_token` and extracted by handlers as a plain argument.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Fails with `Forbidden` unless the caller holds one of `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, role = %self.role, "role check rejected");
            Err(ApiError::Forbidden)
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// Signs a token for `user` valid for the configured number of hours.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.jwt_expiry_hours)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Server(format!("failed to sign token: {e}")))
}

/// Verifies signature and expiry. Expiry is checked with zero leeway, so a token past
/// its `exp` is always rejected with `TokenExpired`.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::TokenExpired,
            _ => ApiError::Unauthorized("Invalid token.".to_string()),
        })
}

/// Pulls the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// authenticate
///
/// Full verification of a request's credentials:
/// 1. Token Extraction from the `Authorization: Bearer` header.
/// 2. Signature and expiry validation.
/// 3. Store lookup, so deleted users and changed roles take effect immediately.
pub async fn authenticate(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("Access denied. No token provided.".to_string()))?;

    let claims = decode_token(token, &config.jwt_secret)?;

    let user = repo
        .find_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid token. User not found.".to_string()))?;

    Ok(user.into())
}

/// AuthUser Extractor Implementation
///
/// Reuses the identity placed in request extensions by `verify_token`. Outside a
/// verified route it performs the full `authenticate` flow itself.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        authenticate(&parts.headers, &repo, &config).await
    }
}

/// verify_token
///
/// Middleware: rejects the request unless it carries a valid, unexpired token for an
/// existing user, then attaches the resolved `AuthUser` for downstream layers.
pub async fn verify_token(
    State(repo): State<RepositoryState>,
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(request.headers(), &repo, &config).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// check_role
///
/// Middleware body: must run after `verify_token`. Fails with `Unauthorized` when no
/// identity is attached and `Forbidden` when the role is not in `allowed`.
pub async fn check_role(
    allowed: &[Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required.".to_string()))?;

    user.require(allowed)?;
    Ok(next.run(request).await)
}

/// `check_role` restricted to admins.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    check_role(ADMIN_ONLY, request, next).await
}

/// `check_role` for the message inbox: admins and staff.
pub async fn require_staff(request: Request, next: Next) -> Result<Response, ApiError> {
    check_role(ADMIN_OR_STAFF, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_decodes_to_same_identity() {
        let config = AppConfig::default();
        let account = user(Role::Staff);
        let token = issue_token(&account, &config).unwrap();

        let claims = decode_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.username, "tester");
        assert_eq!(claims.role, Role::Staff);
    }

    #[test]
    fn token_signed_with_other_secret_is_unauthorized() {
        let token = issue_token(&user(Role::Admin), &AppConfig::default()).unwrap();
        assert!(matches!(
            decode_token(&token, "a-different-secret"),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn require_rejects_roles_outside_the_set() {
        let staff = AuthUser::from(user(Role::Staff));
        assert!(staff.require(ADMIN_OR_STAFF).is_ok());
        assert!(matches!(staff.require(ADMIN_ONLY), Err(ApiError::Forbidden)));
    }
}
