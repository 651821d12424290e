use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::ApiError,
    models::User,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of an access token. Signed with the server secret (HS256) and validated on
/// every authenticated request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the username the token was issued to.
    pub sub: String,
    /// Expiration Time (exp): tokens past this instant are rejected.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

// --- Passwords ---

/// hash_password
///
/// bcrypt is deliberately slow, so the work runs on the blocking pool instead of
/// stalling a runtime worker.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// verify_password
///
/// A stored hash bcrypt cannot parse verifies as `false`.
pub async fn verify_password(candidate: String, hashed: String) -> Result<bool, ApiError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hashed))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(verified.unwrap_or_else(|e| {
        tracing::warn!("stored password hash could not be verified: {}", e);
        false
    }))
}

// --- Tokens ---

pub fn issue_token(username: &str, secret: &str, ttl_minutes: i64) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(ttl_minutes)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::warn!("rejected expired access token"),
                _ => tracing::warn!("rejected access token: {}", e),
            }
            Err(ApiError::Unauthenticated)
        }
    }
}

// --- Extractors ---

/// AuthUser
///
/// The resolved identity of an authenticated request. Says nothing about admin rights;
/// use [`AdminUser`] for routes that need them.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub is_approved: bool,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            is_approved: user.is_approved,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Dev bypass: in `Env::Local` with `auth_dev_bypass` set, an `x-user-id` header
///    naming an existing user is accepted without a token.
/// 2. Bearer token extraction and JWT decoding.
/// 3. Lookup of the token subject, so a deleted account stops working immediately.
///
/// Rejection: `ApiError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local && config.auth_dev_bypass {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.trim().parse::<i64>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = decode_token(token, &config.jwt_secret)?;

        let user = repo
            .get_user_by_username(&claims.sub)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(user.into())
    }
}

/// The approved-admin gate, separate from authentication so the two failures map to
/// different status codes.
pub fn require_approved_admin(user: &AuthUser) -> Result<(), ApiError> {
    if !user.is_approved {
        return Err(ApiError::Forbidden("Admin account is not approved"));
    }
    if !user.is_admin {
        return Err(ApiError::Forbidden("User does not have admin privileges"));
    }
    Ok(())
}

/// AdminUser
///
/// An [`AuthUser`] that has passed [`require_approved_admin`]. Taking this as a handler
/// argument is what makes a route admin-only.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if let Err(rejection) = require_approved_admin(&user) {
            tracing::warn!(user_id = user.id, "admin route refused: {}", rejection);
            return Err(rejection);
        }
        Ok(AdminUser(user))
    }
}
