use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;

use crate::auth::tokens::{Claims, TokenCodec};
use crate::error::{AuthError, AuthRejection};
use crate::state::AppState;

/// Pulls the raw token out of an `Authorization: Bearer <token>` header.
///
/// The scheme is case-sensitive with a single space separator; any other
/// shape counts as "no token provided", not as a malformed token.
pub struct BearerToken(pub String);

#[async_trait]
impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        extract_bearer(parts).map(BearerToken).map_err(|error| AuthRejection {
            error,
            admin_only: false,
        })
    }
}

/// Authenticated caller holding a valid, unexpired, unrevoked token.
pub struct RegisteredUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for RegisteredUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authorize(parts, state, false).await.map(RegisteredUser)
    }
}

/// Authenticated caller whose token carries the admin flag. A valid
/// non-admin token is rejected with 403, a different status class from
/// the 401 handed to unauthenticated callers.
pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = authorize(parts, state, true).await?;
        if !claims.admin {
            warn!(public_id = %claims.sub, "non-admin token on admin resource");
            return Err(AuthRejection {
                error: AuthError::InsufficientPrivilege,
                admin_only: true,
            });
        }
        Ok(AdminUser(claims))
    }
}

fn extract_bearer(parts: &Parts) -> Result<String, AuthError> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingToken)?;
    if token.is_empty() || token.contains(' ') {
        return Err(AuthError::MissingToken);
    }
    Ok(token.to_string())
}

async fn authorize(
    parts: &Parts,
    state: &AppState,
    admin_only: bool,
) -> Result<Claims, AuthRejection> {
    let token = extract_bearer(parts).map_err(|error| AuthRejection { error, admin_only })?;
    let codec = TokenCodec::from_ref(state);
    codec
        .decode_and_validate(&token, state.blacklist.as_ref())
        .await
        .map_err(|error| AuthRejection { error, admin_only })
}
