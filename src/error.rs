use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const REALM_REGULAR_USERS: &str = "registered_users@mydomain.com";
pub const REALM_ADMIN_USERS: &str = "admin_users@mydomain.com";

/// Outcome of every fallible auth operation. The message strings are part of
/// the API contract and asserted by the test suite.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Conflict(String),
    #[error("email or password does not match")]
    InvalidCredentials,
    #[error("Unauthorized")]
    MissingToken,
    #[error("Invalid token. Please log in again.")]
    InvalidToken,
    #[error("Access token expired. Please log in again.")]
    ExpiredToken,
    #[error("You are not an administrator")]
    InsufficientPrivilege,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPrivilege => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `WWW-Authenticate` value for this failure, if one applies.
    ///
    /// Missing-token and insufficient-privilege rejections carry a bare
    /// challenge; invalid and expired tokens attach `error` and
    /// `error_description` attributes.
    pub fn challenge(&self, admin_only: bool) -> Option<String> {
        let realm = if admin_only {
            REALM_ADMIN_USERS
        } else {
            REALM_REGULAR_USERS
        };
        match self {
            AuthError::MissingToken => Some(format!("Bearer realm=\"{realm}\"")),
            AuthError::InsufficientPrivilege => {
                Some(format!("Bearer realm=\"{REALM_ADMIN_USERS}\""))
            }
            AuthError::InvalidToken | AuthError::ExpiredToken => Some(format!(
                "Bearer realm=\"{realm}\", error=\"invalid_token\", error_description=\"{self}\""
            )),
            _ => None,
        }
    }
}

/// An `AuthError` bound to the resource context it was raised in, so the
/// challenge realm distinguishes regular from admin-only resources.
#[derive(Debug)]
pub struct AuthRejection {
    pub error: AuthError,
    pub admin_only: bool,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let message = match &self.error {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(json!({ "message": message }));
        match self.error.challenge(self.admin_only) {
            Some(challenge) => (status, [(WWW_AUTHENTICATE, challenge)], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AuthRejection {
            error: self,
            admin_only: false,
        }
        .into_response()
    }
}
