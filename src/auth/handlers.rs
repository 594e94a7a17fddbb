use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{LoginRequest, RegisterRequest, TokenResponse, UserInfo},
    extractors::{BearerToken, RegisteredUser},
    password::{hash_password, verify_password},
    repo::UserStore,
    tokens::TokenCodec,
};
use crate::error::AuthError;
use crate::state::AppState;
use crate::timeutil;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/user", get(get_user))
        .route("/auth/logout", post(logout))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation(format!(
            "{} is not a valid email",
            payload.email
        )));
    }

    if let Some(_existing) = state.users.find_by_email(&payload.email).await? {
        warn!(email = %payload.email, "email already registered");
        return Err(AuthError::Conflict(format!(
            "{} is already registered",
            payload.email
        )));
    }

    let hash = hash_password(&payload.password)?;
    let user = state.users.create(&payload.email, &hash, false).await?;

    let codec = TokenCodec::from_ref(&state);
    let access_token = codec.issue(user.public_id, user.admin)?;

    info!(public_id = %user.public_id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse::new(
            "successfully registered",
            access_token,
            codec.lifetime_seconds(),
        )),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::Validation(format!(
            "{} is not a valid email",
            payload.email
        )));
    }

    // unknown email and wrong password yield the same failure on purpose
    let user = match state.users.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(public_id = %user.public_id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let codec = TokenCodec::from_ref(&state);
    let access_token = codec.issue(user.public_id, user.admin)?;

    info!(public_id = %user.public_id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse::new(
        "successfully logged in",
        access_token,
        codec.lifetime_seconds(),
    )))
}

#[instrument(skip(state, claims), fields(public_id = %claims.0.sub))]
pub async fn get_user(
    State(state): State<AppState>,
    claims: RegisteredUser,
) -> Result<Json<UserInfo>, AuthError> {
    let RegisteredUser(claims) = claims;
    let user = state
        .users
        .find_by_public_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(public_id = %claims.sub, "token for unknown user");
            AuthError::InvalidToken
        })?;

    Ok(Json(UserInfo {
        email: user.email,
        public_id: user.public_id,
        admin: user.admin,
        registered_on: timeutil::format_datetime(user.registered_at),
        token_expires_in: timeutil::format_duration(timeutil::remaining_until(
            claims.exp as i64,
        )),
    }))
}

/// Verifies signature and expiry only, then records the token in the
/// blacklist. No membership pre-check: a second logout with the same token
/// hits the uniqueness constraint and surfaces as a 409 conflict.
#[instrument(skip(state, token))]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, AuthError> {
    let codec = TokenCodec::from_ref(&state);
    let claims = codec.verify(&token)?;
    let expires_at = timeutil::from_timestamp(claims.exp as i64).ok_or(AuthError::InvalidToken)?;

    state.blacklist.add(&token, expires_at).await?;

    info!(public_id = %claims.sub, "user logged out");
    Ok(Json(json!({
        "status": "success",
        "message": "successfully logged out",
    })))
}
