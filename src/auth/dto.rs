use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body returned whenever a fresh access token is handed out.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: String,
    pub message: String,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn new(message: &str, access_token: String, expires_in: i64) -> Self {
        Self {
            status: "success".into(),
            message: message.into(),
            access_token,
            token_type: "bearer".into(),
            expires_in,
        }
    }
}

/// Public view of a user. The two display strings are derived from stored
/// timestamps by pure functions, not persisted.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub email: String,
    pub public_id: Uuid,
    pub admin: bool,
    pub registered_on: String,
    pub token_expires_in: String,
}
