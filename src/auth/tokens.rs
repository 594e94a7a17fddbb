use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::blacklist::BlacklistStore;
use crate::config::TokenConfig;
use crate::error::AuthError;
use crate::state::AppState;
use crate::timeutil;

/// Claim set embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // public id of the user
    pub admin: bool, // privilege at issuance
    pub iat: usize,  // issued at, unix seconds
    pub exp: usize,  // expires at, unix seconds
}

/// Signs and verifies access tokens (HS256) with the process-wide secret.
/// Stateless beyond the keys: every call is a function of the token string,
/// the current time and the blacklist.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.token)
    }
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            lifetime: config.lifetime(),
        }
    }

    /// Configured lifetime in whole seconds, reported as `expires_in`.
    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.whole_seconds()
    }

    /// Sign a fresh token for the given user. A zero lifetime yields a
    /// token that expires the moment the issuing second passes.
    pub fn issue(&self, public_id: Uuid, admin: bool) -> anyhow::Result<String> {
        let now = timeutil::utc_now();
        let exp = now + self.lifetime;
        let claims = Claims {
            sub: public_id,
            admin,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(public_id = %public_id, admin, "access token issued");
        Ok(token)
    }

    /// Signature and expiry checks only, no blacklist lookup. Logout uses
    /// this directly so an already-blacklisted token still resolves to its
    /// claims and the duplicate insert can surface as a conflict.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        // no leeway: a zero-lifetime token must expire within one second
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;
        Ok(data.claims)
    }

    /// Full validation: signature, then expiry, then blacklist membership.
    /// A blacklisted token is reported with the invalid-token message so a
    /// caller cannot tell revocation apart from forgery.
    pub async fn decode_and_validate(
        &self,
        token: &str,
        blacklist: &dyn BlacklistStore,
    ) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if blacklist.contains(token).await? {
            warn!(public_id = %claims.sub, "blacklisted token presented");
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::blacklist::MemoryBlacklist;
    use base64ct::{Base64UrlUnpadded, Encoding};

    const EXPIRED: &str = "Access token expired. Please log in again.";
    const INVALID: &str = "Invalid token. Please log in again.";

    fn codec(expire_minutes: i64) -> TokenCodec {
        TokenCodec::new(&TokenConfig {
            secret: "test secret".into(),
            expire_hours: 0,
            expire_minutes,
        })
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let codec = codec(15);
        let public_id = Uuid::new_v4();
        let token = codec.issue(public_id, true).expect("issue");
        let claims = codec.verify(&token).expect("verify");
        assert_eq!(claims.sub, public_id);
        assert!(claims.admin);
        assert_eq!(claims.exp, claims.iat + 15 * 60);
    }

    #[test]
    fn verify_is_idempotent() {
        let codec = codec(15);
        let token = codec.issue(Uuid::new_v4(), false).expect("issue");
        let first = codec.verify(&token).expect("first verify");
        let second = codec.verify(&token).expect("second verify");
        assert_eq!(first, second);
    }

    #[test]
    fn zero_lifetime_token_expires_within_a_second() {
        let codec = codec(0);
        let token = codec.issue(Uuid::new_v4(), false).expect("issue");
        std::thread::sleep(std::time::Duration::from_secs(2));
        let err = codec.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
        assert_eq!(err.to_string(), EXPIRED);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = codec(15).verify("not.a.token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(err.to_string(), INVALID);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = codec(15).issue(Uuid::new_v4(), false).expect("issue");
        let other = TokenCodec::new(&TokenConfig {
            secret: "another secret".into(),
            expire_hours: 0,
            expire_minutes: 15,
        });
        let err = other.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn tampered_admin_flag_fails_signature() {
        let codec = codec(15);
        let token = codec.issue(Uuid::new_v4(), false).expect("issue");

        // rewrite the payload segment without re-signing
        let parts: Vec<&str> = token.split('.').collect();
        let payload = Base64UrlUnpadded::decode_vec(parts[1]).expect("decode payload");
        let mut value: serde_json::Value = serde_json::from_slice(&payload).expect("json");
        assert_eq!(value["admin"], false);
        value["admin"] = true.into();
        let forged = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&value).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert_ne!(token, tampered);

        let err = codec.verify(&tampered).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(err.to_string(), INVALID);
    }

    #[tokio::test]
    async fn blacklisted_token_is_reported_invalid_not_expired() {
        let codec = codec(15);
        let blacklist = MemoryBlacklist::default();
        let token = codec.issue(Uuid::new_v4(), false).expect("issue");

        let claims = codec
            .decode_and_validate(&token, &blacklist)
            .await
            .expect("valid before revocation");
        let expires_at = timeutil::from_timestamp(claims.exp as i64).unwrap();

        blacklist.add(&token, expires_at).await.expect("first add");
        let err = codec.decode_and_validate(&token, &blacklist).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(err.to_string(), INVALID);

        // double logout races are resolved by the store's uniqueness rule
        let err = blacklist.add(&token, expires_at).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }
}
