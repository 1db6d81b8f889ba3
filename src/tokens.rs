//! Stateless session tokens.
//!
//! Tokens are compact HS256 JWTs (`header.claims.signature`, base64url without
//! padding) signed with HMAC-SHA256 from `ring`. The header's `kid` names the
//! signing key so that keys can be rotated: new tokens are always signed with
//! the current key, while tokens signed with a previous key keep verifying
//! until that key is removed from configuration.
//!
//! There is no revocation list. A token is valid until `exp`, whatever the
//! client does with its cookie.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ring::hmac;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{AuthConfig, SigningKey};
use crate::storage::models::UserId;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No session cookie on a protected request.
    #[error("not authenticated")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token claims")]
    MalformedClaims,
    /// Login with an unknown email or a wrong password.
    #[error("incorrect email or password")]
    InvalidCredentials,
}

/// A freshly signed token and its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

struct VerificationKey {
    id: String,
    key: hmac::Key,
}

impl VerificationKey {
    fn new(signing_key: &SigningKey) -> Self {
        Self {
            id: signing_key.id.clone(),
            key: hmac::Key::new(hmac::HMAC_SHA256, &signing_key.secret),
        }
    }
}

/// Issues and verifies session tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenAuthority {
    /// First entry signs; the rest only verify.
    keys: Arc<Vec<VerificationKey>>,
    issuer: String,
    ttl_secs: i64,
}

impl TokenAuthority {
    pub fn new(config: &AuthConfig) -> Self {
        let keys = std::iter::once(&config.signing_key)
            .chain(config.previous_signing_keys.iter())
            .map(VerificationKey::new)
            .collect();

        Self {
            keys: Arc::new(keys),
            issuer: config.issuer.clone(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    pub fn issue(&self, user_id: UserId) -> IssuedToken {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    /// Sign a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user_id: UserId, now: i64) -> IssuedToken {
        let current = &self.keys[0];
        let expires_at = now + self.ttl_secs;

        let header = serde_json::json!({
            "alg": ALGORITHM,
            "typ": "JWT",
            "kid": current.id,
        });
        let claims = serde_json::json!({
            "iss": self.issuer,
            "iat": now,
            "exp": expires_at,
            "data": { "user_id": user_id.to_string() },
        });

        let unsigned = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = hmac::sign(&current.key, unsigned.as_bytes());
        let token = format!("{unsigned}.{}", URL_SAFE_NO_PAD.encode(signature.as_ref()));

        IssuedToken { token, expires_at }
    }

    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current time were `now` (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<UserId, AuthError> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, signature_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(AuthError::Malformed),
            };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(AuthError::Malformed);
        }
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::Malformed)?;

        let key = match header.kid.as_deref() {
            Some(kid) => self
                .keys
                .iter()
                .find(|k| k.id == kid)
                .ok_or(AuthError::InvalidSignature)?,
            None => &self.keys[0],
        };
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        hmac::verify(&key.key, signing_input.as_bytes(), &signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let claims: Value = decode_segment(claims_b64)?;
        let expires_at = claims
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or(AuthError::MalformedClaims)?;
        if now > expires_at {
            return Err(AuthError::Expired);
        }

        claims
            .get("data")
            .and_then(|data| data.get("user_id"))
            .and_then(parse_user_id)
            .ok_or(AuthError::MalformedClaims)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

/// The id is issued as a decimal string; bare JSON integers are accepted too.
fn parse_user_id(value: &Value) -> Option<UserId> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
