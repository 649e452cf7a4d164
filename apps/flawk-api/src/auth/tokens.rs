//! Signed access tokens (HS256 JWTs).
//!
//! A token is only honoured while it is also present in the owning user's
//! active-token list; see [`crate::gateway::auth::Authenticator::resolve`].

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: the user's prefixed ULID.
    pub sub: String,
    /// Expiration (unix timestamp, seconds).
    pub exp: i64,
    /// Issued-at (unix timestamp, seconds).
    pub iat: i64,
    /// Unique token id so two tokens minted in the same second differ.
    pub jti: String,
}

/// Why a token failed verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid signature or encoding")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("subject is not a user id")]
    MalformedSubject,
}

/// Sign a token for `user_id` expiring at the given unix timestamp.
pub fn encode_token(secret: &str, user_id: &str, exp: i64) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = AccessClaims {
        sub: user_id.to_string(),
        exp,
        iat: Utc::now().timestamp(),
        jti: flawk_common::id::prefixed_ulid(flawk_common::id::prefix::TOKEN),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Mint a fresh access token valid for `ttl_secs`.
pub fn mint_access_token(secret: &str, user_id: &str, ttl_secs: u64) -> Result<String, ApiError> {
    let exp = i64::try_from(ttl_secs)
        .ok()
        .and_then(|ttl| Utc::now().timestamp().checked_add(ttl))
        .ok_or_else(|| {
            tracing::error!(ttl_secs, "access token lifetime out of range");
            ApiError::internal("Token signing failed")
        })?;
    encode_token(secret, user_id, exp).map_err(|e| {
        tracing::error!(?e, "failed to sign access token");
        ApiError::internal("Token signing failed")
    })
}

/// Verify signature, expiry and subject shape.
///
/// Expiry is checked here rather than by `jsonwebtoken` so that a token is
/// rejected exactly when `exp * 1000 < now_millis`, with no leeway.
pub fn verify_token(secret: &str, token: &str) -> Result<AccessClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(?e, "token decode failed");
        TokenError::Invalid
    })?;

    let claims = data.claims;
    if claims.exp.saturating_mul(1000) < Utc::now().timestamp_millis() {
        return Err(TokenError::Expired);
    }
    if !flawk_common::id::is_well_formed(flawk_common::id::prefix::USER, &claims.sub) {
        return Err(TokenError::MalformedSubject);
    }

    Ok(claims)
}
