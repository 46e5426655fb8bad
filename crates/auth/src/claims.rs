use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vendorportal_core::UserId;

use crate::AccountRole;

/// Tolerated clock drift between the client and the token issuer.
pub const CLOCK_SKEW_LEEWAY_SECS: i64 = 60;

/// Claims carried in the payload segment of a portal bearer token.
///
/// Timestamps are Unix seconds, as issued by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the username.
    pub sub: String,

    pub role: AccountRole,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Expiration (seconds since epoch).
    pub exp: i64,

    /// Issued-at (seconds since epoch), when the issuer sets it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| Utc.timestamp_opt(iat, 0).single())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: expected three dot-separated segments")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("token payload is not a valid claims object: {0}")]
    Claims(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Decode the claims of a JWT without verifying its signature.
///
/// The client holds no verification key; the API verifies signatures on every
/// request. This is only used to read identity and expiry locally.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(TokenError::Malformed);
    };
    if payload.is_empty() {
        return Err(TokenError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Claims(e.to_string()))
}

/// Deterministically validate token claims against `now`.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let expires_at = claims.expires_at().ok_or(TokenValidationError::InvalidTimeWindow)?;

    if let Some(issued_at) = claims.issued_at() {
        if expires_at <= issued_at {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now + Duration::seconds(CLOCK_SKEW_LEEWAY_SECS) < issued_at {
            return Err(TokenValidationError::NotYetValid);
        }
    }
    if now >= expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn decodes_issuer_claims() {
        let token = encode(&serde_json::json!({
            "sub": "acme_admin",
            "role": "vendor",
            "user_id": 3,
            "exp": 2_000_000_000i64
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub, "acme_admin");
        assert_eq!(claims.role, AccountRole::Vendor);
        assert_eq!(claims.user_id, Some(UserId::new(3)));
        assert_eq!(claims.iat, None);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(decode_claims("abc.def"), Err(TokenError::Malformed));
        assert_eq!(decode_claims("a.b.c.d"), Err(TokenError::Malformed));
        assert_eq!(decode_claims("a..c"), Err(TokenError::Malformed));
    }

    #[test]
    fn rejects_payload_without_expiry() {
        let token = encode(&serde_json::json!({ "sub": "x", "role": "vendor" }));
        assert!(matches!(decode_claims(&token), Err(TokenError::Claims(_))));
    }

    #[test]
    fn rejects_non_base64_payload() {
        assert!(matches!(decode_claims("a.!!!.c"), Err(TokenError::Encoding(_))));
    }

    #[test]
    fn validation_uses_expiry() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "x".into(),
            role: AccountRole::Employee,
            user_id: None,
            exp: (now + Duration::minutes(5)).timestamp(),
            iat: Some(now.timestamp()),
        };
        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(
            validate_claims(&claims, now + Duration::minutes(5)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn validation_rejects_inverted_window() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "x".into(),
            role: AccountRole::Vendor,
            user_id: None,
            exp: now.timestamp(),
            iat: Some(now.timestamp() + 10),
        };
        assert_eq!(
            validate_claims(&claims, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
