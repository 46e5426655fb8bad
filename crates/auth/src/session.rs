use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vendorportal_core::UserId;

use crate::claims::{TokenClaims, TokenError, TokenValidationError, decode_claims, validate_claims};
use crate::AccountRole;

/// Client-held bearer token plus the identity decoded from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub subject: String,
    pub role: AccountRole,
    pub user_id: Option<UserId>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from a raw bearer token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, TokenError> {
        let token = token.into();
        let claims = decode_claims(&token)?;
        Self::from_claims(token, claims)
    }

    fn from_claims(token: String, claims: TokenClaims) -> Result<Self, TokenError> {
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| TokenError::Claims(format!("exp out of range: {}", claims.exp)))?;

        Ok(Self {
            issued_at: claims.issued_at(),
            expires_at,
            subject: claims.sub,
            role: claims.role,
            user_id: claims.user_id,
            token,
        })
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
        let claims = TokenClaims {
            sub: self.subject.clone(),
            role: self.role.clone(),
            user_id: self.user_id,
            exp: self.expires_at.timestamp(),
            iat: self.issued_at.map(|t| t.timestamp()),
        };
        validate_claims(&claims, now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry; zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}
