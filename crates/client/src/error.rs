use reqwest::StatusCode;
use serde_json::Value;

use vendorportal_core::DomainError;

use crate::storage::StorageError;

/// Failures of the sign-in lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("incorrect username or password")]
    InvalidCredentials,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("token could not be decoded: {0}")]
    InvalidToken(#[from] vendorportal_auth::TokenError),

    #[error("session was rejected by the API")]
    SessionRejected,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {detail}")]
    UnexpectedStatus { status: u16, detail: String },

    #[error("response could not be decoded: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures of an authenticated API call.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("session expired or was revoked")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("API error ({status}): {detail}")]
    Status { status: u16, detail: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("response could not be decoded: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RequestError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = error_detail(body);
        match status {
            StatusCode::UNAUTHORIZED => RequestError::Unauthorized,
            StatusCode::FORBIDDEN => RequestError::Forbidden(detail),
            StatusCode::NOT_FOUND => RequestError::NotFound(detail),
            other => RequestError::Status {
                status: other.as_u16(),
                detail,
            },
        }
    }
}

/// Human-readable message from an API error body.
///
/// Bodies are usually `{"detail": "..."}`; validation failures carry a list or
/// object under `detail`. Anything else is returned as-is.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_unwrapped() {
        assert_eq!(
            error_detail(r#"{"detail":"Incorrect username or password"}"#),
            "Incorrect username or password"
        );
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let detail = error_detail(r#"{"detail":[{"loc":["body","phone"],"msg":"too short"}]}"#);
        assert!(detail.contains("too short"));
    }

    #[test]
    fn plain_bodies_pass_through() {
        assert_eq!(error_detail(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn statuses_map_to_variants() {
        assert!(matches!(
            RequestError::from_status(StatusCode::UNAUTHORIZED, ""),
            RequestError::Unauthorized
        ));
        assert!(matches!(
            RequestError::from_status(StatusCode::FORBIDDEN, r#"{"detail":"no"}"#),
            RequestError::Forbidden(d) if d == "no"
        ));
        assert!(matches!(
            RequestError::from_status(StatusCode::BAD_REQUEST, "x"),
            RequestError::Status { status: 400, .. }
        ));
    }
}
