//! Thin transport over the portal REST API.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{AuthError, RequestError, error_detail};

/// Response of `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Exchange credentials for a bearer token (OAuth2 password form).
    pub async fn request_token(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let resp = self
            .request(Method::POST, "/token")
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), detail = %error_detail(&body), "token request rejected");
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
                    AuthError::InvalidCredentials
                }
                StatusCode::FORBIDDEN => AuthError::AccountDisabled,
                other => AuthError::UnexpectedStatus {
                    status: other.as_u16(),
                    detail: error_detail(&body),
                },
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| AuthError::Decode(e.to_string()))?;
        if let Some(kind) = token.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                tracing::warn!(token_type = kind, "unexpected token type");
            }
        }
        Ok(token.access_token)
    }

    /// JSON `POST` without a bearer token, for the account endpoints that
    /// precede sign-in.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(path, "public api request");
        let resp = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RequestError::from_status(status, &text));
        }
        resp.json().await.map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// Check connectivity by hitting the health endpoint.
    pub async fn check_connectivity(&self) -> bool {
        match self.request(Method::GET, "/health").send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}
