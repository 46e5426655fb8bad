//! Client configuration (environment-driven).

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Settings for talking to the portal API and persisting the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the external API (no trailing slash).
    pub api_url: String,
    /// Directory of the file-backed session store.
    pub storage_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub login_path: String,
    pub unauthorized_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            storage_dir: default_storage_dir(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            unauthorized_path: DEFAULT_UNAUTHORIZED_PATH.to_string(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (tests, embedding).
    ///
    /// Unset values use defaults; unparsable values fall back with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("PORTAL_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                tracing::debug!("PORTAL_API_URL not set; using {}", DEFAULT_API_URL);
                defaults.api_url.clone()
            });

        let storage_dir = lookup("PORTAL_STORAGE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.storage_dir);

        let request_timeout = match lookup("PORTAL_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %raw, "invalid PORTAL_HTTP_TIMEOUT_SECS; using default");
                    defaults.request_timeout
                }
            },
            None => defaults.request_timeout,
        };

        let login_path = route_path(lookup("PORTAL_LOGIN_PATH"), "PORTAL_LOGIN_PATH", defaults.login_path);
        let unauthorized_path = route_path(
            lookup("PORTAL_UNAUTHORIZED_PATH"),
            "PORTAL_UNAUTHORIZED_PATH",
            defaults.unauthorized_path,
        );

        Self {
            api_url,
            storage_dir,
            request_timeout,
            login_path,
            unauthorized_path,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }
}

fn route_path(value: Option<String>, key: &str, default: String) -> String {
    match value {
        Some(path) if path.starts_with('/') => path,
        Some(path) => {
            tracing::warn!(key, value = %path, "route paths must start with '/'; using default");
            default
        }
        None => default,
    }
}

/// `<platform data dir>/vendor-portal`, when the platform has one.
pub fn default_storage_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("vendor-portal"))
}
