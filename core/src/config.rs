//! Client configuration.

use std::path::PathBuf;

use serde_json::Value;

/// Environment variable that overrides every other base URL source.
pub const BASE_URL_ENV: &str = "FOLLOW_RIVERS_API_BASE_URL";

/// Key looked up in the platform configuration extras.
pub const BASE_URL_EXTRA_KEY: &str = "apiBaseUrl";

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Configuration for [`crate::FollowRivers`] and its transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL joined with relative request paths (no trailing slash).
    pub base_url: String,
    /// Directory holding the durable session slot.
    pub storage_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            storage_dir: std::env::temp_dir().join("followrivers"),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url`, everything else default.
    pub fn new(base_url: &str) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Resolves the base URL from the environment, then `extras`, then the
    /// built-in default.
    pub fn resolve(extras: Option<&Value>) -> Self {
        let env = std::env::var(BASE_URL_ENV).ok();
        Self::new(&resolve_base_url(env.as_deref(), extras))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }
}

/// Picks the first non-empty source: `env`, then `extras.apiBaseUrl`, then
/// [`DEFAULT_BASE_URL`].
pub fn resolve_base_url(env: Option<&str>, extras: Option<&Value>) -> String {
    let from_extras = extras
        .and_then(|extras| extras.get(BASE_URL_EXTRA_KEY))
        .and_then(Value::as_str);

    [env, from_extras]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .to_string()
}
