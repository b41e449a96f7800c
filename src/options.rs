use std::{fmt, sync::Arc};

use crate::{
    hooks::{ErrorObserver, Interceptors},
    BackoffPolicy, ClassifiedError,
};

/// Error raised while constructing an [`crate::ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The base address is not an absolute `http`/`https` URL.
    #[error("invalid base address '{address}': {reason}")]
    BaseAddress { address: String, reason: String },
    /// An extra header or credential could not be encoded as an HTTP header.
    #[error("invalid header '{name}': {reason}")]
    Header { name: String, reason: String },
    /// A required environment variable is missing or malformed.
    #[error("environment: {0}")]
    Env(String),
    /// The underlying HTTP client could not be built.
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Immutable per-client settings shared by every call.
#[derive(Clone)]
pub struct ClientConfig {
    /// Absolute base URL every call path is appended to.
    pub base_address: String,
    /// Token sent as `Authorization: Bearer <token>`.
    pub credential: Option<String>,
    /// Deadline for a single attempt in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
    /// Ceiling for a single backoff wait in milliseconds.
    pub max_backoff_ms: u64,
    /// Whether 2xx bodies are checked against the call's expected shape.
    pub validate_responses: bool,
    /// Static headers; these win over the client defaults.
    pub extra_headers: Vec<(String, String)>,
    pub hooks: Interceptors,
}

impl ClientConfig {
    pub fn new(base_address: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            credential: None,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 250,
            max_backoff_ms: 10_000,
            validate_responses: true,
            extra_headers: Vec::new(),
            hooks: Interceptors::default(),
        }
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the exponential backoff base and ceiling.
    pub fn with_backoff_ms(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.retry_backoff_ms = base_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(crate::AssembledRequest) -> crate::AssembledRequest + Send + Sync + 'static,
    {
        self.hooks.on_request = Some(Arc::new(hook));
        self
    }

    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.hooks.on_response = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, observer: F) -> Self
    where
        F: Fn(&ClassifiedError) + Send + Sync + 'static,
    {
        let observer: ErrorObserver = Arc::new(observer);
        self.hooks.on_error = Some(observer);
        self
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::from_millis(self.retry_backoff_ms, self.max_backoff_ms)
    }

    /// Reads configuration from the environment.
    ///
    /// - `API_BASE_URL` (required)
    /// - `API_TOKEN`
    /// - `API_TIMEOUT_MS`
    /// - `API_MAX_RETRIES`
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = std::env::var("API_BASE_URL")
            .map_err(|_| ConfigError::Env("missing API_BASE_URL environment variable".to_owned()))?;
        if base.trim().is_empty() {
            return Err(ConfigError::Env("API_BASE_URL is set but empty".to_owned()));
        }

        let mut config = Self::new(base.trim());
        if let Ok(token) = std::env::var("API_TOKEN") {
            if !token.trim().is_empty() {
                config.credential = Some(token);
            }
        }
        if let Some(timeout_ms) = parse_env("API_TIMEOUT_MS")? {
            config.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = parse_env("API_MAX_RETRIES")? {
            config.max_retries = max_retries;
        }
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env(format!("{name} is not a valid number: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_address", &self.base_address)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_backoff_ms", &self.max_backoff_ms)
            .field("validate_responses", &self.validate_responses)
            .field("extra_headers", &self.extra_headers)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("https://api.example.com");
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_retries, 3);
        assert!(config.validate_responses);
        assert!(config.extra_headers.is_empty());
        assert!(config.credential.is_none());
        assert!(config.hooks.on_request.is_none());
    }

    #[test]
    fn debug_redacts_credential() {
        let config = ClientConfig::new("https://api.example.com").with_credential("secret-token");
        let debug = format!("{config:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }
}
