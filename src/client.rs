use std::{fmt, future::Future, sync::Arc, time::Duration};

use reqwest::{
    header::{HeaderMap, HeaderValue},
    Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    engine::AttemptState,
    request::{credential_header, parse_base_address, parse_static_headers},
    validate::coerce,
    BackoffPolicy, Call, ClassifiedError, ClientConfig, ConfigError, FilePart, Result,
};

/// Async JSON API client with bounded retries, per-attempt deadlines and
/// response validation.
///
/// Cloning is cheap; clones share the same immutable configuration and
/// connection pool. Calls on one client are independent of each other.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    pub(crate) inner: Arc<Inner>,
}

/// Configuration plus everything derived from it at construction.
pub(crate) struct Inner {
    pub config: ClientConfig,
    pub base_url: Url,
    pub static_headers: HeaderMap,
    pub credential: Option<HeaderValue>,
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client, validating the base address and headers up front.
    pub fn new(config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        let base_url = parse_base_address(&config.base_address)?;
        let static_headers = parse_static_headers(&config.extra_headers)?;
        let credential = config
            .credential
            .as_deref()
            .map(credential_header)
            .transpose()?;
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            inner: Arc::new(Inner {
                timeout: Duration::from_millis(config.timeout_ms),
                backoff: config.backoff(),
                base_url,
                static_headers,
                credential,
                config,
            }),
        })
    }

    /// Creates a client from `API_*` environment variables.
    ///
    /// See [`ClientConfig::from_env`] for the variables read.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Executes a call and returns the validated JSON body.
    pub async fn execute(&self, call: Call) -> Result<Value> {
        let state = AttemptState::default();
        self.run(&call, &state).await.map(|delivered| delivered.value)
    }

    /// Executes a call and decodes the validated body into `T`.
    ///
    /// A body that cannot be decoded is a validation error.
    pub async fn execute_as<T: DeserializeOwned>(&self, call: Call) -> Result<T> {
        let state = AttemptState::default();
        let delivered = self.run(&call, &state).await?;
        coerce(&call.path, delivered.value).map_err(|failure| {
            self.fail(
                failure
                    .into_classified(&call.method)
                    .with_correlation_id(delivered.correlation_id)
                    .with_attempts(delivered.attempts),
            )
        })
    }

    /// Executes a call unless `cancel` resolves first.
    ///
    /// Cancellation wins over an in-flight attempt and over a pending
    /// backoff wait; the call then fails with a timeout error whose
    /// [`ClassifiedError::is_cancelled`] is true.
    pub async fn execute_until<F>(&self, call: Call, cancel: F) -> Result<Value>
    where
        F: Future<Output = ()>,
    {
        let state = AttemptState::default();
        tokio::select! {
            biased;
            _ = cancel => {
                let error = ClassifiedError::cancelled(&call.path, &call.method)
                    .with_attempts(state.attempts());
                Err(self.fail(error))
            }
            result = self.run(&call, &state) => result.map(|delivered| delivered.value),
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.execute(Call::get(path)).await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute_as(Call::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.execute(Call::post(path).json(body)).await
    }

    /// Sends a multipart form; every retry resends the complete form.
    pub async fn upload(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    ) -> Result<Value> {
        self.execute(Call::post(path).multipart(fields, files)).await
    }
}

#[cfg(test)]
mod tests {
    use super::ApiClient;
    use crate::{ClientConfig, ConfigError};

    #[test]
    fn debug_redacts_credential() {
        let client = ApiClient::new(
            ClientConfig::new("https://api.example.com").with_credential("secret-token"),
        )
        .expect("must build");
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn rejects_invalid_base_address() {
        let err = ApiClient::new(ClientConfig::new("api.example.com")).expect_err("must fail");
        assert!(matches!(err, ConfigError::BaseAddress { .. }));
    }

    #[test]
    fn rejects_base_address_with_query() {
        let err = ApiClient::new(ClientConfig::new("https://api.example.com/v1?key=abc"))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::BaseAddress { .. }));
    }

    #[test]
    fn rejects_invalid_extra_header() {
        let err = ApiClient::new(
            ClientConfig::new("https://api.example.com").with_header("x bad", "v"),
        )
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::Header { .. }));
    }
}
