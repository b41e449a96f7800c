use std::fmt;

use reqwest::StatusCode;

const MAX_MESSAGE_CHARS: usize = 512;

/// Response headers that may carry a server-side correlation identifier,
/// checked in order.
pub(crate) const CORRELATION_HEADERS: [&str; 3] =
    ["x-request-id", "x-correlation-id", "request-id"];

/// Failure category assigned to every unsuccessful call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received (connect, DNS, reset, body read).
    Network,
    /// The attempt deadline elapsed or the caller cancelled the call.
    Timeout,
    /// A 4xx response other than 429.
    ClientError,
    /// A 5xx response.
    ServerError,
    /// A 429 response.
    RateLimited,
    /// A 2xx response whose body did not match the expected shape.
    Validation,
}

impl ErrorKind {
    /// Whether another attempt is permitted for this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::RateLimited => "rate_limited",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field-level mismatch between a response body and its expected shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending value, e.g. `$.items[2].id`.
    pub path: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Terminal error returned by every call on [`crate::ApiClient`].
#[derive(Debug, thiserror::Error)]
#[error(
    "{kind} error for {method} {endpoint}{}: {}",
    .status.map(|s| format!(" (status {s})")).unwrap_or_default(),
    .message.as_deref().unwrap_or("no message")
)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// Path the call was issued against.
    pub endpoint: String,
    pub method: reqwest::Method,
    pub status: Option<u16>,
    /// Message supplied by the server or describing the local failure.
    pub message: Option<String>,
    pub correlation_id: Option<String>,
    /// Field violations; only populated for [`ErrorKind::Validation`].
    pub violations: Vec<Violation>,
    /// Number of attempts made before this error was raised.
    pub attempts: u32,
    #[source]
    pub source: Option<reqwest::Error>,
    cancelled: bool,
}

impl ClassifiedError {
    pub(crate) fn new(kind: ErrorKind, endpoint: &str, method: &reqwest::Method) -> Self {
        Self {
            kind,
            endpoint: endpoint.to_owned(),
            method: method.clone(),
            status: None,
            message: None,
            correlation_id: None,
            violations: Vec::new(),
            attempts: 0,
            source: None,
            cancelled: false,
        }
    }

    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn with_correlation_id(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Builds the error raised when the caller cancels a call.
    pub(crate) fn cancelled(endpoint: &str, method: &reqwest::Method) -> Self {
        let mut error =
            Self::new(ErrorKind::Timeout, endpoint, method).with_message("cancelled by caller");
        error.cancelled = true;
        error
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Whether the caller cancelled the call, as opposed to a deadline
    /// elapsing.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Raw result of a single failed attempt, before classification.
#[derive(Debug)]
pub enum Outcome {
    /// The attempt deadline elapsed.
    TimedOut,
    /// The transport failed before a complete response arrived.
    Transport(reqwest::Error),
    /// The server answered with a non-2xx status.
    Status {
        status: StatusCode,
        correlation_id: Option<String>,
        body: String,
    },
}

/// Maps a failed attempt to exactly one [`ErrorKind`].
///
/// Status responses are classified from the status code alone; the body is
/// only mined for a message and may be empty or malformed.
pub fn classify(endpoint: &str, method: &reqwest::Method, outcome: Outcome) -> ClassifiedError {
    match outcome {
        Outcome::TimedOut => ClassifiedError::new(ErrorKind::Timeout, endpoint, method)
            .with_message("attempt deadline elapsed"),
        Outcome::Transport(err) => {
            let kind = if err.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Network
            };
            let mut classified =
                ClassifiedError::new(kind, endpoint, method).with_message(err.to_string());
            classified.status = err.status().map(|status| status.as_u16());
            classified.source = Some(err);
            classified
        }
        Outcome::Status {
            status,
            correlation_id,
            body,
        } => {
            let kind = match status {
                StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimited,
                status if status.is_server_error() => ErrorKind::ServerError,
                _ => ErrorKind::ClientError,
            };
            let mut classified = ClassifiedError::new(kind, endpoint, method)
                .with_correlation_id(correlation_id);
            classified.status = Some(status.as_u16());
            classified.message = extract_message(&body);
            classified
        }
    }
}

/// Pulls a human-readable message out of an error body.
pub(crate) fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let from_json = ["message", "error", "detail"]
            .iter()
            .find_map(|key| match map.get(*key)? {
                serde_json::Value::String(text) => Some(text.clone()),
                serde_json::Value::Object(inner) => inner
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
                _ => None,
            });
        if from_json.is_some() {
            return from_json;
        }
    }

    Some(trimmed.chars().take(MAX_MESSAGE_CHARS).collect())
}
