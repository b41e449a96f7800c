use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{shape::Shape, ClassifiedError, ErrorKind, Violation};

/// A 2xx body that did not match what the caller expected.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("response from {endpoint} failed validation ({} violation(s))", .violations.len())]
pub struct ValidationFailure {
    pub endpoint: String,
    pub violations: Vec<Violation>,
}

pub type ValidatedResult<T> = std::result::Result<T, ValidationFailure>;

impl ValidationFailure {
    fn single(endpoint: &str, path: &str, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            violations: vec![Violation::new(path, reason)],
        }
    }

    pub(crate) fn into_classified(self, method: &reqwest::Method) -> ClassifiedError {
        let message = self
            .violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut error = ClassifiedError::new(ErrorKind::Validation, &self.endpoint, method)
            .with_message(message);
        error.violations = self.violations;
        error
    }
}

/// Parses a successful body and checks it against `shape`.
///
/// An empty body parses as `null`. A body that is not JSON at all fails
/// even when checking is disabled.
pub fn validate_body(
    endpoint: &str,
    body: &[u8],
    shape: Option<&Shape>,
    enabled: bool,
) -> ValidatedResult<Value> {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|err| {
            ValidationFailure::single(endpoint, "$", format!("malformed JSON body: {err}"))
        })?
    };

    let Some(shape) = shape.filter(|_| enabled) else {
        return Ok(value);
    };

    let violations = shape.check(&value);
    if violations.is_empty() {
        Ok(value)
    } else {
        Err(ValidationFailure {
            endpoint: endpoint.to_owned(),
            violations,
        })
    }
}

/// Converts a checked body into the caller's type.
pub fn coerce<T: DeserializeOwned>(endpoint: &str, value: Value) -> ValidatedResult<T> {
    serde_json::from_value(value)
        .map_err(|err| ValidationFailure::single(endpoint, "$", format!("cannot decode: {err}")))
}
