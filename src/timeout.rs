use std::time::Duration;

use reqwest::{header::HeaderMap, StatusCode};

use crate::error::{Outcome, CORRELATION_HEADERS};

/// A complete response read within the attempt deadline.
#[derive(Debug)]
pub(crate) struct AttemptResponse {
    pub status: StatusCode,
    pub correlation_id: Option<String>,
    /// Raw body bytes; decoding is left to the caller.
    pub body: Vec<u8>,
}

/// Sends one request and reads its body, bounded by `deadline`.
///
/// When the deadline elapses the in-flight future is dropped, which aborts
/// the connection, and the outcome is always [`Outcome::TimedOut`].
pub(crate) async fn send_with_deadline(
    http: &reqwest::Client,
    request: reqwest::Request,
    deadline: Duration,
) -> Result<AttemptResponse, Outcome> {
    let attempt = async {
        let response = http.execute(request).await?;
        let status = response.status();
        let correlation_id = correlation_id(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok::<_, reqwest::Error>(AttemptResponse {
            status,
            correlation_id,
            body,
        })
    };

    match tokio::time::timeout(deadline, attempt).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(Outcome::Transport(err)),
        Err(_elapsed) => Err(Outcome::TimedOut),
    }
}

pub(crate) fn correlation_id(headers: &HeaderMap) -> Option<String> {
    CORRELATION_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    })
}
