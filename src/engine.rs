use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use crate::{
    error::{classify, Outcome},
    request::assemble,
    timeout::send_with_deadline,
    validate::validate_body,
    ApiClient, Call, ClassifiedError, ErrorKind, Result,
};

/// Per-call retry bookkeeping. Never shared between calls.
///
/// The counter is atomic only so a cancellation branch running beside the
/// call can read how many attempts were started.
#[derive(Debug, Default)]
pub(crate) struct AttemptState {
    started: AtomicU32,
}

impl AttemptState {
    /// Marks a new attempt as started and returns its 0-based index.
    fn begin(&self) -> u32 {
        self.started.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.started.load(Ordering::Relaxed)
    }
}

/// A successful call plus the metadata later failures must carry.
#[derive(Debug)]
pub(crate) struct Delivered {
    pub value: Value,
    pub correlation_id: Option<String>,
    pub attempts: u32,
}

impl ApiClient {
    /// Runs `call` until it succeeds, fails terminally or exhausts retries.
    pub(crate) async fn run(&self, call: &Call, state: &AttemptState) -> Result<Delivered> {
        let config = &self.inner.config;

        let error = loop {
            let attempt = state.begin();
            let error = match self.attempt(call).await {
                Ok((value, correlation_id)) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        method = %call.method,
                        endpoint = %call.path,
                        attempts = attempt + 1,
                        "call succeeded"
                    );
                    return Ok(Delivered {
                        value: config.hooks.response(value),
                        correlation_id,
                        attempts: attempt + 1,
                    });
                }
                Err(error) => error.with_attempts(attempt + 1),
            };

            if !error.is_retryable() || attempt >= config.max_retries {
                break error;
            }

            let delay = self.inner.backoff.delay(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                method = %call.method,
                endpoint = %call.path,
                attempt,
                kind = %error.kind,
                status = ?error.status,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );

            tokio::time::sleep(delay).await;
        };

        Err(self.fail(error))
    }

    /// One pass through assemble, send and validate. Yields the body and
    /// the response's correlation id.
    async fn attempt(&self, call: &Call) -> Result<(Value, Option<String>)> {
        let inner = &self.inner;

        let request = assemble(
            &inner.base_url,
            call,
            &inner.static_headers,
            inner.credential.as_ref(),
        )
        .map_err(|reason| {
            ClassifiedError::new(ErrorKind::ClientError, &call.path, &call.method)
                .with_message(reason)
        })?;
        let request = inner.config.hooks.request(request);
        let request = request.into_request(&self.http).map_err(|err| {
            let mut error = ClassifiedError::new(ErrorKind::ClientError, &call.path, &call.method)
                .with_message(format!("cannot build request: {err}"));
            error.source = Some(err);
            error
        })?;

        let response = send_with_deadline(&self.http, request, inner.timeout)
            .await
            .map_err(|outcome| classify(&call.path, &call.method, outcome))?;

        if !response.status.is_success() {
            return Err(classify(
                &call.path,
                &call.method,
                Outcome::Status {
                    status: response.status,
                    correlation_id: response.correlation_id,
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                },
            ));
        }

        match validate_body(
            &call.path,
            &response.body,
            call.shape.as_ref(),
            inner.config.validate_responses,
        ) {
            Ok(value) => Ok((value, response.correlation_id)),
            Err(failure) => Err(failure
                .into_classified(&call.method)
                .with_correlation_id(response.correlation_id)),
        }
    }

    /// Reports a terminal failure to the error observer and hands it back.
    pub(crate) fn fail(&self, error: ClassifiedError) -> ClassifiedError {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            method = %error.method,
            endpoint = %error.endpoint,
            kind = %error.kind,
            status = ?error.status,
            attempts = error.attempts,
            correlation_id = ?error.correlation_id,
            "request failed"
        );

        self.inner.config.hooks.error(&error);
        error
    }
}
