//! Optional user callbacks invoked at fixed points of a call.
//!
//! Hooks never influence whether an attempt is retried.

use std::{fmt, sync::Arc};

use crate::{request::AssembledRequest, ClassifiedError};

/// Rewrites the assembled request before every attempt, retries included.
pub type RequestHook = Arc<dyn Fn(AssembledRequest) -> AssembledRequest + Send + Sync>;
/// Rewrites the validated body once per successful call.
pub type ResponseHook = Arc<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>;
/// Observes each terminal failure exactly once.
pub type ErrorObserver = Arc<dyn Fn(&ClassifiedError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Interceptors {
    pub on_request: Option<RequestHook>,
    pub on_response: Option<ResponseHook>,
    pub on_error: Option<ErrorObserver>,
}

impl Interceptors {
    pub(crate) fn request(&self, request: AssembledRequest) -> AssembledRequest {
        match &self.on_request {
            Some(hook) => hook(request),
            None => request,
        }
    }

    pub(crate) fn response(&self, value: serde_json::Value) -> serde_json::Value {
        match &self.on_response {
            Some(hook) => hook(value),
            None => value,
        }
    }

    pub(crate) fn error(&self, error: &ClassifiedError) {
        if let Some(observer) = &self.on_error {
            observer(error);
        }
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use reqwest::Method;
    use serde_json::json;

    use super::Interceptors;
    use crate::{ClassifiedError, ErrorKind};

    #[test]
    fn missing_hooks_pass_values_through() {
        let hooks = Interceptors::default();
        assert_eq!(hooks.response(json!({"a": 1})), json!({"a": 1}));
        hooks.error(&ClassifiedError::new(ErrorKind::Network, "/", &Method::GET));
    }

    #[test]
    fn configured_hooks_are_invoked() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let hooks = Interceptors {
            on_response: Some(Arc::new(|value| json!({ "wrapped": value }))),
            on_error: Some(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..Interceptors::default()
        };

        assert_eq!(hooks.response(json!(1)), json!({"wrapped": 1}));
        hooks.error(&ClassifiedError::new(ErrorKind::Timeout, "/", &Method::GET));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(format!("{hooks:?}").contains("on_request: false"));
    }
}
