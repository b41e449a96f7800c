//! `resilient-http` turns "call this endpoint" into a reliably delivered,
//! schema-checked JSON result.
//!
//! Every call made through [`ApiClient`] is retried on network failures,
//! timeouts, 429 and 5xx responses with capped exponential backoff, bounded
//! by a per-attempt deadline, and its body is checked against an optional
//! [`Shape`] before it is returned. Failures surface as a single
//! [`ClassifiedError`].
//!
//! ```no_run
//! use resilient_http::{ApiClient, Call, ClientConfig, Field, Shape};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(
//!     ClientConfig::new("https://api.example.com/v1")
//!         .with_credential("token")
//!         .with_max_retries(2),
//! )?;
//!
//! let listing = client
//!     .execute(
//!         Call::get("/listings/42")
//!             .query("currency", "EUR")
//!             .expect(Shape::object([Field::required("id", Shape::Integer)])),
//!     )
//!     .await?;
//! println!("{listing}");
//! # Ok(())
//! # }
//! ```

mod backoff;
mod client;
mod engine;
mod error;
mod hooks;
mod options;
mod request;
mod shape;
mod timeout;
mod validate;

pub use backoff::BackoffPolicy;
pub use client::ApiClient;
pub use error::{classify, ClassifiedError, ErrorKind, Outcome, Violation};
pub use hooks::{ErrorObserver, Interceptors, RequestHook, ResponseHook};
pub use options::{ClientConfig, ConfigError};
pub use request::{build_headers, build_url, AssembledRequest, Call, FilePart, RequestBody};
pub use shape::{Field, Shape};
pub use validate::{coerce, validate_body, ValidatedResult, ValidationFailure};

/// HTTP method type used by [`Call`].
pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, ClassifiedError>;
