//! # Authsignal - server-side SDK core
//!
//! A typed, retry-aware client for the Authsignal API built on top of
//! `reqwest`, plus verification of signed Authsignal webhooks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use authsignal::Client;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct User {
//!     user_id: String,
//!     email: Option<String>,
//!     is_enrolled: bool,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), authsignal::Error> {
//!     let client = Client::builder()
//!         .secret("my-api-secret")
//!         .build()?;
//!
//!     let user = client.get::<User>("/users/123").await?;
//!     println!("{} enrolled: {}", user.data.user_id, user.data.is_enrolled);
//!
//!     // Drop the user entirely; the response body is not needed.
//!     let descriptor = authsignal::RequestDescriptor::delete("/users/123");
//!     client.execute(&descriptor).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Every call is retried up to [`retries`](ClientBuilder::retries) times
//! (default 2) when:
//!
//! - the connection was refused, reset, or failed with another I/O error,
//!   whatever the method;
//! - the response was a 5xx and the method is `GET`, `HEAD` or `OPTIONS`.
//!
//! Writes are never retried on a 5xx, since the first attempt may already
//! have taken effect. The Nth retry waits `100ms * 2^N`.
//!
//! ```no_run
//! use authsignal::Client;
//!
//! # fn example() -> Result<(), authsignal::Error> {
//! let client = Client::builder()
//!     .secret("my-api-secret")
//!     .retries(3)
//!     .on_retry(|retry, error| {
//!         tracing::warn!(retry, error = ?error, "retrying Authsignal call");
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Webhooks
//!
//! ```no_run
//! use authsignal::Client;
//!
//! # fn example(body: &str, signature_header: &str) -> Result<(), authsignal::Error> {
//! let client = Client::new("my-api-secret")?;
//!
//! let event = client.webhook().construct_event(body, signature_header)?;
//! println!("Received {} for tenant {}", event.event_type, event.tenant_id);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod request;
mod response;
pub mod retry;
pub mod transport;
pub mod webhook;

pub use client::{Client, ClientBuilder, BASE_URL_ENV_VAR, DEFAULT_BASE_URL, SECRET_ENV_VAR};
pub use error::{ApiError, Error, Result};
pub use request::RequestDescriptor;
pub use response::Response;
pub use retry::{RetryObserver, RetryPolicy};
pub use transport::{Transport, TransportError, TransportErrorKind};
pub use webhook::{Webhook, WebhookError, WebhookEvent};
