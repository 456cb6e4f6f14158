//! Error types for Authsignal API calls.
//!
//! Every failure a caller can observe is a variant of [`Error`], so handling
//! is a `match` rather than a chain of downcasts. Retryable conditions never
//! reach the caller until the retry budget is spent.

use std::fmt;

use http::StatusCode;
use serde::Deserialize;

use crate::transport::TransportError;
use crate::webhook::WebhookError;

/// The main error type for Authsignal API calls.
///
/// # Examples
///
/// ```no_run
/// use authsignal::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::new("my-api-secret")?;
///
/// match client.get::<serde_json::Value>("/users/123").await {
///     Ok(response) => println!("User: {:?}", response.data),
///     Err(Error::Api(api_error)) => {
///         eprintln!("Authsignal rejected the call: {}", api_error);
///         eprintln!("Error code: {}", api_error.error_code);
///     }
///     Err(Error::Transport(e)) => eprintln!("Network failure ({:?}): {}", e.kind(), e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No HTTP response was received.
    ///
    /// When the failure was retryable, this is the error from the final
    /// attempt, surfaced unwrapped once the retry budget ran out.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered with a status outside `200..=299`.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The API answered with a non-2xx status whose body is not the
    /// `{ "error", "errorDescription" }` shape.
    #[error("Malformed error response (status {status}): {serde_error}")]
    MalformedErrorResponse {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The serde error message
        serde_error: String,
    },

    /// Failed to deserialize a successful response body into the expected type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration was provided, such as a missing secret or an
    /// invalid header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The base URL, or the base URL joined with a request path, is not a
    /// valid URL. Raised before any network attempt.
    #[error("Invalid URL `{url}`: {source}")]
    InvalidUrl {
        /// The URL that failed to parse
        url: String,
        /// The parse failure
        #[source]
        source: url::ParseError,
    },

    /// Webhook verification failed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),
}

impl Error {
    /// Returns `true` if this error is potentially retryable.
    ///
    /// Retryable transport failures and 5xx API errors qualify. Whether a 5xx
    /// is actually retried also depends on the request method; see
    /// [`RetryPolicy`](crate::retry::RetryPolicy).
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::Api(e) => e.status.is_server_error(),
            Error::MalformedErrorResponse { status, .. } => status.is_server_error(),
            Error::DeserializationFailed { .. }
            | Error::SerializationFailed(_)
            | Error::ConfigurationError(_)
            | Error::InvalidUrl { .. }
            | Error::Webhook(_) => false,
        }
    }

    /// Returns `true` for errors caused by client configuration rather than
    /// by the remote service.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationError(_) | Error::InvalidUrl { .. }
        )
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(e) => Some(e.status),
            Error::MalformedErrorResponse { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::MalformedErrorResponse { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the structured API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }
}

/// A structured error returned by the Authsignal API.
///
/// Displays as `"<status> - <description>"`, falling back to the error code
/// when the description is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Short machine-readable code, e.g. `unauthorized`.
    pub error_code: String,
    /// Human-readable description. May be empty.
    pub error_description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl ApiError {
    /// Parses an error body of the form `{ "error": .., "errorDescription": .. }`.
    ///
    /// A missing or `null` description becomes an empty string; a missing
    /// `error` field is a parse failure.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body does not have the expected shape.
    pub fn from_body(
        status: StatusCode,
        body: &str,
    ) -> std::result::Result<Self, serde_json::Error> {
        let parsed: ErrorBody = serde_json::from_str(body)?;
        Ok(Self {
            status,
            error_code: parsed.error,
            error_description: parsed.error_description.unwrap_or_default(),
        })
    }

    /// Returns the description, or the error code when there is none.
    pub fn message(&self) -> &str {
        if self.error_description.is_empty() {
            &self.error_code
        } else {
            &self.error_description
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.status.as_u16(), self.message())
    }
}

impl std::error::Error for ApiError {}

/// A specialized `Result` type for Authsignal API calls.
pub type Result<T> = std::result::Result<T, Error>;
