//! Single-attempt HTTP transport.
//!
//! A [`Transport`] performs exactly one network round trip. It never retries,
//! sleeps, or interprets status codes; the [`Client`](crate::Client) and the
//! [`RetryPolicy`](crate::retry::RetryPolicy) own those decisions.
//!
//! Failures are reported as a [`TransportError`] whose [`TransportErrorKind`]
//! tells the retry policy whether another attempt makes sense.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// A fully resolved HTTP request, ready to go on the wire.
///
/// The client builds one of these per logical call and hands a clone of it to
/// the transport on every attempt, so retries always resend the same bytes.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Headers, including `Authorization`.
    pub headers: HeaderMap,
    /// Serialized JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Category of a low-level transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The remote host refused the connection.
    ConnectRefused,
    /// The connection was reset, aborted, or the pipe broke mid-request.
    ConnectionReset,
    /// Any other network or I/O failure, including DNS lookups and timeouts.
    Io,
    /// A failure that is not a network condition, such as a request the HTTP
    /// stack refuses to build. Never retried.
    Other,
}

impl TransportErrorKind {
    /// Maps an I/O error kind onto a transport category.
    pub fn from_io_kind(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionRefused => Self::ConnectRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionReset,
            _ => Self::Io,
        }
    }

    /// Returns `true` for the categories worth another attempt.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectRefused => "connection refused",
            Self::ConnectionReset => "connection reset",
            Self::Io => "I/O error",
            Self::Other => "transport error",
        };
        f.write_str(name)
    }
}

/// A categorized failure from a single transport attempt.
///
/// The wrapped `reqwest` or `io` error is kept as the
/// [`source`](StdError::source), so callers can downcast to it.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TransportError {
    /// Wraps an error under the given category.
    pub fn new(
        kind: TransportErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Returns `true` if the failure category is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::new(TransportErrorKind::from_io_kind(err.kind()), err)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = classify_reqwest_error(&err);
        Self::new(kind, err)
    }
}

/// Walks the source chain looking for the `io::Error` hyper wraps.
fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_builder() {
        return TransportErrorKind::Other;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return TransportErrorKind::from_io_kind(io_err.kind());
        }
        source = inner.source();
    }

    TransportErrorKind::Io
}

/// Performs one HTTP round trip.
///
/// Implement this to put the client on a different HTTP stack, or to observe
/// and script requests in tests.
///
/// # Example
///
/// ```
/// use authsignal::transport::{HttpRequest, HttpResponse, Transport, TransportError};
/// use http::{HeaderMap, StatusCode};
///
/// struct AlwaysOk;
///
/// impl Transport for AlwaysOk {
///     async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
///         Ok(HttpResponse::new(StatusCode::OK, HeaderMap::new(), b"{}".to_vec()))
///     }
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Sends the request and buffers the full response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no HTTP response was received.
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Production transport backed by `reqwest`.
///
/// Redirects are not followed: a 3xx is handed back to the client, which
/// treats it as a failed call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Builds a transport with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the underlying HTTP client cannot be
    /// initialized (for example, the TLS backend fails to load).
    pub fn new(timeout: Option<Duration>) -> crate::Result<Self> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                crate::Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { inner, timeout })
    }

    /// Wraps an existing `reqwest` client, keeping its configuration as is.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            inner: client,
            timeout: None,
        }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.inner.request(request.method, request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds_map_to_categories() {
        assert_eq!(
            TransportErrorKind::from_io_kind(io::ErrorKind::ConnectionRefused),
            TransportErrorKind::ConnectRefused
        );
        assert_eq!(
            TransportErrorKind::from_io_kind(io::ErrorKind::BrokenPipe),
            TransportErrorKind::ConnectionReset
        );
        assert_eq!(
            TransportErrorKind::from_io_kind(io::ErrorKind::ConnectionReset),
            TransportErrorKind::ConnectionReset
        );
        assert_eq!(
            TransportErrorKind::from_io_kind(io::ErrorKind::TimedOut),
            TransportErrorKind::Io
        );
    }

    #[test]
    fn test_only_other_is_not_retryable() {
        assert!(TransportErrorKind::ConnectRefused.is_retryable());
        assert!(TransportErrorKind::ConnectionReset.is_retryable());
        assert!(TransportErrorKind::Io.is_retryable());
        assert!(!TransportErrorKind::Other.is_retryable());
    }

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "nope"));
        assert_eq!(err.kind(), TransportErrorKind::ConnectRefused);
        assert!(err.to_string().starts_with("connection refused"));

        let source = err.source().expect("source is kept");
        assert!(source.downcast_ref::<io::Error>().is_some());
    }
}
