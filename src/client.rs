//! Authsignal API client with retry logic and rich error handling.
//!
//! The [`Client`] type is the single entry point endpoint methods go through.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    request::RequestDescriptor,
    retry::{Outcome, RetryDecision, RetryObserver, RetryPolicy, RetryState, DEFAULT_RETRIES},
    transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError},
    webhook::Webhook,
    ApiError, Error, Response, Result,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.authsignal.com/v1";

/// Environment variable holding the API secret.
pub const SECRET_ENV_VAR: &str = "AUTHSIGNAL_SECRET";

/// Environment variable holding an alternative (e.g. regional) base URL.
pub const BASE_URL_ENV_VAR: &str = "AUTHSIGNAL_URL";

const VERSION_HEADER: &str = "x-authsignal-version";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An Authsignal API client.
///
/// The client is immutable once built and cheap to clone; clones share the
/// same configuration and connection pool. Concurrent calls need no
/// synchronization: each call keeps its retry state on its own stack.
///
/// # Examples
///
/// ```no_run
/// use authsignal::Client;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "camelCase")]
/// struct TrackAttributes {
///     redirect_url: String,
/// }
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct TrackResponse {
///     state: String,
///     url: Option<String>,
/// }
///
/// # async fn example() -> Result<(), authsignal::Error> {
/// let client = Client::builder()
///     .secret("my-api-secret")
///     .retries(3)
///     .build()?;
///
/// let attributes = TrackAttributes {
///     redirect_url: "https://example.com/callback".to_string(),
/// };
/// let tracked = client
///     .post::<_, TrackResponse>("/users/123/actions/signIn", &attributes)
///     .await?;
/// println!("Action state: {}", tracked.data.state);
/// # Ok(())
/// # }
/// ```
pub struct Client<T = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T> {
    transport: T,
    base_url: String,
    authorization: HeaderValue,
    default_headers: HeaderMap,
    retries: u32,
    retry_policy: RetryPolicy,
    on_retry: Option<RetryObserver>,
    webhook: Webhook,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client for the production endpoint with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty or the HTTP client cannot be
    /// initialized.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().secret(secret).build()
    }
}

impl<T: Transport> Client<T> {
    /// Returns a webhook verifier bound to this client's API secret.
    pub fn webhook(&self) -> &Webhook {
        &self.inner.webhook
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Returns the number of retries allowed per call.
    pub fn retries(&self) -> u32 {
        self.inner.retries
    }

    /// Executes a request and returns the raw successful response.
    ///
    /// This is the retry loop every other method goes through. The response
    /// body is left undecoded, which suits endpoints whose body is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the base URL and path do not form a valid
    ///   URL; no network attempt is made
    /// - [`Error::Transport`] with the last attempt's error once retries
    ///   are exhausted, or immediately for non-retryable failures
    /// - [`Error::Api`] for a final status outside `200..=299`
    /// - [`Error::MalformedErrorResponse`] if that status came with a body
    ///   that is not an Authsignal error
    pub async fn execute(&self, descriptor: &RequestDescriptor) -> Result<Response<()>> {
        let request = self.prepare(descriptor)?;
        let start_time = Instant::now();
        let mut state = RetryState::new(self.inner.retries);
        let policy = &self.inner.retry_policy;

        loop {
            let attempt = state.attempts_made() + 1;

            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let result = self.inner.transport.send(request.clone()).await;

            let outcome = match &result {
                Ok(response) => Outcome::Response(response),
                Err(e) => Outcome::Failed(e),
            };

            match policy.decide(&request.method, outcome, &state) {
                RetryDecision::Retry { delay } => {
                    let retry = state.record_retry();

                    match &result {
                        Ok(response) => tracing::warn!(
                            status = response.status.as_u16(),
                            attempt = attempt,
                            method = %request.method,
                            path = %descriptor.path,
                            "Request failed with server error"
                        ),
                        Err(e) => tracing::warn!(
                            error = %e,
                            attempt = attempt,
                            method = %request.method,
                            path = %descriptor.path,
                            "Request failed"
                        ),
                    }

                    if let Some(on_retry) = &self.inner.on_retry {
                        on_retry(retry, result.as_ref().err());
                    }

                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        retry = retry,
                        "Retrying request after delay"
                    );

                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Stop => {
                    let response = match result {
                        Ok(response) => response,
                        Err(e) => return Err(self.transport_failure(e, descriptor, attempt)),
                    };
                    return self.finish(response, start_time.elapsed(), attempt);
                }
            }
        }
    }

    /// Executes a request and deserializes the successful response body.
    ///
    /// # Errors
    ///
    /// Everything [`execute`](Self::execute) returns, plus
    /// [`Error::DeserializationFailed`] if the body does not match `Res`.
    pub async fn call<Res>(&self, descriptor: &RequestDescriptor) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let response = self.execute(descriptor).await?;

        match serde_json::from_str::<Res>(&response.raw_body) {
            Ok(data) => Ok(response.map(|()| data)),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    raw_response = %response.raw_body,
                    "Failed to deserialize response"
                );

                Err(Error::DeserializationFailed {
                    raw_response: response.raw_body,
                    serde_error: e.to_string(),
                    status: response.status,
                })
            }
        }
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call(&RequestDescriptor::get(path)).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let descriptor = RequestDescriptor::post(path).with_json_body(body)?;
        self.call(&descriptor).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let descriptor = RequestDescriptor::patch(path).with_json_body(body)?;
        self.call(&descriptor).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call(&RequestDescriptor::delete(path)).await
    }

    /// Resolves the descriptor into the request sent on every attempt.
    fn prepare(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest> {
        let url = descriptor.resolve_url(&self.inner.base_url)?;
        let mut request = HttpRequest::new(descriptor.method.clone(), url);

        request.headers = self.inner.default_headers.clone();
        for (name, value) in &descriptor.headers {
            request.headers.insert(name, value.clone());
        }
        // Caller headers never replace the secret's credentials.
        request
            .headers
            .insert(AUTHORIZATION, self.inner.authorization.clone());

        if let Some(body) = &descriptor.body {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            request.body = Some(body.clone());
        }

        Ok(request)
    }

    fn transport_failure(
        &self,
        error: TransportError,
        descriptor: &RequestDescriptor,
        attempts: u32,
    ) -> Error {
        tracing::error!(
            error = %error,
            kind = ?error.kind(),
            attempts = attempts,
            method = %descriptor.method,
            path = %descriptor.path,
            "Request failed, giving up"
        );
        Error::Transport(error)
    }

    /// Turns the final response into a `Response` or an API error.
    fn finish(
        &self,
        response: HttpResponse,
        latency: Duration,
        attempts: u32,
    ) -> Result<Response<()>> {
        let status = response.status;
        let raw_body = response.body_text();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempts,
            "Received HTTP response"
        );

        if status.is_success() {
            return Ok(Response::new(
                (),
                raw_body,
                status,
                response.headers,
                latency,
                attempts,
            ));
        }

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), response = %raw_body, "Server error (5xx)");
        } else {
            tracing::error!(status = status.as_u16(), response = %raw_body, "Request rejected");
        }

        match ApiError::from_body(status, &raw_body) {
            Ok(api_error) => Err(Error::Api(api_error)),
            Err(e) => Err(Error::MalformedErrorResponse {
                status,
                raw_response: raw_body,
                serde_error: e.to_string(),
            }),
        }
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use authsignal::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), authsignal::Error> {
/// let client = ClientBuilder::new()
///     .secret("my-api-secret")
///     .base_url("https://au.api.authsignal.com/v1")
///     .retries(3)
///     .timeout(Duration::from_secs(10))
///     .on_retry(|retry, error| eprintln!("retry #{retry}: {error:?}"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    secret: Option<String>,
    base_url: String,
    retries: u32,
    retry_policy: RetryPolicy,
    on_retry: Option<RetryObserver>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            secret: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            retries: DEFAULT_RETRIES,
            retry_policy: RetryPolicy::default(),
            on_retry: None,
            default_headers: HeaderMap::new(),
            timeout: None,
        }
    }

    /// Creates a builder from `AUTHSIGNAL_SECRET` and, if set, `AUTHSIGNAL_URL`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `AUTHSIGNAL_SECRET` is not set.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(SECRET_ENV_VAR)
            .map_err(|_| Error::ConfigurationError(format!("{} is not set", SECRET_ENV_VAR)))?;

        let mut builder = Self::new().secret(secret);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV_VAR) {
            builder = builder.base_url(base_url);
        }

        Ok(builder)
    }

    /// Sets the API secret used for Basic auth and webhook verification.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the base URL every request path is appended to.
    ///
    /// Validated when the client is built.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets how many times a failed call may be retried.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Overrides the backoff policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Registers a callback invoked before every retry.
    ///
    /// The callback receives the 1-indexed retry number and the transport
    /// error behind it, if any.
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, Option<&TransportError>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// `Authorization` cannot be overridden this way; it always carries the
    /// API secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-request timeout of the default transport.
    ///
    /// A timed out attempt counts as a retryable I/O failure.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds a client on the default `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing, the base URL is invalid, or
    /// the HTTP client cannot be initialized.
    pub fn build(self) -> Result<Client> {
        let transport = ReqwestTransport::new(self.timeout)?;
        self.build_with_transport(transport)
    }

    /// Builds a client on a custom [`Transport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or the base URL is invalid.
    /// The transport is never used when building fails.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<Client<T>> {
        let secret = self
            .secret
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| Error::ConfigurationError("API secret is required".to_string()))?;

        let base_url = self.base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|source| Error::InvalidUrl {
            url: base_url.clone(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL `{}` cannot carry a path",
                base_url
            )));
        }

        let authorization = basic_auth_header(&secret)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            HeaderName::from_static(VERSION_HEADER),
            HeaderValue::from_static(SDK_VERSION),
        );
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("authsignal-rust/{}", SDK_VERSION))
                .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?,
        );
        default_headers.extend(self.default_headers);

        tracing::debug!(
            base_url = %base_url,
            retries = self.retries,
            "Built Authsignal client"
        );

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                authorization,
                default_headers,
                retries: self.retries,
                retry_policy: self.retry_policy,
                on_retry: self.on_retry,
                webhook: Webhook::new(secret),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `Basic base64("<secret>:")`, marked sensitive so it stays out of logs.
fn basic_auth_header(secret: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(format!("{}:", secret));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))
        .map_err(|e| Error::ConfigurationError(format!("Invalid API secret: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}
