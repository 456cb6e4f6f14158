//! Successful response wrapper.
//!
//! [`Response`] carries the decoded body together with the transaction
//! details an integration usually wants to log: status, latency and how many
//! attempts the call needed.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful (`2xx`) Authsignal API response.
///
/// # Examples
///
/// ```no_run
/// use authsignal::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct User {
///     user_id: String,
///     is_enrolled: bool,
/// }
///
/// # async fn example() -> Result<(), authsignal::Error> {
/// let client = Client::new("my-api-secret")?;
///
/// let response = client.get::<User>("/users/123").await?;
///
/// println!("Enrolled: {}", response.data.is_enrolled);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt until the final response, backoff included.
    pub latency: Duration,

    /// The number of attempts made, `1` when no retry was needed.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use authsignal::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     (),
    ///     r#"{"isValid":true}"#.to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(40),
    ///     1,
    /// );
    ///
    /// let sized = response.map(|()| 16);
    /// assert_eq!(sized.data, 16);
    /// assert_eq!(sized.raw_body.len(), 16);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
