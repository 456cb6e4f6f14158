//! Request descriptors handed to the client by endpoint methods.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;

use crate::{Error, Result};

/// Everything needed to issue one logical API call.
///
/// A descriptor is built once by an endpoint method and never changes while
/// the client retries it: method, path, headers and body are resent verbatim
/// on every attempt.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,

    /// The request path, appended to the client's base URL as is.
    pub path: String,

    /// Per-request headers, on top of the client's default headers.
    pub headers: HeaderMap,

    /// Query parameters, encoded in insertion order.
    pub query_params: Vec<(String, String)>,

    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Creates a descriptor with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` descriptor.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Shorthand for a `PATCH` descriptor.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Shorthand for a `DELETE` descriptor.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a header to the request.
    ///
    /// `Authorization` is always derived from the client's API secret; a
    /// value set here is replaced when the request is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds a query parameter only when `value` is present.
    ///
    /// Endpoint filters are mostly optional, so this keeps call sites flat.
    pub fn with_optional_query_param(
        self,
        key: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> Self {
        match value {
            Some(value) => self.with_query_param(key, value),
            None => self,
        }
    }

    /// Serializes `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if `body` cannot be serialized.
    pub fn with_json_body<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Joins the path onto `base_url` and appends the query string.
    ///
    /// The path is concatenated, not resolved, so a base URL carrying a
    /// version prefix such as `/v1` keeps it.
    pub(crate) fn resolve_url(&self, base_url: &str) -> Result<Url> {
        let raw = format!("{}{}", base_url, self.path);
        let mut url = Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}
