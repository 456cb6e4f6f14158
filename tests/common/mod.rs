//! Shared test fixtures.

#![allow(dead_code)]

use authsignal::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use authsignal::TransportErrorKind;
use http::{HeaderMap, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(usize) -> Result<HttpResponse, TransportError> + Send + Sync;

/// In-memory transport that records every request and answers from a script.
///
/// The responder receives the 0-indexed attempt number.
#[derive(Clone)]
pub struct SpyTransport {
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    responder: Arc<Responder>,
}

impl SpyTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    /// Always answers with `status` and `body`.
    pub fn always(status: u16, body: &'static str) -> Self {
        Self::new(move |_| Ok(json_response(status, body)))
    }

    /// Always fails with a transport error of `kind`.
    pub fn failing(kind: TransportErrorKind) -> Self {
        Self::new(move |_| Err(TransportError::new(kind, "scripted failure")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for SpyTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        (self.responder)(attempt)
    }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(
        StatusCode::from_u16(status).unwrap(),
        HeaderMap::new(),
        body.as_bytes().to_vec(),
    )
}

pub const SECRET: &str = "secret_key";

/// `Basic base64("secret_key:")`
pub const AUTHORIZATION: &str = "Basic c2VjcmV0X2tleTo=";

pub const UNAVAILABLE_BODY: &str =
    r#"{"error":"unavailable","errorDescription":"The service is temporarily unavailable."}"#;
