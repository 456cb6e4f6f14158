//! Webhook signature verification.
//!
//! Authsignal signs each webhook delivery with the API secret and sends the
//! result in a header of the form:
//!
//! ```text
//! t=1740016316,v2=NwFcIT68pK7g+m365Jj4euXj/ke3GSnkTpMPcRVi5q4
//! ```
//!
//! The signature is `base64(HMAC-SHA256(secret, "<t>.<raw body>"))` with the
//! `=` padding stripped. While API secrets are being rotated the header
//! carries one `v2` entry per active secret; a match against any of them is
//! accepted.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default freshness window, in minutes.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 5;

/// Header key carrying the signing timestamp.
const TIMESTAMP_KEY: &str = "t";

/// Header key carrying a signature for the current scheme.
const SIGNATURE_VERSION: &str = "v2";

/// Why a webhook was rejected.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The header has no timestamp, an unparseable timestamp, or no `v2`
    /// signature.
    #[error("Signature format is invalid.")]
    InvalidSignatureFormat,

    /// The signing timestamp is older than the configured tolerance.
    #[error("Timestamp is outside the tolerance zone.")]
    TimestampOutsideTolerance,

    /// None of the supplied signatures match the payload.
    #[error("Signature mismatch.")]
    SignatureMismatch,

    /// The signature is valid but the payload is not a webhook event.
    #[error("Webhook payload is not a valid event: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

/// A parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signing time, in seconds since the Unix epoch.
    pub timestamp: i64,
    /// Every `v2` signature, in header order.
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    /// Parses a `t=..,v2=..[,v2=..]` header.
    ///
    /// Items are split on the first `=` and keys are matched exactly, so
    /// `" v2"` is an unknown key. When `t` appears more than once the first
    /// occurrence wins. Unknown keys and items without `=` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSignatureFormat`] if no valid timestamp
    /// or no signature is present.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };

            match key {
                TIMESTAMP_KEY if timestamp.is_none() => {
                    let parsed = value
                        .parse::<i64>()
                        .map_err(|_| WebhookError::InvalidSignatureFormat)?;
                    timestamp = Some(parsed);
                }
                SIGNATURE_VERSION => signatures.push(value.to_string()),
                _ => {}
            }
        }

        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(WebhookError::InvalidSignatureFormat),
        }
    }
}

impl FromStr for SignatureHeader {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Event schema version.
    pub version: i64,
    /// Event type, e.g. `email.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unique event id.
    pub id: String,
    /// Event source URI.
    pub source: String,
    /// ISO-8601 time the event was produced.
    pub time: String,
    /// Tenant the event belongs to.
    pub tenant_id: String,
    /// Event-specific payload.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Verifies webhook deliveries against a single API secret.
///
/// # Examples
///
/// ```
/// use authsignal::webhook::{Webhook, WebhookError};
///
/// let webhook = Webhook::new("my-api-secret");
///
/// let err = webhook.construct_event("{}", "123").unwrap_err();
/// assert!(matches!(err, WebhookError::InvalidSignatureFormat));
/// ```
#[derive(Clone)]
pub struct Webhook {
    secret: String,
}

impl fmt::Debug for Webhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Webhook").finish_non_exhaustive()
    }
}

impl Webhook {
    /// Creates a verifier for the given API secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies `signature` against `payload` with the default 5 minute
    /// tolerance and returns the parsed event.
    ///
    /// # Errors
    ///
    /// See [`construct_event_with_tolerance`](Self::construct_event_with_tolerance).
    pub fn construct_event(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        self.construct_event_with_tolerance(payload, signature, DEFAULT_TOLERANCE_MINUTES)
    }

    /// Verifies `signature` against `payload` and returns the parsed event.
    ///
    /// `tolerance_minutes <= 0` disables the freshness check.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::InvalidSignatureFormat`] if the header is malformed
    /// - [`WebhookError::TimestampOutsideTolerance`] if it was signed too long ago
    /// - [`WebhookError::SignatureMismatch`] if no signature matches
    /// - [`WebhookError::InvalidPayload`] if the payload is not an event
    pub fn construct_event_with_tolerance(
        &self,
        payload: &str,
        signature: &str,
        tolerance_minutes: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(payload, signature, tolerance_minutes, unix_now())
    }

    fn verify_at(
        &self,
        payload: &str,
        signature: &str,
        tolerance_minutes: i64,
        now: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        let header = SignatureHeader::parse(signature).inspect_err(|_| {
            tracing::debug!("Rejected webhook: malformed signature header");
        })?;

        if tolerance_minutes > 0 {
            let oldest = now.saturating_sub(tolerance_minutes.saturating_mul(60));
            if header.timestamp < oldest {
                tracing::debug!(
                    timestamp = header.timestamp,
                    tolerance_minutes = tolerance_minutes,
                    "Rejected webhook: timestamp outside tolerance"
                );
                return Err(WebhookError::TimestampOutsideTolerance);
            }
        }

        // verify_slice compares in constant time.
        let mac = self.keyed_mac(header.timestamp, payload);
        let matched = header.signatures.iter().any(|candidate| {
            STANDARD_NO_PAD
                .decode(candidate)
                .is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
        });

        if !matched {
            tracing::debug!(
                candidates = header.signatures.len(),
                "Rejected webhook: signature mismatch"
            );
            return Err(WebhookError::SignatureMismatch);
        }

        serde_json::from_str(payload).map_err(WebhookError::InvalidPayload)
    }

    /// Computes the `v2` signature for a payload signed at `timestamp`.
    pub fn compute_signature(&self, timestamp: i64, payload: &str) -> String {
        let digest = self.keyed_mac(timestamp, payload).finalize().into_bytes();
        STANDARD_NO_PAD.encode(digest)
    }

    /// HMAC over `"<timestamp>.<payload>"`, ready to finalize or verify.
    fn keyed_mac(&self, timestamp: i64, payload: &str) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac
    }

    /// Builds the header Authsignal would send for `payload` at `timestamp`.
    ///
    /// Handy for exercising webhook handlers in tests.
    pub fn signature_header(&self, timestamp: i64, payload: &str) -> String {
        format!(
            "{}={},{}={}",
            TIMESTAMP_KEY,
            timestamp,
            SIGNATURE_VERSION,
            self.compute_signature(timestamp, payload)
        )
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
