//! Retry policy for transient failures.
//!
//! The policy is deliberately conservative about writes. Connection-level
//! failures are retried for every method, but a 5xx response is retried only
//! for methods whose repetition has no side effect (`GET`, `HEAD`, `OPTIONS`).
//!
//! Delays grow exponentially: the Nth retry waits `base * 2^N`, with a
//! 100ms base. There is no jitter and no cap, so large retry counts add up
//! quickly; see [`RetryPolicy::worst_case_backoff`].

use std::sync::Arc;
use std::time::Duration;

use http::Method;

use crate::transport::{HttpResponse, TransportError};

/// Default number of retries after the initial attempt.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default base delay for exponential backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Callback invoked before every retry.
///
/// Receives the 1-indexed retry number and the transport error that caused
/// it, or `None` when the retry was caused by a 5xx response. It is a
/// diagnostics hook only and cannot influence the retry decision.
pub type RetryObserver = Arc<dyn Fn(u32, Option<&TransportError>) + Send + Sync>;

/// The result of a single transport attempt, as seen by the policy.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// An HTTP response was received, whatever its status.
    Response(&'a HttpResponse),
    /// No response was received.
    Failed(&'a TransportError),
}

/// Per-call retry bookkeeping.
///
/// Created fresh for each logical request and dropped when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_made: u32,
    attempts_allowed: u32,
}

impl RetryState {
    /// Creates a state allowing `attempts_allowed` retries.
    pub fn new(attempts_allowed: u32) -> Self {
        Self {
            attempts_made: 0,
            attempts_allowed,
        }
    }

    /// Retries performed so far.
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Retries allowed in total.
    pub fn attempts_allowed(&self) -> u32 {
        self.attempts_allowed
    }

    /// Returns `true` once no retries remain.
    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.attempts_allowed
    }

    /// Records a retry and returns its 1-indexed number.
    pub fn record_retry(&mut self) -> u32 {
        self.attempts_made = (self.attempts_made + 1).min(self.attempts_allowed);
        self.attempts_made
    }
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then send the request again.
    Retry {
        /// Backoff before the next attempt.
        delay: Duration,
    },
    /// Hand the outcome back to the caller.
    Stop,
}

/// Decides whether an attempt is retried and how long to wait first.
///
/// # Examples
///
/// ```
/// use authsignal::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
///
/// assert_eq!(policy.delay_for_retry(1), Duration::from_millis(200));
/// assert_eq!(policy.delay_for_retry(2), Duration::from_millis(400));
/// assert_eq!(policy.worst_case_backoff(2), Duration::from_millis(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the default 100ms base delay.
    pub fn new() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    /// Overrides the base delay.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Returns the base delay.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decides what to do with an attempt's outcome.
    ///
    /// Rules, first match wins:
    /// 1. no retries left: stop;
    /// 2. retryable transport failure: retry, whatever the method;
    /// 3. 5xx on `GET`, `HEAD` or `OPTIONS`: retry;
    /// 4. anything else: stop.
    pub fn decide(
        &self,
        method: &Method,
        outcome: Outcome<'_>,
        state: &RetryState,
    ) -> RetryDecision {
        if state.is_exhausted() {
            return RetryDecision::Stop;
        }

        let retry = match outcome {
            Outcome::Failed(error) => error.is_retryable(),
            Outcome::Response(response) => {
                response.status.is_server_error() && is_idempotent_safe(method)
            }
        };

        if retry {
            RetryDecision::Retry {
                delay: self.delay_for_retry(state.attempts_made() + 1),
            }
        } else {
            RetryDecision::Stop
        }
    }

    /// Returns the delay before the given retry (1-indexed): `base * 2^retry`.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|multiplier| self.base_delay.checked_mul(multiplier))
            .unwrap_or(Duration::MAX)
    }

    /// Total backoff added by `retries` consecutive retries, excluding
    /// network time.
    pub fn worst_case_backoff(&self, retries: u32) -> Duration {
        (1..=retries).fold(Duration::ZERO, |total, retry| {
            total.saturating_add(self.delay_for_retry(retry))
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `true` for methods that can be blindly repeated.
pub fn is_idempotent_safe(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::OPTIONS].contains(method)
}
