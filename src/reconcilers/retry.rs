// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry loops with exponential backoff and jitter.
//!
//! - [`retry_api_call`] retries transient Kubernetes API errors (429, 5xx, transport)
//!   and fails fast on everything else.
//! - [`retry_on_conflict`] reruns a read-modify-write operation while it keeps losing
//!   optimistic-concurrency races. Used when releasing finalizers.
//!
//! Both are [`retry_while`] with a different [`BackoffPolicy`] and predicate.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::ImportError;

/// Shape of a backoff: the delay doubles from `initial` up to `max_interval`, and
/// retrying stops once `max_elapsed` has passed since the first attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    /// Fraction of each delay added or removed at random (0.1 = ±10%).
    pub jitter: f64,
}

/// Transient API server errors: 100ms, capped at 30s, for up to 5 minutes.
pub const API_BACKOFF: BackoffPolicy = BackoffPolicy {
    initial: Duration::from_millis(100),
    max_interval: Duration::from_secs(30),
    max_elapsed: Duration::from_secs(300),
    jitter: 0.1,
};

/// Write conflicts resolve on the next read: 50ms, capped at 10s, for up to 2 minutes.
pub const CONFLICT_BACKOFF: BackoffPolicy = BackoffPolicy {
    initial: Duration::from_millis(50),
    max_interval: Duration::from_secs(10),
    max_elapsed: Duration::from_secs(120),
    jitter: 0.1,
};

/// Running state of one retry loop.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    next: Duration,
    started: Instant,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            next: policy.initial,
            started: Instant::now(),
        }
    }

    /// Delay before the next attempt, or `None` once the policy's time is used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.started.elapsed() >= self.policy.max_elapsed {
            return None;
        }

        let delay = jitter(self.next, self.policy.jitter);
        self.next = (self.next * 2).min(self.policy.max_interval);
        Some(delay)
    }

    /// The un-jittered delay the next call will be based on.
    #[must_use]
    pub fn peek(&self) -> Duration {
        self.next
    }
}

fn jitter(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return delay;
    }
    let secs = delay.as_secs_f64();
    let spread = secs * factor;
    Duration::from_secs_f64(rand::rng().random_range((secs - spread)..=(secs + spread)).max(0.0))
}

/// Run `operation` until it succeeds, fails with an error `retryable` rejects, or the
/// backoff runs out.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the backoff is
/// exhausted.
pub async fn retry_while<T, E, F, Fut, P>(
    policy: BackoffPolicy,
    operation_name: &str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut backoff = Backoff::new(policy);
    let mut attempt = 0_u32;

    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded after retries");
                }
                return Ok(value);
            }
            Err(e) if retryable(&e) => e,
            Err(e) => return Err(e),
        };

        let Some(delay) = backoff.next_delay() else {
            warn!(operation = operation_name, attempt, error = %err, "Backoff exhausted, giving up");
            return Err(err);
        };
        debug!(operation = operation_name, attempt, retry_after = ?delay, error = %err, "Retrying");
        tokio::time::sleep(delay).await;
    }
}

/// Retry a Kubernetes API call on transient failures.
///
/// # Errors
///
/// Returns the last `kube::Error` if it is not retryable or the backoff is exhausted.
pub async fn retry_api_call<T, F, Fut>(operation: F, operation_name: &str) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    retry_while(API_BACKOFF, operation_name, operation, is_retryable_error).await
}

/// Retry a read-modify-write operation while it fails with a conflict.
///
/// The operation must re-read the object on every attempt; replaying a stale write
/// would conflict forever.
///
/// # Errors
///
/// Returns the first non-conflict error, or the last conflict once the backoff is
/// exhausted.
pub async fn retry_on_conflict<T, F, Fut>(operation: F, operation_name: &str) -> Result<T, ImportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ImportError>>,
{
    retry_while(CONFLICT_BACKOFF, operation_name, operation, ImportError::is_conflict).await
}

/// Retryable: HTTP 429, HTTP 5xx, and transport errors. 404 and 409 go back to the
/// caller for classification.
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(status) => status.code == 429 || (500..600).contains(&status.code),
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
