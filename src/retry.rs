//! Retry loop, backoff computation and failure classification.

use std::{future::Future, panic::AssertUnwindSafe, time::Duration};

use futures::{future, FutureExt};
use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    normalize::{self, Normalize},
    types::{CODE_CANCELED, CODE_INTERNAL, CODE_INVALID_REQUEST},
    ApiResult, ExchangeFailure, ExchangeOutcome,
};

/// Share of the exponential delay that jitter may remove.
const JITTER_RATIO: f64 = 0.3;

/// Retry defaults used when neither client nor call override them.
pub const DEFAULT_RETRY_POLICY: RetryPolicy = RetryPolicy {
    retries: 1,
    base_delay_ms: 300,
    max_delay_ms: 2_000,
    jitter: true,
};

/// Configures how failed exchanges are retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Randomly shortens each delay by up to 30%.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        DEFAULT_RETRY_POLICY
    }
}

/// Per-call retry settings; unset fields fall back to the client's policy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetryOverride {
    pub retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<bool>,
}

impl RetryOverride {
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_delay_ms = Some(delay_ms);
        self
    }

    pub fn max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = Some(delay_ms);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Merges the set fields over `base`.
    pub fn apply(&self, base: &RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries.unwrap_or(base.retries),
            base_delay_ms: self.base_delay_ms.unwrap_or(base.base_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            jitter: self.jitter.unwrap_or(base.jitter),
        }
    }
}

/// Delay in milliseconds before the retry that follows failed `attempt` (1-based).
pub fn compute_backoff(attempt: u32, policy: &RetryPolicy) -> u64 {
    let shift = attempt.saturating_sub(1).min(63);
    let exp = policy
        .base_delay_ms
        .saturating_mul(1u64 << shift)
        .min(policy.max_delay_ms);

    if !policy.jitter {
        return exp;
    }

    let cut = rand::thread_rng().gen_range(0.0..=JITTER_RATIO) * exp as f64;
    ((exp as f64 - cut).floor() as u64).min(policy.max_delay_ms)
}

/// Whether another attempt may fix this failure.
///
/// Aborts, unbuildable requests and internal panics are final. Failures
/// without a status (network, timeout) and 5xx statuses are transient.
pub fn is_retriable(failure: &ExchangeFailure) -> bool {
    if matches!(
        failure.code.as_deref(),
        Some(CODE_CANCELED | CODE_INVALID_REQUEST | CODE_INTERNAL)
    ) {
        return false;
    }
    match failure.status {
        None => true,
        Some(status) => (500..600).contains(&status),
    }
}

/// Outcome of [`run`]: the normalized result and how many exchanges it took.
#[derive(Clone, Debug)]
pub struct Execution<P> {
    pub result: ApiResult<P>,
    pub attempts: u32,
}

/// Invokes `exchange` until it succeeds, fails terminally, or the policy is
/// exhausted. Always resolves; panics inside `exchange` become a failure.
///
/// `cancel` interrupts backoff waits. Exchanges are expected to observe the
/// same token themselves and report [`ExchangeFailure::aborted`].
pub async fn run<P, F, Fut>(
    mut exchange: F,
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
) -> Execution<P>
where
    P: Normalize,
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeOutcome<P>>,
{
    let max_attempts = policy.retries.saturating_add(1);
    let mut attempt = 0u32;

    loop {
        // building the future runs inside the guard as well
        let attempt_future = future::lazy(|_| exchange()).flatten();
        let outcome = match AssertUnwindSafe(attempt_future).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(attempt = attempt + 1, "exchange panicked");
                return Execution {
                    result: normalize::unexpected(),
                    attempts: attempt + 1,
                };
            }
        };

        let failure = match outcome {
            Ok(payload) => {
                return Execution {
                    result: normalize::normalize_success(payload),
                    attempts: attempt + 1,
                }
            }
            Err(failure) => failure,
        };

        attempt += 1;
        if attempt >= max_attempts || !is_retriable(&failure) {
            return Execution {
                result: normalize::normalize_error(failure),
                attempts: attempt,
            };
        }

        let delay_ms = compute_backoff(attempt, policy);
        tracing::debug!(
            attempt,
            delay_ms,
            status = failure.status,
            code = failure.code.as_deref(),
            "retrying request"
        );

        let delay = sleep(Duration::from_millis(delay_ms));
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Execution {
                            result: normalize::normalize_error(ExchangeFailure::aborted()),
                            attempts: attempt,
                        };
                    }
                    _ = delay => {}
                }
            }
            None => delay.await,
        }
    }
}
