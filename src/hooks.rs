//! Caller-supplied observers invoked around every exchange.

use std::{
    any::Any,
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
};

use reqwest::Method;

use crate::{ExchangeFailure, RawResponse};

/// Outgoing request as seen by [`Hooks::on_request`].
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub method: Method,
    pub url: String,
    /// Merged headers, keys lowercased.
    pub headers: BTreeMap<String, String>,
    pub params: Vec<(String, String)>,
    pub timeout_ms: u64,
}

/// Changes returned by [`Hooks::on_request`], applied over the outgoing request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestPatch {
    /// Headers set or replaced on the request.
    pub headers: BTreeMap<String, String>,
    /// Query parameters appended to the request.
    pub params: Vec<(String, String)>,
    pub timeout_ms: Option<u64>,
}

impl RequestPatch {
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub(crate) fn apply(self, config: &mut RequestConfig) {
        config.headers.extend(
            self.headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value)),
        );
        config.params.extend(self.params);
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

/// Observers called synchronously around each exchange attempt.
///
/// Every method has a no-op default. A panicking hook is logged and ignored;
/// it never changes the result of the request or stops other hooks.
pub trait Hooks: Send + Sync {
    /// Called before each attempt; a returned patch is merged over the request.
    fn on_request(&self, _request: &RequestConfig) -> Option<RequestPatch> {
        None
    }

    /// Called after each attempt that produced a 2xx response.
    fn on_response(&self, _response: &RawResponse) {}

    /// Called after each failed attempt, including aborts.
    fn on_error(&self, _failure: &ExchangeFailure) {}

    /// Called after each attempt answered with 401 or 403.
    fn on_auth_error(&self, _failure: &ExchangeFailure) {}
}

pub(crate) fn before_request(hooks: Option<&dyn Hooks>, config: &mut RequestConfig) {
    let Some(hooks) = hooks else { return };
    if let Some(Some(patch)) = guarded("on_request", || hooks.on_request(config)) {
        patch.apply(config);
    }
}

pub(crate) fn after_response(hooks: Option<&dyn Hooks>, response: &RawResponse) {
    if let Some(hooks) = hooks {
        guarded("on_response", || hooks.on_response(response));
    }
}

pub(crate) fn after_failure(hooks: Option<&dyn Hooks>, failure: &ExchangeFailure) {
    let Some(hooks) = hooks else { return };
    guarded("on_error", || hooks.on_error(failure));
    if matches!(failure.status, Some(401 | 403)) {
        guarded("on_auth_error", || hooks.on_auth_error(failure));
    }
}

fn guarded<R>(hook: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::warn!(hook, error = %panic_message(payload.as_ref()), "hook panicked; ignoring");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
