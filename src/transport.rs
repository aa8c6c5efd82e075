use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, StatusCode};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::{
    hooks::{self, Hooks, RequestConfig},
    multipart::MultipartForm,
    types::{CODE_INVALID_REQUEST, CODE_NETWORK, CODE_TIMEOUT},
    ExchangeFailure, ExchangeOutcome, RawResponse, ResponseType,
};

pub(crate) enum RequestBody {
    Empty,
    Json(JsonValue),
    Multipart(MultipartForm),
}

/// Everything needed to repeat one HTTP exchange.
pub(crate) struct HttpExchange<'a> {
    pub http: &'a reqwest::Client,
    pub hooks: Option<&'a dyn Hooks>,
    pub config: RequestConfig,
    pub body: RequestBody,
    pub cancel: Option<CancellationToken>,
}

impl HttpExchange<'_> {
    /// Performs one attempt. Resolves to an abort as soon as the token fires.
    pub async fn perform(&self) -> ExchangeOutcome<RawResponse> {
        let outcome = match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ExchangeFailure::aborted()),
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ExchangeFailure::aborted()),
                    outcome = self.send() => outcome,
                }
            }
            None => self.send().await,
        };

        match &outcome {
            Ok(response) => hooks::after_response(self.hooks, response),
            Err(failure) => hooks::after_failure(self.hooks, failure),
        }
        outcome
    }

    async fn send(&self) -> ExchangeOutcome<RawResponse> {
        let mut config = self.config.clone();
        hooks::before_request(self.hooks, &mut config);
        tracing::trace!(method = %config.method, url = %config.url, "sending request");

        let mut request = self
            .http
            .request(config.method.clone(), &config.url)
            .timeout(Duration::from_millis(config.timeout_ms));
        if !config.params.is_empty() {
            request = request.query(&config.params);
        }
        for (name, value) in &config.headers {
            // multipart sets its own content type with the boundary
            if matches!(self.body, RequestBody::Multipart(_))
                && name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
            {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        request = match &self.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(form) => request.multipart(form.to_reqwest().map_err(|err| {
                ExchangeFailure::transport(CODE_INVALID_REQUEST, err.to_string())
            })?),
        };

        let response = request
            .send()
            .await
            .map_err(|err| transport_failure(&err, config.timeout_ms))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_failure(&err, config.timeout_ms))?;

        if !status.is_success() {
            return Err(ExchangeFailure::http(
                status.as_u16(),
                status_text(status),
                error_body(&body),
            ));
        }

        Ok(RawResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Turns a success body into the JSON data of the result.
pub(crate) fn json_payload(response: RawResponse, response_type: ResponseType) -> JsonValue {
    if response.body.is_empty() {
        return JsonValue::Null;
    }
    match response_type {
        ResponseType::Json => serde_json::from_slice(&response.body).unwrap_or_else(|_| {
            JsonValue::String(String::from_utf8_lossy(&response.body).into_owned())
        }),
        ResponseType::Text => {
            JsonValue::String(String::from_utf8_lossy(&response.body).into_owned())
        }
    }
}

fn error_body(body: &[u8]) -> Option<JsonValue> {
    if body.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(body)
            .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(body).into_owned())),
    )
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || format!("Request failed with status code {}", status.as_u16()),
        str::to_owned,
    )
}

fn transport_failure(err: &reqwest::Error, timeout_ms: u64) -> ExchangeFailure {
    if err.is_timeout() {
        ExchangeFailure::transport(CODE_TIMEOUT, format!("timeout of {timeout_ms}ms exceeded"))
    } else if err.is_builder() {
        ExchangeFailure::transport(CODE_INVALID_REQUEST, err.to_string())
    } else {
        ExchangeFailure::transport(CODE_NETWORK, err.to_string())
    }
}
