//! Conversion of transport outcomes into [`ApiResult`].
//!
//! A JSON object counts as already normalized only when its keys are exactly
//! `status` and `data` and `status` is a boolean. Anything else is wrapped.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::{
    types::{CODE_DECODE, CODE_INTERNAL},
    ApiResult, ErrorInfo, ExchangeFailure, RawResponse,
};

const FALLBACK_MESSAGE: &str = "Request failed";
const UNEXPECTED_MESSAGE: &str = "Unexpected client error";

/// Success payloads that know how to become an [`ApiResult`].
pub trait Normalize: Sized {
    fn normalize_success(self) -> ApiResult<Self>;
}

impl Normalize for JsonValue {
    fn normalize_success(self) -> ApiResult<Self> {
        match self {
            JsonValue::Object(mut map) if is_canonical(&map, true) => ApiResult::Success {
                data: map.remove("data").unwrap_or(JsonValue::Null),
            },
            payload => ApiResult::Success { data: payload },
        }
    }
}

impl Normalize for RawResponse {
    fn normalize_success(self) -> ApiResult<Self> {
        ApiResult::Success { data: self }
    }
}

pub fn normalize_success<P: Normalize>(payload: P) -> ApiResult<P> {
    payload.normalize_success()
}

pub fn normalize_error<P>(failure: ExchangeFailure) -> ApiResult<P> {
    ApiResult::Failure {
        error: error_info(failure),
    }
}

/// Failure used when the exchange itself blew up instead of reporting.
pub(crate) fn unexpected<P>() -> ApiResult<P> {
    ApiResult::Failure {
        error: ErrorInfo::new(UNEXPECTED_MESSAGE).with_code(CODE_INTERNAL),
    }
}

/// Decodes the JSON data of a success into `T`.
///
/// A body that does not fit `T` becomes a failure with [`CODE_DECODE`].
pub(crate) fn decode_data<T: DeserializeOwned>(result: ApiResult<JsonValue>) -> ApiResult<T> {
    match result {
        ApiResult::Success { data } => match serde_json::from_value(data) {
            Ok(data) => ApiResult::Success { data },
            Err(err) => ApiResult::Failure {
                error: ErrorInfo::new(format!("failed to decode response body: {err}"))
                    .with_code(CODE_DECODE),
            },
        },
        ApiResult::Failure { error } => ApiResult::Failure { error },
    }
}

fn is_canonical(map: &Map<String, JsonValue>, status: bool) -> bool {
    map.len() == 2
        && map.get("status") == Some(&JsonValue::Bool(status))
        && map.contains_key("data")
}

fn error_info(failure: ExchangeFailure) -> ErrorInfo {
    let ExchangeFailure {
        status,
        code,
        message: transport_message,
        body,
    } = failure;

    let mut extra = match body {
        Some(JsonValue::Object(map)) => {
            if let Some(info) = canonical_error(&map) {
                return info;
            }
            map
        }
        _ => Map::new(),
    };

    let message = non_empty(extra.get("message"))
        .or_else(|| error_field_message(extra.get("error")))
        .or_else(|| {
            let trimmed = transport_message.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        })
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_owned());

    extra.remove("message");
    let body_code = match extra.remove("code") {
        Some(JsonValue::String(value)) if !value.is_empty() => Some(value),
        Some(JsonValue::Number(value)) => Some(value.to_string()),
        _ => None,
    };
    let body_status = extra
        .remove("statusCode")
        .and_then(|value| value.as_u64())
        .and_then(|value| u16::try_from(value).ok());

    ErrorInfo {
        message,
        status_code: status.or(body_status),
        code: code.or(body_code),
        extra,
    }
}

fn canonical_error(map: &Map<String, JsonValue>) -> Option<ErrorInfo> {
    if !is_canonical(map, false) {
        return None;
    }
    let data = map.get("data")?.clone();
    serde_json::from_value::<ErrorInfo>(data)
        .ok()
        .filter(|info| !info.message.trim().is_empty())
}

fn non_empty(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(text) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

// `error` is either a plain string or a nested `{ "message": ... }` object.
fn error_field_message(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::Object(nested) => non_empty(nested.get("message")),
        other => non_empty(Some(other)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_data, normalize_error, normalize_success};
    use crate::{
        types::{CODE_DECODE, CODE_TIMEOUT},
        ApiResult, ErrorInfo, ExchangeFailure,
    };

    #[test]
    fn wraps_plain_payload() {
        let result = normalize_success(json!({"id": 1}));
        assert_eq!(result, ApiResult::Success { data: json!({"id": 1}) });
    }

    #[test]
    fn canonical_success_passes_through() {
        let once = normalize_success(json!({"status": true, "data": {"id": 1}}));
        assert_eq!(once, ApiResult::Success { data: json!({"id": 1}) });

        let reserialized = serde_json::to_value(&once).expect("must serialize");
        assert_eq!(reserialized, json!({"status": true, "data": {"id": 1}}));
        assert_eq!(normalize_success(reserialized), once);
    }

    #[test]
    fn payload_with_unrelated_status_field_is_wrapped() {
        let payload = json!({"status": "active", "data": [1], "owner": "kit"});
        assert_eq!(
            normalize_success(payload.clone()),
            ApiResult::Success { data: payload }
        );
    }

    #[test]
    fn canonical_failure_passes_through() {
        let body = json!({"status": false, "data": {"message": "quota exceeded", "statusCode": 429}});
        let result: ApiResult<()> =
            normalize_error(ExchangeFailure::http(502, "Bad Gateway", Some(body)));

        let mut expected = ErrorInfo::new("quota exceeded");
        expected.status_code = Some(429);
        assert_eq!(result, ApiResult::Failure { error: expected });
    }

    #[test]
    fn message_field_beats_error_field_and_status_text() {
        let body = json!({"message": "name is required", "error": "validation", "field": "name"});
        let result: ApiResult<()> =
            normalize_error(ExchangeFailure::http(422, "Unprocessable Entity", Some(body)));
        let error = result.error().expect("must fail").clone();

        assert_eq!(error.message, "name is required");
        assert_eq!(error.status_code, Some(422));
        assert_eq!(error.extra.get("field"), Some(&json!("name")));
        assert_eq!(error.extra.get("error"), Some(&json!("validation")));
        assert!(error.extra.get("message").is_none());
    }

    #[test]
    fn error_field_used_when_message_missing() {
        let body = json!({"error": {"message": "token expired"}});
        let result: ApiResult<()> =
            normalize_error(ExchangeFailure::http(401, "Unauthorized", Some(body)));
        assert_eq!(result.error().expect("must fail").message, "token expired");

        let body = json!({"error": "forbidden"});
        let result: ApiResult<()> =
            normalize_error(ExchangeFailure::http(403, "Forbidden", Some(body)));
        assert_eq!(result.error().expect("must fail").message, "forbidden");
    }

    #[test]
    fn status_text_used_without_structured_body() {
        let result: ApiResult<()> = normalize_error(ExchangeFailure::http(
            503,
            "Service Unavailable",
            Some(json!("<html>down</html>")),
        ));
        let error = result.error().expect("must fail");
        assert_eq!(error.message, "Service Unavailable");
        assert_eq!(error.status_code, Some(503));
        assert!(error.extra.is_empty());
    }

    #[test]
    fn transport_code_attached() {
        let result: ApiResult<()> =
            normalize_error(ExchangeFailure::transport(CODE_TIMEOUT, "timeout of 20ms exceeded"));
        let error = result.error().expect("must fail");
        assert_eq!(error.message, "timeout of 20ms exceeded");
        assert_eq!(error.code.as_deref(), Some(CODE_TIMEOUT));
        assert_eq!(error.status_code, None);
    }

    #[test]
    fn falls_back_to_generic_message() {
        let failure = ExchangeFailure {
            status: None,
            code: None,
            message: "  ".to_owned(),
            body: Some(json!({"message": ""})),
        };
        let result: ApiResult<()> = normalize_error(failure);
        assert_eq!(result.error().expect("must fail").message, "Request failed");
    }

    #[test]
    fn decode_mismatch_becomes_failure() {
        let result: ApiResult<Vec<u32>> = decode_data(ApiResult::Success { data: json!({"id": 1}) });
        assert_eq!(
            result.error().and_then(|e| e.code.as_deref()),
            Some(CODE_DECODE)
        );
    }
}
