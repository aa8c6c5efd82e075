use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

/// Transport code for an exchange cut short by the caller's cancellation token.
pub const CODE_CANCELED: &str = "ERR_CANCELED";
/// Transport code for a request that timed out.
pub const CODE_TIMEOUT: &str = "ETIMEDOUT";
/// Transport code for connection, DNS, and body transfer failures.
pub const CODE_NETWORK: &str = "ERR_NETWORK";
/// Transport code for a request that could not be built (bad header, bad URL).
pub const CODE_INVALID_REQUEST: &str = "ERR_INVALID_REQUEST";
/// Transport code for a panic caught inside the exchange.
pub const CODE_INTERNAL: &str = "ERR_INTERNAL";
/// Code attached when a success body does not match the requested type.
pub const CODE_DECODE: &str = "ERR_DECODE";

/// Uniform outcome of every request.
///
/// Serializes to the canonical `{"status": true, "data": ...}` or
/// `{"status": false, "data": {"message": ...}}` shape.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResult<T> {
    Success { data: T },
    Failure { error: ErrorInfo },
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Converts into a standard `Result` for `?`-style handling.
    pub fn into_result(self) -> std::result::Result<T, ErrorInfo> {
        match self {
            Self::Success { data } => Ok(data),
            Self::Failure { error } => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            Self::Success { data } => ApiResult::Success { data: f(data) },
            Self::Failure { error } => ApiResult::Failure { error },
        }
    }
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiResult", 2)?;
        match self {
            Self::Success { data } => {
                state.serialize_field("status", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure { error } => {
                state.serialize_field("status", &false)?;
                state.serialize_field("data", error)?;
            }
        }
        state.end()
    }
}

/// Failure details carried by [`ApiResult::Failure`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Human-readable reason, never empty.
    pub message: String,
    /// HTTP status, when the server answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Transport-level failure code such as [`CODE_TIMEOUT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Remaining fields of a structured server error body.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            code: None,
            extra: Map::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// One failed exchange as reported by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeFailure {
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    /// Transport-level code when no usable response was received.
    pub code: Option<String>,
    /// Transport's own description of the failure.
    pub message: String,
    /// Decoded error body, if any.
    pub body: Option<JsonValue>,
}

impl ExchangeFailure {
    /// Failure with an HTTP status and an optional decoded body.
    pub fn http(status: u16, message: impl Into<String>, body: Option<JsonValue>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
            body,
        }
    }

    /// Failure without a response.
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: Some(code.into()),
            message: message.into(),
            body: None,
        }
    }

    pub fn aborted() -> Self {
        Self::transport(CODE_CANCELED, "Request aborted")
    }

    pub fn is_aborted(&self) -> bool {
        self.code.as_deref() == Some(CODE_CANCELED)
    }
}

/// Result of one exchange attempt.
pub type ExchangeOutcome<P> = std::result::Result<P, ExchangeFailure>;

/// Response received from one successful exchange.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Success payload of [`crate::SafeCallClient::download`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedFile {
    pub blob: Bytes,
    /// Name from the `content-disposition` header, when one could be parsed.
    pub filename: Option<String>,
}
