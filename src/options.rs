use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::{multipart::DEFAULT_FIELD_NAME, RetryOverride, RetryPolicy};

/// Configures client-wide timeout, headers and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Headers sent with every request; they override auth headers.
    pub default_headers: BTreeMap<String, String>,
    /// Retry policy used unless a call overrides it.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            default_headers: BTreeMap::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientOptions {
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }
}

/// How a success body is turned into data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResponseType {
    /// Parse as JSON; non-JSON bodies become a JSON string.
    #[default]
    Json,
    /// Keep the body as text.
    Text,
}

/// Per-call overrides.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    /// Headers for this call only; they override every client header.
    pub headers: BTreeMap<String, String>,
    /// Shared across all attempts of the call.
    pub cancel: Option<CancellationToken>,
    pub timeout_ms: Option<u64>,
    pub response_type: ResponseType,
    pub retry: RetryOverride,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.params.extend(
            params
                .into_iter()
                .map(|(name, value)| (name.into(), value.to_string())),
        );
        self
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn retry(mut self, retry: RetryOverride) -> Self {
        self.retry = retry;
        self
    }
}

/// Per-call overrides for [`crate::SafeCallClient::upload`].
#[derive(Clone, Debug)]
pub struct UploadOptions {
    pub request: RequestOptions,
    /// Part name used for [`crate::UploadBody::File`].
    pub field_name: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            request: RequestOptions::default(),
            field_name: DEFAULT_FIELD_NAME.to_owned(),
        }
    }
}

impl UploadOptions {
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    pub fn request(mut self, request: RequestOptions) -> Self {
        self.request = request;
        self
    }
}

impl From<RequestOptions> for UploadOptions {
    fn from(request: RequestOptions) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }
}
