/// Error type returned by this crate for caller mistakes.
///
/// Runtime failures (HTTP errors, timeouts, aborts) never show up here; they
/// are reported through [`crate::ApiResult::Failure`].
#[derive(Debug, thiserror::Error)]
pub enum SafeCallError {
    /// Request path was empty or whitespace.
    #[error("request path must be a non-empty string")]
    EmptyPath,
    /// Resource identifier was empty or whitespace.
    #[error("resource id must be a non-empty identifier")]
    EmptyId,
    /// Resource action subpath was empty or whitespace.
    #[error("resource action subpath must be a non-empty string")]
    EmptySubpath,
    /// Upload payload has an unsupported shape.
    #[error("invalid upload payload: {0}")]
    InvalidUpload(String),
    /// Request payload could not be serialized to JSON.
    #[error("invalid request payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
