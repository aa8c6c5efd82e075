//! `safecall-http` is an async HTTP request core that never throws.
//!
//! Every call resolves to an [`ApiResult`]: either `Success { data }` or
//! `Failure { error }`. Network errors, timeouts and 5xx responses are retried
//! with exponential backoff; client errors and cancellations are not.
//!
//! - [`SafeCallClient`]: `get_many`, `get_one`, `post`, `put`, `patch`,
//!   `remove`, `upload`, `download`
//! - [`Resource`]: CRUD helpers derived from a base path
//! - [`run`]: the retry loop, usable with any exchange future

mod client;
mod download;
mod error;
mod hooks;
mod multipart;
mod normalize;
mod options;
mod resource;
mod retry;
mod transport;
mod types;

pub use client::SafeCallClient;
pub use download::filename_from_disposition;
pub use error::SafeCallError;
pub use hooks::{Hooks, RequestConfig, RequestPatch};
pub use multipart::{MultipartForm, UploadBody, DEFAULT_FIELD_NAME};
pub use normalize::{normalize_error, normalize_success, Normalize};
pub use options::{ClientOptions, RequestOptions, ResponseType, UploadOptions};
pub use resource::Resource;
pub use retry::{
    compute_backoff, is_retriable, run, Execution, RetryOverride, RetryPolicy,
    DEFAULT_RETRY_POLICY,
};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    ApiResult, DownloadedFile, ErrorInfo, ExchangeFailure, ExchangeOutcome, RawResponse,
    CODE_CANCELED, CODE_DECODE, CODE_INTERNAL, CODE_INVALID_REQUEST, CODE_NETWORK, CODE_TIMEOUT,
};

pub type Result<T> = std::result::Result<T, SafeCallError>;
