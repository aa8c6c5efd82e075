use std::{collections::BTreeMap, convert::identity, fmt, sync::Arc};

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    download,
    hooks::{Hooks, RequestConfig},
    normalize::{decode_data, Normalize},
    retry::{self, Execution},
    transport::{json_payload, HttpExchange, RequestBody},
    ApiResult, ClientOptions, DownloadedFile, RawResponse, RequestOptions, Resource, Result,
    SafeCallError, UploadBody, UploadOptions,
};

#[derive(Clone)]
/// HTTP client whose calls always resolve to an [`ApiResult`].
///
/// Only caller mistakes (empty path, unserializable payload, malformed upload)
/// are reported through the outer `Result`; they are detected before any
/// request is sent.
pub struct SafeCallClient {
    http: reqwest::Client,
    base_url: String,
    auth_headers: BTreeMap<String, String>,
    options: ClientOptions,
    hooks: Option<Arc<dyn Hooks>>,
}

impl fmt::Debug for SafeCallClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auth_headers: BTreeMap<&str, &str> = self
            .auth_headers
            .keys()
            .map(|name| (name.as_str(), "<redacted>"))
            .collect();
        f.debug_struct("SafeCallClient")
            .field("base_url", &self.base_url)
            .field("auth_headers", &auth_headers)
            .field("options", &self.options)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl SafeCallClient {
    /// Creates a client for `base_url`. Request paths are appended to it.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_headers: BTreeMap::new(),
            options: ClientOptions::default(),
            hooks: None,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `SAFECALL_BASE_URL`: base URL, required
    /// - `SAFECALL_TOKEN`: bearer token, optional (`Bearer ` prefix optional)
    /// - `SAFECALL_TIMEOUT_MS`: request timeout, optional
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SAFECALL_BASE_URL").map_err(|_| {
            SafeCallError::Config("missing SAFECALL_BASE_URL environment variable".to_owned())
        })?;
        if base_url.trim().is_empty() {
            return Err(SafeCallError::Config(
                "SAFECALL_BASE_URL is set but empty".to_owned(),
            ));
        }

        let mut client = Self::new(base_url.trim());
        if let Ok(token) = std::env::var("SAFECALL_TOKEN") {
            if !token.trim().is_empty() {
                client = client.with_bearer(token);
            }
        }
        if let Ok(timeout) = std::env::var("SAFECALL_TIMEOUT_MS") {
            let timeout_ms = timeout.trim().parse::<u64>().map_err(|err| {
                SafeCallError::Config(format!("invalid SAFECALL_TIMEOUT_MS '{timeout}': {err}"))
            })?;
            client.options.timeout_ms = timeout_ms;
        }
        Ok(client)
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn with_bearer(self, token: impl AsRef<str>) -> Self {
        let authorization = normalize_bearer_authorization(token.as_ref());
        self.with_auth_header("authorization", authorization)
    }

    /// Adds an auth header. Default headers and per-call headers override it.
    pub fn with_auth_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.auth_headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Applies client options such as timeout, headers and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn with_hooks(mut self, hooks: impl Hooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS roots, pools).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// CRUD helpers rooted at `base_path`.
    pub fn resource(&self, base_path: impl Into<String>) -> Resource {
        Resource::new(self.clone(), base_path)
    }

    /// `GET` returning a list.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<ApiResult<Vec<T>>> {
        self.send_json(Method::GET, path, RequestBody::Empty, &opts)
            .await
    }

    /// `GET` returning a single item.
    pub async fn get_one<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<ApiResult<T>> {
        self.send_json(Method::GET, path, RequestBody::Empty, &opts)
            .await
    }

    pub async fn post<T, B>(&self, path: &str, payload: &B, opts: RequestOptions) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(path, payload)?;
        self.send_json(Method::POST, path, body, &opts).await
    }

    pub async fn put<T, B>(&self, path: &str, payload: &B, opts: RequestOptions) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(path, payload)?;
        self.send_json(Method::PUT, path, body, &opts).await
    }

    pub async fn patch<T, B>(&self, path: &str, payload: &B, opts: RequestOptions) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = json_body(path, payload)?;
        self.send_json(Method::PATCH, path, body, &opts).await
    }

    /// `DELETE`.
    pub async fn remove<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<ApiResult<T>> {
        self.send_json(Method::DELETE, path, RequestBody::Empty, &opts)
            .await
    }

    /// `POST` as `multipart/form-data`.
    ///
    /// Any caller-supplied content type is replaced by the multipart one.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        body: UploadBody,
        opts: UploadOptions,
    ) -> Result<ApiResult<T>> {
        validate_path(path)?;
        let form = body.into_form(&opts.field_name)?;
        form.validate()?;
        self.send_json(Method::POST, path, RequestBody::Multipart(form), &opts.request)
            .await
    }

    /// `GET` of binary content, with the file name taken from
    /// `content-disposition` when present.
    pub async fn download(
        &self,
        path: &str,
        opts: RequestOptions,
    ) -> Result<ApiResult<DownloadedFile>> {
        let execution = self
            .execute(Method::GET, path, RequestBody::Empty, &opts, identity)
            .await?;
        Ok(execution.result.map(download::into_downloaded_file))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &RequestOptions,
    ) -> Result<ApiResult<T>> {
        let response_type = opts.response_type;
        let execution = self
            .execute(method, path, body, opts, move |response| {
                json_payload(response, response_type)
            })
            .await?;
        Ok(decode_data(execution.result))
    }

    /// Validates, then drives the exchange through the retry loop.
    ///
    /// `payload` shapes each successful response before normalization.
    async fn execute<P, F>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &RequestOptions,
        payload: F,
    ) -> Result<Execution<P>>
    where
        P: Normalize,
        F: Fn(RawResponse) -> P,
    {
        let exchange = self.prepare(method, path, body, opts)?;
        let policy = opts.retry.apply(&self.options.retry);
        let exchange = &exchange;
        let payload = &payload;
        let execution = retry::run(
            move || async move { exchange.perform().await.map(payload) },
            &policy,
            opts.cancel.as_ref(),
        )
        .await;
        Ok(execution)
    }

    fn prepare(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        opts: &RequestOptions,
    ) -> Result<HttpExchange<'_>> {
        let path = validate_path(path)?;

        let mut headers = BTreeMap::from([(
            "content-type".to_owned(),
            "application/json".to_owned(),
        )]);
        for layer in [&self.auth_headers, &self.options.default_headers, &opts.headers] {
            headers.extend(
                layer
                    .iter()
                    .map(|(name, value)| (name.to_ascii_lowercase(), value.clone())),
            );
        }

        Ok(HttpExchange {
            http: &self.http,
            hooks: self.hooks.as_deref(),
            config: RequestConfig {
                method,
                url: join_url(&self.base_url, path),
                headers,
                params: opts.params.clone(),
                timeout_ms: opts.timeout_ms.unwrap_or(self.options.timeout_ms),
            },
            body,
            cancel: opts.cancel.clone(),
        })
    }
}

fn json_body<B: Serialize + ?Sized>(path: &str, payload: &B) -> Result<RequestBody> {
    validate_path(path)?;
    Ok(RequestBody::Json(serde_json::to_value(payload)?))
}

pub(crate) fn validate_path(path: &str) -> Result<&str> {
    if path.trim().is_empty() {
        return Err(SafeCallError::EmptyPath);
    }
    Ok(path)
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || base_url.is_empty() {
        return path.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}
