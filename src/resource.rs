use std::fmt;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

use crate::{ApiResult, RequestOptions, Result, SafeCallClient, SafeCallError};

/// CRUD operations derived from a base path such as `/users`.
///
/// ```no_run
/// use safecall_http::SafeCallClient;
/// use serde_json::Value;
///
/// # async fn example() -> safecall_http::Result<()> {
/// let users = SafeCallClient::new("https://api.example.com").resource("/users");
/// let page = users.list::<Value>(&[("page", "2")]).await?;
/// let one = users.get::<Value>(42).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Resource {
    client: SafeCallClient,
    base: String,
    options: RequestOptions,
}

impl Resource {
    pub(crate) fn new(client: SafeCallClient, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
            options: RequestOptions::default(),
        }
    }

    /// Options applied to every call made through this resource.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base
    }

    /// `GET base?query`.
    pub async fn list<T: DeserializeOwned>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<ApiResult<Vec<T>>> {
        let opts = self.options.clone().params(query.iter().copied());
        self.client.get_many(&self.base, opts).await
    }

    /// `GET base/id`.
    pub async fn get<T: DeserializeOwned>(&self, id: impl fmt::Display) -> Result<ApiResult<T>> {
        let path = self.member_path(id)?;
        self.client.get_one(&path, self.options.clone()).await
    }

    /// `POST base`.
    pub async fn create<T, B>(&self, payload: &B) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.client
            .post(&self.base, payload, self.options.clone())
            .await
    }

    /// `PUT base/id`.
    pub async fn update<T, B>(&self, id: impl fmt::Display, payload: &B) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = self.member_path(id)?;
        self.client.put(&path, payload, self.options.clone()).await
    }

    /// `PATCH base/id`.
    pub async fn patch<T, B>(&self, id: impl fmt::Display, payload: &B) -> Result<ApiResult<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let path = self.member_path(id)?;
        self.client.patch(&path, payload, self.options.clone()).await
    }

    /// `DELETE base/id`.
    pub async fn remove<T: DeserializeOwned>(&self, id: impl fmt::Display) -> Result<ApiResult<T>> {
        let path = self.member_path(id)?;
        self.client.remove(&path, self.options.clone()).await
    }

    /// `POST base/subpath` with a payload, `GET base/subpath` without one.
    pub async fn action<T: DeserializeOwned>(
        &self,
        subpath: &str,
        payload: Option<&JsonValue>,
    ) -> Result<ApiResult<T>> {
        let path = self.action_path(subpath)?;
        match payload {
            Some(payload) => self.client.post(&path, payload, self.options.clone()).await,
            None => self.client.get_one(&path, self.options.clone()).await,
        }
    }

    fn member_path(&self, id: impl fmt::Display) -> Result<String> {
        let id = id.to_string();
        if id.trim().is_empty() {
            return Err(SafeCallError::EmptyId);
        }
        Ok(join_path(&self.base, &id))
    }

    fn action_path(&self, subpath: &str) -> Result<String> {
        if subpath.trim().is_empty() {
            return Err(SafeCallError::EmptySubpath);
        }
        Ok(join_path(&self.base, subpath))
    }
}

fn join_path(base: &str, segment: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        segment.trim_start_matches('/')
    )
}
