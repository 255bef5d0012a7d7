//! Authenticated request pipeline
//!
//! Attaches bearer credentials, refreshes an expired token once per failed
//! call, serves GETs through the tiered cache and purges affected cache
//! entries after successful mutations.

use super::credential::CredentialStore;
use super::envelope::interpret;
use crate::cache::{CacheKey, SetOptions, TieredCache};
use crate::invalidation::InvalidationRouter;
use crate::{Result, SyncError};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default TTL for cached GET responses (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query parameters; part of the cache key for GETs
    pub params: Vec<(String, String)>,
    /// Bypass the cache for this GET
    pub skip_cache: bool,
    /// Override the default cache TTL
    pub cache_ttl: Option<Duration>,
    /// Per-request deadline, applied to each attempt
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A file to send as `multipart/form-data`
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Form field carrying the file
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
    /// Extra text fields sent alongside the file
    pub fields: Vec<(String, String)>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            field_name: "file".to_string(),
            file_name: file_name.into(),
            bytes: bytes.into(),
            mime: None,
            fields: Vec::new(),
        }
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Forms are consumed on send, so one is built per attempt
    fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut part =
            reqwest::multipart::Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        if let Some(ref mime) = self.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| SyncError::Other(format!("Invalid MIME type '{}': {}", mime, e)))?;
        }

        let mut form = reqwest::multipart::Form::new().part(self.field_name.clone(), part);
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(Value),
    Multipart(UploadFile),
}

#[derive(Debug, Clone)]
struct PreparedRequest {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    body: Body,
    timeout: Option<Duration>,
}

/// HTTP client for the API
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
    refresh_path: String,
    default_ttl: Duration,
    default_timeout: Option<Duration>,
    credentials: Arc<CredentialStore>,
    cache: Arc<TieredCache>,
    router: Arc<InvalidationRouter>,
}

impl RequestClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<CredentialStore>,
        cache: Arc<TieredCache>,
        router: Arc<InvalidationRouter>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_path: "/auth/refresh".to_string(),
            default_ttl: DEFAULT_CACHE_TTL,
            default_timeout: None,
            credentials,
            cache,
            router,
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Cached read. Identical `(path, params)` pairs share one cache entry.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        let request = PreparedRequest {
            method: Method::GET,
            path: path.to_string(),
            timeout: options.timeout.or(self.default_timeout),
            params: options.params.clone(),
            body: Body::Empty,
        };

        let value = if options.skip_cache {
            self.execute(&request).await?
        } else {
            let key = CacheKey::from_request("GET", path, &options.params);
            let ttl = options.cache_ttl.unwrap_or(self.default_ttl);
            self.cache
                .cached_fetch(key.as_str(), SetOptions::ttl(ttl), || self.execute(&request))
                .await?
        };

        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.mutate(Method::POST, path, Some(serde_json::to_value(body)?), RequestOptions::default())
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.mutate(Method::PUT, path, Some(serde_json::to_value(body)?), RequestOptions::default())
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.mutate(Method::PATCH, path, Some(serde_json::to_value(body)?), RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.mutate(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Multipart POST with the same auth, refresh and invalidation rules as `post`
    pub async fn upload_file<T: DeserializeOwned>(&self, path: &str, file: UploadFile) -> Result<T> {
        let request = PreparedRequest {
            method: Method::POST,
            path: path.to_string(),
            params: Vec::new(),
            body: Body::Multipart(file),
            timeout: self.default_timeout,
        };
        self.finish_mutation(&request).await
    }

    /// Any non-GET verb with explicit options
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<T> {
        let request = PreparedRequest {
            method,
            path: path.to_string(),
            params: options.params,
            body: body.map(Body::Json).unwrap_or(Body::Empty),
            timeout: options.timeout.or(self.default_timeout),
        };
        self.finish_mutation(&request).await
    }

    async fn finish_mutation<T: DeserializeOwned>(&self, request: &PreparedRequest) -> Result<T> {
        let value = self.execute(request).await?;
        let removed = self.router.route_by_url(&self.cache, &request.path);
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            removed,
            "Mutation succeeded"
        );
        Ok(serde_json::from_value(value)?)
    }

    /// Send with the stored token; on 401 refresh once and replay once.
    async fn execute(&self, request: &PreparedRequest) -> Result<Value> {
        let stale = self.credentials.access_token();
        let response = self.send_once(request, stale.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return read_response(response).await;
        }

        tracing::debug!(path = %request.path, "Received 401, refreshing token");
        let token = self
            .credentials
            .refresh_with(stale.as_deref(), |refresh_token| {
                self.call_refresh(stale.clone(), refresh_token)
            })
            .await?;

        let retry = self.send_once(request, Some(&token)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Still unauthorized after refresh");
            self.credentials.expire_session();
            return Err(SyncError::AuthExpired);
        }

        read_response(retry).await
    }

    async fn send_once(
        &self,
        request: &PreparedRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(file) => builder.multipart(file.to_form()?),
        };

        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(request.timeout.unwrap_or_default())
            } else {
                SyncError::Connectivity(e.to_string())
            }
        })
    }

    /// POST the refresh endpoint directly; never goes through `execute`
    async fn call_refresh(
        &self,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<String> {
        let mut builder = self.http.post(self.url(&self.refresh_path));
        if let Some(token) = access_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match refresh_token {
            Some(token) => serde_json::json!({ "refreshToken": token }),
            None => serde_json::json!({}),
        };

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncError::Connectivity(e.to_string()))?;
        let value = read_response(response).await?;

        value
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::Serialization("Refresh response carried no token".into()))
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status().as_u16();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| SyncError::Connectivity(e.to_string()))?;

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => return Err(SyncError::Serialization(e.to_string())),
        }
    };

    interpret(status, body)
}
