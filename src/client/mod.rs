//! HTTP transport issuing classified GitHub API calls.
//!
//! Every call carries `Authorization: Bearer <token>`, the configured `Accept`
//! media type and a `User-Agent`. Non-2xx responses and transport failures are
//! turned into [`GitHubError`]s by the [`ErrorClassifier`](crate::errors::ErrorClassifier);
//! nothing is retried here.

use crate::config::GitHubConfig;
use crate::errors::{GitHubError, GitHubResult, RateLimitInfo};
use crate::observability::TracingHooks;
use crate::pagination::{Page, PaginationLinks, PaginationParams};
use chrono::Utc;
use reqwest::header::{
    HeaderMap, HeaderName, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA, USER_AGENT,
};
use reqwest::{Client, Method, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// GitHub error response format.
#[derive(Debug, serde::Deserialize)]
struct GitHubErrorResponse {
    message: String,
    documentation_url: Option<String>,
}

/// A single API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, String)>,
    body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Creates a request for a path relative to the base URL, or an absolute URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends every field of a serializable parameter struct.
    pub fn params<P: Serialize>(mut self, params: &P) -> GitHubResult<Self> {
        let encoded = serde_urlencoded::to_string(params).map_err(|e| {
            GitHubError::configuration(format!("Failed to serialize parameters: {}", e))
        })?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&encoded).map_err(|e| {
            GitHubError::configuration(format!("Failed to serialize parameters: {}", e))
        })?;
        self.query.extend(pairs);
        Ok(self)
    }

    /// Appends pagination parameters.
    pub fn paginate(mut self, params: &PaginationParams) -> Self {
        self.query.extend(params.to_query());
        self
    }

    /// Adds a request header.
    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json<B: Serialize>(mut self, body: &B) -> GitHubResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            GitHubError::configuration(format!("Failed to serialize request body: {}", e))
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Defeats intermediate caches: a `_t` timestamp parameter plus
    /// no-cache/no-store headers.
    pub fn force_refresh(self) -> Self {
        self.query("_t", Utc::now().timestamp_millis())
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path or absolute URL.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Shared GitHub REST transport.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    config: Arc<GitHubConfig>,
}

impl RestClient {
    /// Creates a new transport.
    pub fn new(config: GitHubConfig) -> GitHubResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool.max_idle_per_host)
            .pool_idle_timeout(config.pool.idle_timeout)
            .build()
            .map_err(|e| GitHubError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Gets the configuration.
    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Resolves a request path against the base URL.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Sends a request and returns the successful response.
    pub async fn execute(&self, token: &SecretString, request: ApiRequest) -> GitHubResult<Response> {
        let url = self.build_url(&request.path);
        let method = request.method.to_string();
        TracingHooks::on_request_start(&method, &url);
        let started = Instant::now();

        let mut builder = self
            .http
            .request(request.method, &url)
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()))
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, &self.config.accept);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(bytes) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = GitHubError::transport(e);
                TracingHooks::on_request_error(&method, &url, &error.to_string());
                return Err(error);
            }
        };

        let status = response.status();
        TracingHooks::on_request_complete(&method, &url, status.as_u16(), started.elapsed());

        if !status.is_success() {
            let error = Self::handle_error_response(response).await;
            if let Some(info) = error.rate_limit().filter(|info| info.is_exhausted()) {
                TracingHooks::on_rate_limit_exceeded(info);
            }
            return Err(error);
        }

        Ok(response)
    }

    /// Sends a request and deserializes the JSON body.
    pub async fn send<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        request: ApiRequest,
    ) -> GitHubResult<T> {
        let response = self.execute(token, request).await?;
        Self::parse_body(response).await
    }

    /// Sends a request and returns the body together with the response headers.
    pub async fn send_with_headers<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        request: ApiRequest,
    ) -> GitHubResult<(T, HeaderMap)> {
        let response = self.execute(token, request).await?;
        let headers = response.headers().clone();
        let body = Self::parse_body(response).await?;
        Ok((body, headers))
    }

    /// Sends a list request and returns one page with its `Link` pagination.
    pub async fn send_page<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        request: ApiRequest,
    ) -> GitHubResult<Page<T>> {
        let response = self.execute(token, request).await?;
        let links = PaginationLinks::from_headers(response.headers());
        let items: Vec<T> = Self::parse_body(response).await?;
        Ok(Page::new(items, links))
    }

    /// Sends a request, ignoring the body, and returns the success status.
    pub async fn send_status(
        &self,
        token: &SecretString,
        request: ApiRequest,
    ) -> GitHubResult<StatusCode> {
        Ok(self.execute(token, request).await?.status())
    }

    /// Makes a GET request.
    pub async fn get<T: DeserializeOwned>(&self, token: &SecretString, path: &str) -> GitHubResult<T> {
        self.send(token, ApiRequest::get(path)).await
    }

    /// Makes a POST request.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        token: &SecretString,
        path: &str,
        body: &B,
    ) -> GitHubResult<T> {
        self.send(token, ApiRequest::post(path).json(body)?).await
    }

    /// Makes a PUT request.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        token: &SecretString,
        path: &str,
        body: &B,
    ) -> GitHubResult<T> {
        self.send(token, ApiRequest::put(path).json(body)?).await
    }

    /// Makes a PATCH request.
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        token: &SecretString,
        path: &str,
        body: &B,
    ) -> GitHubResult<T> {
        self.send(token, ApiRequest::patch(path).json(body)?).await
    }

    async fn parse_body<T: DeserializeOwned>(response: Response) -> GitHubResult<T> {
        response.json().await.map_err(|e| {
            GitHubError::deserialization(format!("Failed to deserialize response: {}", e))
        })
    }

    async fn handle_error_response(response: Response) -> GitHubError {
        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());
        let request_id = response
            .headers()
            .get("x-github-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let error_body = response.json::<GitHubErrorResponse>().await.ok();

        let message = error_body
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| format!("HTTP {} error", status.as_u16()));
        let documentation_url = error_body.and_then(|e| e.documentation_url);

        GitHubError::from_response(status.as_u16(), message, documentation_url, request_id, rate_limit)
    }
}

/// Percent-encodes each segment of a repository path, keeping the separators.
pub fn encode_repo_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
