//! Authenticated HTTP access to Jira Cloud
//!
//! Every call goes through [`JiraClient::request`] (or the multipart variant),
//! which attaches basic auth, applies the per-call timeout, logs the outcome,
//! and maps non-2xx statuses onto [`FacadeError`]. Nothing is retried.

use crate::config::{JiraConfig, Timeouts};
use crate::{FacadeError, Result};
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Jira REST client
#[derive(Debug, Clone)]
pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
    timeouts: Timeouts,
}

impl JiraClient {
    /// Create a new client from startup configuration
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &JiraConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            timeouts: config.timeouts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Perform one authenticated JSON call.
    ///
    /// `path` is relative to the instance root (`/rest/api/3/...`) or an
    /// absolute URL on the same host. Reads use the `get` timeout, everything
    /// else the `write` timeout.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let timeout = if method == Method::GET {
            self.timeouts.get
        } else {
            self.timeouts.write
        };
        self.request_with_timeout(method, path, query, body, timeout)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let url = self.url_for(path)?;
        let mut request = self.authed(method.clone(), &url).timeout(timeout);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(&method, path, request).await
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    /// GET and decode into a typed payload
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let value = self.get(path, query).await?;
        decode(path, value)
    }

    /// Multipart POST (attachments). Jira rejects these without
    /// `X-Atlassian-Token: no-check`.
    pub async fn upload(&self, path: &str, form: Form) -> Result<Value> {
        let url = self.url_for(path)?;
        let request = self
            .authed(Method::POST, &url)
            .header("X-Atlassian-Token", "no-check")
            .timeout(self.timeouts.write)
            .multipart(form);
        self.execute(&Method::POST, path, request).await
    }

    fn authed(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
    }

    /// Resolve `path` against the base URL. Absolute URLs are only accepted
    /// when scheme, host (any case) and port match the configured instance.
    fn url_for(&self, path: &str) -> Result<String> {
        if !(path.starts_with("http://") || path.starts_with("https://")) {
            return Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')));
        }

        let target = Url::parse(path)
            .map_err(|e| FacadeError::Validation(format!("Invalid URL {}: {}", path, e)))?;
        let base = Url::parse(&self.base_url)
            .map_err(|e| FacadeError::Config(format!("Invalid base URL {}: {}", self.base_url, e)))?;

        if same_origin(&base, &target) {
            Ok(target.into())
        } else {
            Err(FacadeError::Validation(format!(
                "Refusing to call URL outside {}: {}",
                self.base_url, path
            )))
        }
    }

    async fn execute(&self, method: &Method, path: &str, request: RequestBuilder) -> Result<Value> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "Jira request failed");
                return Err(FacadeError::Transport(e));
            }
        };

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                "Jira request returned error status"
            );
            return Err(FacadeError::from_status(status.as_u16(), path, &body).unwrap_or(
                FacadeError::Remote {
                    status: status.as_u16(),
                    body,
                },
            ));
        }

        debug!(method = %method, path = %path, status = status.as_u16(), "Jira request complete");

        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&body)
            .map_err(|e| FacadeError::InvalidResponse(format!("{} {}: {}", method, path, e)))
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    let host = |u: &Url| u.host_str().map(str::to_ascii_lowercase);
    a.scheme() == b.scheme()
        && host(a) == host(b)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Decode a JSON payload, blaming the remote for shape mismatches
pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| FacadeError::InvalidResponse(format!("{}: {}", path, e)))
}
