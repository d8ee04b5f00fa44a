//! HTTP transport boundary
//!
//! The connection builds a fully resolved [`HttpRequest`] and hands it to a
//! [`Transport`]. [`ReqwestTransport`] is the production implementation.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use super::error::Error;

/// HTTP verbs understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(Error::validation(format!("Invalid request method: {}.", s))),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved request handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Extra query-string pairs appended to `url`
    pub query: Vec<(String, String)>,
    /// Already JSON-encoded body
    pub body: Option<String>,
    pub timeout: Duration,
    pub verify_ssl: bool,
}

/// Raw response as seen by the connection
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Anything able to send an [`HttpRequest`]
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// reqwest-backed transport
///
/// Certificate checks are a client-level setting in reqwest, so two clients
/// are kept and picked per request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    insecure_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let insecure_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build HTTP client without certificate checks")?;

        Ok(Self {
            client,
            insecure_client,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let client = if request.verify_ssl {
            &self.client
        } else {
            &self.insecure_client
        };

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method, request.url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", request.url))?;

        Ok(HttpResponse { status, body })
    }
}
