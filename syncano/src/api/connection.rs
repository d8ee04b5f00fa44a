//! Authenticated access to the Syncano API
//!
//! [`Connection`] owns the transport and the account key. It normalizes
//! request paths against the configured host, injects default headers, and
//! maps response status codes onto [`Error`].

use arc_swap::ArcSwapOption;
use log::debug;
use once_cell::sync::Lazy;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::config::ConnectionConfig;
use super::error::{Error, Result};
use super::transport::{HttpRequest, Method, ReqwestTransport, Transport};

/// Path used to exchange email/password for an account key
pub const AUTH_SUFFIX: &str = "v1/account/auth";

/// Default content type for every request
pub const CONTENT_TYPE: &str = "application/json";

/// Anything that names an HTTP verb
pub trait IntoMethod {
    fn into_method(self) -> Result<Method>;
}

impl IntoMethod for Method {
    fn into_method(self) -> Result<Method> {
        Ok(self)
    }
}

impl IntoMethod for &str {
    fn into_method(self) -> Result<Method> {
        self.parse()
    }
}

impl IntoMethod for String {
    fn into_method(self) -> Result<Method> {
        self.parse()
    }
}

/// Per-request options; unset values fall back to connection defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query-string parameters; non-string values are JSON-encoded
    pub params: Option<Map<String, Value>>,
    /// Request body; strings are sent verbatim, everything else as JSON
    pub data: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn is_success(code: u16) -> bool {
    (200..=299).contains(&code)
}

fn is_client_error(code: u16) -> bool {
    (400..=499).contains(&code)
}

fn is_server_error(code: u16) -> bool {
    (500..=599).contains(&code)
}

/// Connection to one Syncano API root
#[derive(Debug)]
pub struct Connection {
    host: String,
    email: Option<String>,
    password: Option<String>,
    api_key: ArcSwapOption<String>,
    timeout: Duration,
    verify_ssl: bool,
    debug: bool,
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Open a connection backed by reqwest
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Open a connection over a custom transport
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            host: config.host,
            email: config.email,
            password: config.password,
            api_key: ArcSwapOption::new(config.api_key.map(Arc::new)),
            timeout: config.timeout,
            verify_ssl: config.verify_ssl,
            debug: config.debug,
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key.load_full().map(|key| key.as_ref().clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.load().is_some()
    }

    /// Exchange email/password for an account key
    ///
    /// Returns the stored key without a network call when already
    /// authenticated. Missing arguments fall back to the configured
    /// credentials.
    pub async fn authenticate(&self, email: Option<&str>, password: Option<&str>) -> Result<String> {
        if let Some(key) = self.api_key() {
            debug!("Connection already authenticated: {}", mask(&key));
            return Ok(key);
        }

        let email = email
            .filter(|e| !e.is_empty())
            .or(self.email.as_deref())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::validation("\"email\" is required."))?;
        let password = password
            .filter(|p| !p.is_empty())
            .or(self.password.as_deref())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::validation("\"password\" is required."))?;

        debug!("Authenticating: {}", email);

        let data = json!({"email": email, "password": password});
        let response = self
            .make_request(Method::Post, AUTH_SUFFIX, RequestOptions::new().data(data))
            .await?;

        let account_key = response
            .get("account_key")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::request(200, json!("Authentication response did not include an account key."))
            })?
            .to_string();

        self.api_key.store(Some(Arc::new(account_key.clone())));

        debug!("Authentication successful: {}", mask(&account_key));
        Ok(account_key)
    }

    /// Authenticate if needed, then send the request
    pub async fn request(
        &self,
        method: impl IntoMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value> {
        if !self.is_authenticated() {
            self.authenticate(None, None).await?;
        }

        self.make_request(method, path, options).await
    }

    /// Send a request without ensuring authentication first
    pub async fn make_request(
        &self,
        method: impl IntoMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value> {
        let request = self.build_request(method.into_method()?, path, options)?;

        if self.debug {
            debug!("Request: {} {}\n{}", request.method, path, dump_request(&request));
        }

        let url = request.url.clone();
        let response = self.transport.send(request).await?;

        let content = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| Value::String(response.body.clone()));

        if is_server_error(response.status) {
            return Err(Error::request(response.status, json!("Server error.")));
        }

        // Validation error
        if is_client_error(response.status) {
            return Err(Error::request(response.status, content));
        }

        if !is_success(response.status) {
            debug!("Request Error: {}", url);
            debug!("Status code: {}", response.status);
            debug!("Response: {}", content);
            return Err(Error::request(response.status, content));
        }

        Ok(content)
    }

    fn build_request(&self, method: Method, path: &str, options: RequestOptions) -> Result<HttpRequest> {
        let mut headers = options.headers;

        if !headers.contains_key("content-type") {
            headers.insert("content-type".to_string(), CONTENT_TYPE.to_string());
        }

        if let Some(key) = self.api_key.load_full() {
            headers
                .entry("Authorization".to_string())
                .or_insert_with(|| format!("ApiKey {}", key));
        }

        let query = options
            .params
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name, value)
            })
            .collect();

        let body = options.data.map(|data| match data {
            Value::String(s) => s,
            other => other.to_string(),
        });

        Ok(HttpRequest {
            method,
            url: self.build_url(path)?,
            headers,
            query,
            body,
            timeout: options.timeout.unwrap_or(self.timeout),
            // Certificates are not checked in debug mode
            verify_ssl: self.verify_ssl && !self.debug,
        })
    }

    /// Turn a request path into an absolute URL
    ///
    /// Paths already prefixed with the host are returned unchanged. Relative
    /// paths gain a trailing slash and lose any leading one; the query string
    /// survives normalization.
    pub fn build_url(&self, path: &str) -> Result<String> {
        if path.starts_with(&self.host) {
            return Ok(path.to_string());
        }

        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path, None),
        };

        let mut path = path.to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        let mut path = path.strip_prefix('/').unwrap_or(&path).to_string();

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            path = format!("{}?{}", path, query);
        }

        let base = reqwest::Url::parse(&self.host)
            .map_err(|e| Error::validation(format!("Invalid host {}: {}", self.host, e)))?;
        let url = base
            .join(&path)
            .map_err(|e| Error::validation(format!("Invalid path {}: {}", path, e)))?;

        Ok(url.to_string())
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}***", visible)
}

fn dump_request(request: &HttpRequest) -> String {
    let headers: Map<String, Value> = request
        .headers
        .iter()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case("authorization") {
                mask(value)
            } else {
                value.clone()
            };
            (name.clone(), Value::String(value))
        })
        .collect();

    let params = json!({
        "url": request.url,
        "headers": headers,
        "params": request.query,
        "data": request.body,
        "timeout": request.timeout.as_secs_f64(),
        "verify": request.verify_ssl,
    });

    serde_json::to_string_pretty(&params).unwrap_or_default()
}

/// Process-wide default connection
///
/// The first connection opened through [`DefaultConnection::open`] becomes
/// the default; later ones are returned but not installed.
#[derive(Debug, Default)]
pub struct DefaultConnection {
    connection: ArcSwapOption<Connection>,
}

static DEFAULT_CONNECTION: Lazy<DefaultConnection> = Lazy::new(DefaultConnection::default);

/// Access the process-wide default connection service
pub fn default_connection() -> &'static DefaultConnection {
    &DEFAULT_CONNECTION
}

impl DefaultConnection {
    /// Currently installed default connection
    pub fn get(&self) -> Result<Arc<Connection>> {
        self.connection
            .load_full()
            .ok_or_else(|| Error::validation("Please open new connection."))
    }

    /// Open a reqwest-backed connection, installing it if no default exists
    pub fn open(&self, config: ConnectionConfig) -> Result<Arc<Connection>> {
        let connection = Arc::new(Connection::new(config)?);
        Ok(self.install(connection))
    }

    /// Install an already built connection if no default exists
    pub fn install(&self, connection: Arc<Connection>) -> Arc<Connection> {
        self.connection
            .compare_and_swap(&None::<Arc<Connection>>, Some(connection.clone()));
        connection
    }

    pub fn is_open(&self) -> bool {
        self.connection.load().is_some()
    }

    /// Drop the installed default
    pub fn reset(&self) {
        self.connection.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::MockTransport;

    fn connection(transport: Arc<MockTransport>, api_key: Option<&str>) -> Connection {
        let mut builder = ConnectionConfig::builder()
            .host("https://api.example.com/")
            .email("dev@example.com")
            .password("secret");
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        Connection::with_transport(builder.build(), transport)
    }

    #[test]
    fn test_build_url() {
        let conn = connection(MockTransport::new(), None);

        assert_eq!(conn.build_url("objects").unwrap(), "https://api.example.com/objects/");
        assert_eq!(conn.build_url("/objects").unwrap(), "https://api.example.com/objects/");
        assert_eq!(
            conn.build_url("https://api.example.com/objects/").unwrap(),
            "https://api.example.com/objects/"
        );
        assert_eq!(
            conn.build_url("objects?page=2").unwrap(),
            "https://api.example.com/objects/?page=2"
        );
        assert_eq!(
            conn.build_url("https://api.example.com/objects/?page=2").unwrap(),
            "https://api.example.com/objects/?page=2"
        );
    }

    #[tokio::test]
    async fn test_authenticate_stores_key() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"account_key": "k-123"}));
        let conn = connection(transport.clone(), None);

        assert!(!conn.is_authenticated());
        let key = conn.authenticate(None, None).await.unwrap();
        assert_eq!(key, "k-123");
        assert!(conn.is_authenticated());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].url, "https://api.example.com/v1/account/auth/");
        let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"email": "dev@example.com", "password": "secret"}));
        assert!(!requests[0].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_authenticate_twice_is_free() {
        let transport = MockTransport::new();
        let conn = connection(transport.clone(), Some("existing"));

        assert_eq!(conn.authenticate(None, None).await.unwrap(), "existing");
        assert_eq!(conn.authenticate(None, None).await.unwrap(), "existing");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_authenticate_requires_credentials() {
        let transport = MockTransport::new();
        let conn = Connection::with_transport(
            ConnectionConfig::builder().host("https://api.example.com/").build(),
            transport.clone(),
        );

        let err = conn.authenticate(None, Some("secret")).await.unwrap_err();
        assert_eq!(err.to_string(), "\"email\" is required.");

        let err = conn.authenticate(Some("dev@example.com"), None).await.unwrap_err();
        assert_eq!(err.to_string(), "\"password\" is required.");
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_request_injects_headers() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({"name": "i1"}));
        let conn = connection(transport.clone(), Some("abc"));

        let params = Map::from_iter([
            ("page_size".to_string(), json!(10)),
            ("order_by".to_string(), json!("name")),
        ]);
        let body = conn
            .request("get", "v1/instances/i1", RequestOptions::new().params(params))
            .await
            .unwrap();
        assert_eq!(body, json!({"name": "i1"}));

        let request = &transport.requests()[0];
        assert_eq!(request.headers["Authorization"], "ApiKey abc");
        assert_eq!(request.headers["content-type"], "application/json");
        assert!(request.query.contains(&("page_size".to_string(), "10".to_string())));
        assert!(request.query.contains(&("order_by".to_string(), "name".to_string())));
        assert_eq!(request.timeout, Duration::from_secs(30));
        assert!(request.verify_ssl);
    }

    #[tokio::test]
    async fn test_explicit_headers_win() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({}));
        let conn = connection(transport.clone(), Some("abc"));

        let options = RequestOptions::new()
            .header("Authorization", "ApiKey other")
            .header("content-type", "text/plain")
            .data(json!("raw body"));
        conn.request(Method::Post, "v1/echo", options).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.headers["Authorization"], "ApiKey other");
        assert_eq!(request.headers["content-type"], "text/plain");
        assert_eq!(request.body.as_deref(), Some("raw body"));
    }

    #[tokio::test]
    async fn test_debug_disables_ssl_verification() {
        let transport = MockTransport::new();
        transport.push_json(200, json!({}));
        let conn = Connection::with_transport(
            ConnectionConfig::builder()
                .host("https://api.example.com/")
                .api_key("abc")
                .debug(true)
                .build(),
            transport.clone(),
        );

        conn.request(Method::Get, "v1/instances", RequestOptions::new())
            .await
            .unwrap();
        assert!(!transport.requests()[0].verify_ssl);
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let transport = MockTransport::new();
        let conn = connection(transport.clone(), Some("abc"));

        let err = conn
            .request("TRACE", "v1/instances", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_response_classification() {
        let transport = MockTransport::new();
        transport.push_json(500, json!({"detail": "boom"}));
        transport.push_json(400, json!({"name": ["required"]}));
        transport.push_raw(302, "moved");
        transport.push_raw(200, "plain text");
        let conn = connection(transport.clone(), Some("abc"));

        let err = conn.request(Method::Get, "a", RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(matches!(err, Error::Request { ref body, .. } if body == &json!("Server error.")));

        let err = conn.request(Method::Get, "b", RequestOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::Request { status: 400, ref body } if body == &json!({"name": ["required"]})));

        let err = conn.request(Method::Get, "c", RequestOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::Request { status: 302, ref body } if body == &json!("moved")));

        let body = conn.request(Method::Get, "d", RequestOptions::new()).await.unwrap();
        assert_eq!(body, json!("plain text"));
    }

    #[test]
    fn test_default_connection_lifecycle() {
        let service = DefaultConnection::default();
        assert!(service.get().is_err());

        let first = Arc::new(connection(MockTransport::new(), Some("one")));
        let second = Arc::new(connection(MockTransport::new(), Some("two")));

        service.install(first.clone());
        let returned = service.install(second.clone());

        assert!(Arc::ptr_eq(&returned, &second));
        assert!(Arc::ptr_eq(&service.get().unwrap(), &first));

        service.reset();
        assert!(!service.is_open());
        assert_eq!(service.get().unwrap_err().to_string(), "Please open new connection.");
    }
}
