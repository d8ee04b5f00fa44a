//! In-process transport for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::config::ConnectionConfig;
use super::connection::Connection;
use super::transport::{HttpRequest, HttpResponse, Transport};

pub const TEST_HOST: &str = "https://api.example.com/";

/// Records every request and replays queued responses in order
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push_raw(status, body.to_string());
    }

    pub fn push_raw(&self, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(HttpResponse::new(status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no response queued for {}", url))
    }
}

/// Authenticated connection against [`TEST_HOST`]
pub fn connection(transport: Arc<MockTransport>) -> Arc<Connection> {
    let config = ConnectionConfig::builder()
        .host(TEST_HOST)
        .api_key("test-key")
        .build();
    Arc::new(Connection::with_transport(config, transport))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
