//! In-memory transport for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::TransportError;
use crate::transport::{RequestInit, Transport, TransportBody, TransportResponse};

#[derive(Debug, Clone)]
pub struct StubResponse {
    status: u16,
    terminal_url: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl StubResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            terminal_url: None,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
            failure: None,
        }
    }

    pub fn ok(content_type: &str, body: impl Into<String>) -> Self {
        Self::status(200)
            .header("content-type", content_type)
            .body(body)
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::ok("text/html; charset=utf-8", body)
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::status(0)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into());
        self
    }

    /// Pretends HTTP redirects ended at `url`.
    pub fn redirected_to(mut self, url: &str) -> Self {
        self.terminal_url = Some(url.to_string());
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct StubBody {
    bytes: Bytes,
    reads: Arc<AtomicUsize>,
}

impl TransportBody for StubBody {
    fn bytes(self: Box<Self>) -> BoxFuture<'static, Result<Bytes, TransportError>> {
        async move {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.bytes)
        }
        .boxed()
    }
}

/// Serves canned responses by exact URL and counts body reads.
#[derive(Default)]
pub struct StubTransport {
    routes: HashMap<String, StubResponse>,
    body_reads: Arc<AtomicUsize>,
    requests: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, response: StubResponse) -> Self {
        self.routes.insert(url.to_string(), response);
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn body_reads(&self) -> usize {
        self.body_reads.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for StubTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _init: &'a RequestInit,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        async move {
            self.requests.lock().unwrap().push(url.to_string());
            let route = self
                .routes
                .get(url)
                .ok_or_else(|| TransportError::Request(format!("no route for {url}")))?;

            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &route.failure {
                return Err(TransportError::Request(message.clone()));
            }

            let mut headers = HeaderMap::new();
            for (name, value) in &route.headers {
                headers.append(
                    HeaderName::from_bytes(name.as_bytes()).unwrap(),
                    HeaderValue::from_str(value).unwrap(),
                );
            }

            Ok(TransportResponse {
                status: route.status,
                url: route.terminal_url.clone().unwrap_or_else(|| url.to_string()),
                headers,
                body: Box::new(StubBody {
                    bytes: route.body.clone(),
                    reads: Arc::clone(&self.body_reads),
                }),
            })
        }
        .boxed()
    }
}
