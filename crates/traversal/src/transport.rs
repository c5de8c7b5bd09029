//! HTTP transport seam
//!
//! Traversals never talk to `reqwest` directly. They go through [`Transport`],
//! so tests can inject an in-memory implementation and callers can supply a
//! preconfigured client.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::error::TransportError;

/// Method, headers and body sent along with a request URL.
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response body that has not been read yet. Dropping it cancels the read.
pub trait TransportBody: Send {
    fn bytes(self: Box<Self>) -> BoxFuture<'static, Result<Bytes, TransportError>>;
}

/// Response after redirects were followed.
pub struct TransportResponse {
    pub status: u16,
    /// URL after following HTTP redirects.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Box<dyn TransportBody>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub trait Transport: Send + Sync {
    /// Sends the request, following HTTP redirects.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        init: &'a RequestInit,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

struct ReqwestBody(reqwest::Response);

impl TransportBody for ReqwestBody {
    fn bytes(self: Box<Self>) -> BoxFuture<'static, Result<Bytes, TransportError>> {
        async move {
            self.0
                .bytes()
                .await
                .map_err(|e| TransportError::Body(e.to_string()))
        }
        .boxed()
    }
}

impl Transport for ReqwestTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        init: &'a RequestInit,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        async move {
            let mut request = self
                .client
                .request(init.method.clone(), url)
                .headers(init.headers.clone());
            if let Some(body) = &init.body {
                request = request.body(body.clone());
            }

            let response = request.send().await?;
            log::debug!("{} {} -> {}", init.method, url, response.status());

            Ok(TransportResponse {
                status: response.status().as_u16(),
                url: response.url().to_string(),
                headers: response.headers().clone(),
                body: Box::new(ReqwestBody(response)),
            })
        }
        .boxed()
    }
}
