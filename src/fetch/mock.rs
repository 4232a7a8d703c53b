//! Canned-response [`HttpClient`] for tests.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, Response, Url};
use std::sync::Mutex;

use super::HttpClient;

/// A request as it reached the transport.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl SentRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Records every request and answers each with the same response.
pub struct MockClient {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: String,
    sent: Mutex<Vec<SentRequest>>,
}

impl MockClient {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let body = req
            .body()
            .and_then(|b| b.as_bytes())
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        self.sent.lock().unwrap().push(SentRequest {
            method: req.method().clone(),
            url: req.url().clone(),
            headers: req.headers().clone(),
            body,
        });

        let mut response = axum::http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            response = response.header(*name, *value);
        }
        Ok(Response::from(response.body(self.body.clone()).unwrap()))
    }
}
