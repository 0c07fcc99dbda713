use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::sync::Arc;
use std::time::Duration;

/// A response reduced to what the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
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

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes a GET request with the given headers.
///
/// `Err` means the request never produced a status (connection refused,
/// timeout, TLS failure). Non-2xx statuses are returned as `Ok`.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        (**self).get(url, headers)
    }
}

/// Blocking reqwest transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("rentman-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("rentman-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let resp = self
            .http
            .get(url)
            .headers(headers.clone())
            .send()
            .with_context(|| format!("could not connect to {}", url))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .with_context(|| format!("failed to read response body from {}", url))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(500, "").is_success());
    }
}
