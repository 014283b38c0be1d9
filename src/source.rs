// src/source.rs
//! Upstream endpoints: the alert JSON, the ticker feed, the MUF summary and
//! the published version text all come through [`Source`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Status line plus raw body bytes. Bodies are decoded by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let reason = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            reason,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// UTF-8 view of the body; invalid sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    /// Transport failures are `Err`; any HTTP status is `Ok`.
    async fn fetch(&self) -> Result<RawResponse>;
    fn name(&self) -> &'static str;
}

/// Build the shared HTTP client. `timeout_secs == 0` keeps the transport default.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let mut b = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if timeout_secs > 0 {
        b = b.timeout(Duration::from_secs(timeout_secs));
    }
    b.build().context("building http client")
}

/// GET against a fixed URL, optionally behind a CORS proxy prefix.
pub struct HttpSource {
    name: &'static str,
    url: String,
    client: reqwest::Client,
    proxy: String,
    domain: Option<String>,
    cache_bust: bool,
}

impl HttpSource {
    pub fn new(name: &'static str, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name,
            url: url.into(),
            client,
            proxy: String::new(),
            domain: None,
            cache_bust: false,
        }
    }

    pub fn with_proxy(mut self, proxy: &str) -> Self {
        self.proxy = proxy.trim().to_string();
        self
    }

    /// Append `cb=<millis>&domain=<host>` like the dashboard widget does.
    pub fn with_cache_bust(mut self, domain: &str) -> Self {
        self.cache_bust = true;
        self.domain = Some(domain.to_string());
        self
    }

    pub fn request_url(&self, now_ms: i64) -> String {
        let mut url = format!("{}{}", self.proxy, self.url);
        if self.cache_bust {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str(&format!("cb={now_ms}"));
            if let Some(d) = &self.domain {
                url.push_str(&format!("&domain={d}"));
            }
        }
        url
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn fetch(&self) -> Result<RawResponse> {
        let url = self.request_url(chrono::Utc::now().timestamp_millis());
        let resp = self
            .client
            .get(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .with_context(|| format!("{} http get()", self.name))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("{} http body", self.name))?;
        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Canned responses for tests and offline runs. Responses are served in
/// order; the last one repeats forever.
pub struct FixtureSource {
    name: &'static str,
    queue: Mutex<VecDeque<std::result::Result<RawResponse, String>>>,
}

impl FixtureSource {
    pub fn sequence(
        name: &'static str,
        items: Vec<std::result::Result<RawResponse, String>>,
    ) -> Self {
        Self {
            name,
            queue: Mutex::new(items.into()),
        }
    }

    pub fn ok(name: &'static str, body: &str) -> Self {
        Self::sequence(name, vec![Ok(RawResponse::ok(body))])
    }

    pub fn status(name: &'static str, status: u16) -> Self {
        Self::sequence(name, vec![Ok(RawResponse::new(status, ""))])
    }

    pub fn failing(name: &'static str, msg: &str) -> Self {
        Self::sequence(name, vec![Err(msg.to_string())])
    }
}

#[async_trait]
impl Source for FixtureSource {
    async fn fetch(&self) -> Result<RawResponse> {
        let mut q = self.queue.lock().expect("fixture queue poisoned");
        let item = if q.len() > 1 { q.pop_front() } else { q.front().cloned() };
        match item {
            Some(Ok(r)) => Ok(r),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("{}: fixture exhausted", self.name)),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
