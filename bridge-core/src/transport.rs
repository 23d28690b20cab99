use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;

pub const USER_AGENT: &str = concat!("weather-bridge/", env!("CARGO_PKG_VERSION"));

/// One-shot HTTP GET returning the response body as text.
///
/// Implementations must not retry and must not impose their own timeout.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn get(&self, url: &str) -> Result<String>;
}

/// HTTP client shared by every outbound request the bridge makes.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: http_client()?,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to send request to weather service")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read weather service response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Weather service request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        Ok(body)
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
