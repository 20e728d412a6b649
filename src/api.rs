use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::bridge::{Reply, Transport};
use crate::error::BridgeError;

/// reqwest transport for the chatbot backend.
///
/// Cookies persist across requests, so the session set by `/login` rides
/// along on later `/chat` calls.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        let client = Client::builder().cookie_store(true).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET helper for the read-only endpoints (menu, history, bills).
    #[cfg(test)]
    pub async fn get(&self, path: &str) -> Result<Reply, BridgeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(Reply { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: Value) -> Result<Reply, BridgeError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!("POST {} -> {}", url, status);

        Ok(Reply { status, body })
    }
}
