// HTTP clients: relay -> upstream completions API, and chat client -> relay

use anyhow::{Context, Result};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use std::pin::Pin;
use std::time::Duration;

use crate::models::{CompletionRequest, PromptRequest};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Client for the third-party completions endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    url: String,
    client: Client,
}

impl UpstreamClient {
    pub fn new(url: String, connect_timeout: u64) -> Result<Self> {
        // No overall timeout: a stream may legitimately stay open for minutes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { url, client })
    }

    /// Forward an arbitrary JSON body and wait for the full JSON reply.
    ///
    /// The upstream status is not inspected: an error document from upstream
    /// is still valid JSON and is handed back as-is.
    pub async fn forward(&self, api_key: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .context("Failed to send completion request")?;

        tracing::debug!(status = %response.status(), "upstream replied");

        let result = response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse completion response")?;

        Ok(result)
    }

    /// Send a streaming completion request and return the live response,
    /// body unread, for the caller to pipe.
    pub async fn open_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send streaming completion request")?;

        tracing::debug!(status = %response.status(), "upstream stream opened");

        Ok(response)
    }
}

/// Client the terminal UI uses to talk to the relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    relay_url: String,
    client: Client,
}

impl RelayClient {
    pub fn new(relay_url: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { relay_url, client })
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// True if the relay answers its liveness route.
    pub async fn health_check(&self) -> bool {
        let Ok(mut url) = reqwest::Url::parse(&self.relay_url) else {
            return false;
        };
        url.set_path("/healthz");

        self.client
            .get(url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    /// Post the prompt and hand back the raw body as a byte stream.
    pub async fn generate_stream(&self, prompt: &str) -> Result<ByteStream> {
        let request = PromptRequest {
            prompt: prompt.to_string(),
        };

        let response = self
            .client
            .post(&self.relay_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send prompt to relay")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Relay request failed with status {status}: {text}");
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| anyhow::anyhow!("Stream error: {e}")));

        Ok(Box::pin(stream))
    }
}
