use crate::config::UpstreamConfig;
use crate::relay::error::{RelayError, RelayResult};
use crate::types::GenerateContentRequest;
use bytes::Bytes;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::IgnoredAny;
use tracing::debug;

/// Status and raw JSON body returned by upstream
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Bytes,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> RelayResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RelayError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// `generateContent` URL for the configured model, without the key
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.model
        )
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one `generateContent` call. No retries.
    ///
    /// The body must decode as JSON whatever the status; it is returned as
    /// received so it can be forwarded unchanged.
    pub async fn generate_content(
        &self,
        credential: &SecretString,
        payload: &GenerateContentRequest,
    ) -> RelayResult<UpstreamReply> {
        let url = self.endpoint();
        debug!("Making POST request to {} with API key (redacted)", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", credential.expose_secret())])
            .json(payload)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamFailed {
                source: e.without_url(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::UpstreamFailed {
                source: e.without_url(),
            })?;

        serde_json::from_slice::<IgnoredAny>(&body)
            .map_err(|source| RelayError::UpstreamDecode { source })?;

        debug!("Received response from upstream. Status: {}", status);

        Ok(UpstreamReply { status, body })
    }
}
