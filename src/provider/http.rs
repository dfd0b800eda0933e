//! HTTP background-removal provider.
//!
//! Uploads the input as a PNG in the multipart field `image_file` and decodes the response body
//! as the single, final result.

use super::{ProviderConfig, TransformProvider, TransformStream};
use crate::buffer::ImageBuffer;
use crate::codec;
use crate::error::ProviderError;
use crate::transform::TransformOp;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "X-Api-Key";

fn map_http_error(error: reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        match status.as_u16() {
            401 | 403 => ProviderError::AuthFailed(format!("Authentication failed: {}", error)),
            429 => ProviderError::RateLimit(format!("Rate limit exceeded: {}", error)),
            _ => ProviderError::RequestFailed(format!(
                "Request failed with status {}: {}",
                status, error
            )),
        }
    } else if error.is_timeout() {
        ProviderError::Timeout(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ProviderError::RequestFailed(format!("Connection error: {}", error))
    } else {
        ProviderError::Failed(format!("HTTP error: {}", error))
    }
}

pub struct HttpBackgroundRemover {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpBackgroundRemover {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ProviderError::NotConfigured("provider.endpoint is not set".to_string())
        })?;
        config.validate().map_err(ProviderError::NotConfigured)?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Failed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TransformProvider for HttpBackgroundRemover {
    async fn run(
        &self,
        op: TransformOp,
        input: ImageBuffer,
    ) -> Result<TransformStream, ProviderError> {
        match op {
            TransformOp::AutoRemoveBackground => {}
        }

        let png = codec::encode_png(&input)
            .map_err(|e| ProviderError::Failed(format!("Failed to encode input: {}", e)))?;
        let part = Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        let form = Form::new().part("image_file", part).text("size", "auto");

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        debug!(endpoint = %self.endpoint, op = %op, "Sending transform request");
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(map_http_error)?;
        let body = response.bytes().await.map_err(map_http_error)?;
        let output = codec::decode_bytes(&body)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(Box::pin(futures::stream::once(async move { Ok(output) })))
    }

    fn name(&self) -> &str {
        "http"
    }
}
