//! Transform Provider Abstraction
//!
//! Interface to the external capability that computes an image transform (background removal).
//! A provider yields a finite stream of progressively refined buffers; only the terminal element
//! is a result, earlier ones are previews.

use crate::buffer::ImageBuffer;
use crate::error::ProviderError;
use crate::transform::TransformOp;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

pub mod http;

pub use http::HttpBackgroundRemover;

/// Progressive refinements ending in the final result or an error
pub type TransformStream = Pin<Box<dyn Stream<Item = Result<ImageBuffer, ProviderError>> + Send>>;

/// Transform provider client trait
#[async_trait]
pub trait TransformProvider: Send + Sync {
    /// Start a transform of `input`. The returned stream is consumed to its last element.
    async fn run(&self, op: TransformOp, input: ImageBuffer)
        -> Result<TransformStream, ProviderError>;

    /// Get the provider name
    fn name(&self) -> &str;
}

type TransformFn =
    dyn Fn(TransformOp, ImageBuffer) -> Result<Vec<ImageBuffer>, ProviderError> + Send + Sync;

/// Provider backed by a blocking closure, run on the blocking thread pool.
///
/// Each returned buffer becomes one stream element, in order.
pub struct FnProvider {
    name: String,
    func: Arc<TransformFn>,
}

impl FnProvider {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(TransformOp, ImageBuffer) -> Result<Vec<ImageBuffer>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl TransformProvider for FnProvider {
    async fn run(
        &self,
        op: TransformOp,
        input: ImageBuffer,
    ) -> Result<TransformStream, ProviderError> {
        let func = Arc::clone(&self.func);
        let outputs = tokio::task::spawn_blocking(move || func(op, input))
            .await
            .map_err(|e| ProviderError::Failed(format!("Provider task failed: {}", e)))??;
        Ok(Box::pin(futures::stream::iter(outputs.into_iter().map(Ok))))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// HTTP provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Background-removal endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Sent as the `X-Api-Key` header when set
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!(
                    "Endpoint must start with http:// or https://, got '{}'",
                    endpoint
                ));
            }
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Copy with the API key masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            api_key: self.api_key.as_ref().map(|_| "********".to_string()),
            ..self.clone()
        }
    }
}
