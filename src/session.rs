//! Edit Session
//!
//! One editing session: a history, a transform coordinator, and the decoder/provider
//! collaborators. Whoever holds `&mut EditSession` is the session owner; every history mutation,
//! including the application of transform results, happens through it.

use crate::buffer::{Generation, ImageBuffer};
use crate::codec::ImageDecoder;
use crate::config::SessionConfig;
use crate::error::EditError;
use crate::history::EditHistory;
use crate::provider::TransformProvider;
use crate::transform::{
    RequestId, Settled, TransformCoordinator, TransformOp, TransformProgress, TransformRequest,
    TransformStatus,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct EditSession {
    decoder: Arc<dyn ImageDecoder>,
    history: EditHistory,
    coordinator: TransformCoordinator,
    transform_timeout: Option<Duration>,
}

impl EditSession {
    pub fn new(decoder: Arc<dyn ImageDecoder>, provider: Arc<dyn TransformProvider>) -> Self {
        Self {
            decoder,
            history: EditHistory::new(),
            coordinator: TransformCoordinator::new(provider),
            transform_timeout: None,
        }
    }

    pub fn from_config(
        config: &SessionConfig,
        decoder: Arc<dyn ImageDecoder>,
        provider: Arc<dyn TransformProvider>,
    ) -> Self {
        Self::new(decoder, provider).with_transform_timeout(config.transform_timeout())
    }

    /// Bound [`Self::apply_transform_and_wait`]. `None` waits indefinitely.
    pub fn with_transform_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transform_timeout = timeout;
        self
    }

    /// Decode `path` and start a new document with it.
    ///
    /// On a decode failure nothing changes, including any document already open.
    pub fn select(&mut self, path: &Path) -> Result<&ImageBuffer, EditError> {
        let buffer = match self.decoder.decode(path) {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Image import failed");
                return Err(err.into());
            }
        };
        info!(
            path = %path.display(),
            width = buffer.width(),
            height = buffer.height(),
            "Image imported"
        );
        Ok(self.open(buffer))
    }

    /// Start a new document from an already decoded buffer.
    pub fn open(&mut self, buffer: ImageBuffer) -> &ImageBuffer {
        self.history.reset(buffer).buffer()
    }

    pub fn undo(&mut self) -> Result<&ImageBuffer, EditError> {
        self.history.undo().map(|state| state.buffer())
    }

    pub fn redo(&mut self) -> Result<&ImageBuffer, EditError> {
        self.history.redo().map(|state| state.buffer())
    }

    /// Drop every edit and return to the imported image. Starts a new generation, so a pending
    /// transform result will be discarded.
    pub fn reset(&mut self) -> Result<&ImageBuffer, EditError> {
        let floor = self.history.floor()?.buffer().clone();
        Ok(self.history.reset(floor).buffer())
    }

    /// End the document. Any pending transform is abandoned and nothing stays selected.
    pub fn close(&mut self) {
        self.coordinator.cancel();
        self.history.clear();
        info!(generation = %self.history.generation(), "Session closed");
    }

    pub fn current(&self) -> Result<&ImageBuffer, EditError> {
        self.history.current().map(|state| state.buffer())
    }

    /// Submit `op` against the current image. Returns as soon as the provider is started.
    pub fn apply_transform(&mut self, op: TransformOp) -> Result<RequestId, EditError> {
        self.coordinator.submit(op, &self.history)
    }

    /// Abandon the pending transform, if any.
    pub fn cancel_transform(&mut self) -> Option<RequestId> {
        self.coordinator.cancel()
    }

    /// Wait for the next provider completion and apply it. `None` when nothing is outstanding.
    pub async fn next_settled(&mut self) -> Option<Result<Settled, EditError>> {
        let completion = self.coordinator.next_completion().await?;
        Some(self.coordinator.settle(completion, &mut self.history))
    }

    /// Apply a completion if one has already arrived. For polling from a UI loop.
    pub fn try_settle(&mut self) -> Option<Result<Settled, EditError>> {
        let completion = self.coordinator.try_next_completion()?;
        Some(self.coordinator.settle(completion, &mut self.history))
    }

    /// Submit `op` and wait until its own completion has been settled.
    ///
    /// Late completions of older, abandoned requests are settled (and discarded) along the way.
    /// When the configured timeout expires the request is abandoned and the call fails with
    /// [`EditError::TransformFailed`].
    pub async fn apply_transform_and_wait(&mut self, op: TransformOp) -> Result<Settled, EditError> {
        let request_id = self.apply_transform(op)?;
        let limit = self.transform_timeout;
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, self.wait_for(request_id)).await,
            None => Ok(self.wait_for(request_id).await),
        };
        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.coordinator.cancel();
                warn!(request_id = %request_id, "Transform timed out");
                Err(EditError::TransformFailed(format!(
                    "timed out after {}s",
                    limit.map(|d| d.as_secs_f64()).unwrap_or_default()
                )))
            }
        }
    }

    async fn wait_for(&mut self, request_id: RequestId) -> Result<Settled, EditError> {
        loop {
            match self.next_settled().await {
                Some(Ok(settled)) if settled.request_id() == request_id => return Ok(settled),
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(EditError::TransformFailed(format!(
                        "request {} was never completed",
                        request_id
                    )))
                }
            }
        }
    }

    /// Subscribe to intermediate refinements of transforms submitted from now on.
    pub fn progress(&mut self) -> mpsc::UnboundedReceiver<TransformProgress> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.coordinator.set_progress_sink(tx);
        rx
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn generation(&self) -> Generation {
        self.history.generation()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_transform_pending(&self) -> bool {
        self.coordinator.is_pending()
    }

    pub fn transform_status(&self) -> Option<TransformStatus> {
        self.coordinator.status()
    }

    pub fn in_flight(&self) -> Option<&TransformRequest> {
        self.coordinator.in_flight()
    }

    pub fn provider_name(&self) -> &str {
        self.coordinator.provider_name()
    }
}
