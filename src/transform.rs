//! Transform Coordinator
//!
//! Runs one asynchronous transform at a time against the current image state. `submit` captures
//! the current buffer and generation, spawns the provider on the tokio runtime and returns at
//! once. The provider's terminal outcome is delivered back over a channel and applied by
//! [`TransformCoordinator::settle`] on the session owner's side, where two checks happen:
//!
//! - the completion must belong to the request currently in flight (cancelled requests are
//!   dropped), and
//! - its input generation must still be the history's generation (a reset in between makes the
//!   result stale, and it is dropped without telling anyone).

use crate::buffer::{Generation, ImageBuffer, ImageState};
use crate::error::{EditError, ProviderError};
use crate::history::EditHistory;
use crate::provider::TransformProvider;
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Edit operations computed by an external provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOp {
    AutoRemoveBackground,
}

impl TransformOp {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformOp::AutoRemoveBackground => "auto_remove_background",
        }
    }
}

impl fmt::Display for TransformOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one submit on one coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    Pending,
    Completed,
    Failed,
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub request_id: RequestId,
    pub op: TransformOp,
    pub input_generation: Generation,
    pub status: TransformStatus,
    pub submitted_at: Instant,
}

/// An intermediate refinement. Never enters the history.
#[derive(Debug, Clone)]
pub struct TransformProgress {
    pub request_id: RequestId,
    pub op: TransformOp,
    /// 1-based index of the refinement
    pub step: usize,
    pub preview: ImageBuffer,
}

/// Terminal outcome of a provider run, on its way back to the session owner
#[derive(Debug)]
pub struct TransformCompletion {
    pub request_id: RequestId,
    pub op: TransformOp,
    pub input_generation: Generation,
    pub result: Result<ImageBuffer, ProviderError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The history was reset or closed while the transform ran.
    Superseded,
    /// The request was cancelled.
    Abandoned,
}

/// A completion after it has been applied or dropped
#[derive(Debug, Clone)]
pub enum Settled {
    Applied {
        request_id: RequestId,
        op: TransformOp,
        state: ImageState,
    },
    Discarded {
        request_id: RequestId,
        reason: DiscardReason,
    },
}

impl Settled {
    pub fn request_id(&self) -> RequestId {
        match self {
            Settled::Applied { request_id, .. } | Settled::Discarded { request_id, .. } => {
                *request_id
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Settled::Applied { .. })
    }
}

pub struct TransformCoordinator {
    provider: Arc<dyn TransformProvider>,
    in_flight: Option<TransformRequest>,
    /// The most recently settled request with its final status.
    last_settled: Option<TransformRequest>,
    last_request: u64,
    /// Spawned runs whose completion has not been received yet, abandoned ones included.
    outstanding: usize,
    completions_tx: mpsc::UnboundedSender<TransformCompletion>,
    completions_rx: mpsc::UnboundedReceiver<TransformCompletion>,
    progress_tx: Option<mpsc::UnboundedSender<TransformProgress>>,
}

impl TransformCoordinator {
    pub fn new(provider: Arc<dyn TransformProvider>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            in_flight: None,
            last_settled: None,
            last_request: 0,
            outstanding: 0,
            completions_tx,
            completions_rx,
            progress_tx: None,
        }
    }

    /// Forward intermediate refinements of subsequent submits to `sink`.
    pub fn set_progress_sink(&mut self, sink: mpsc::UnboundedSender<TransformProgress>) {
        self.progress_tx = Some(sink);
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn in_flight(&self) -> Option<&TransformRequest> {
        self.in_flight.as_ref()
    }

    pub fn last_settled(&self) -> Option<&TransformRequest> {
        self.last_settled.as_ref()
    }

    /// The pending request, if any. Abandoned requests do not count.
    pub fn pending(&self) -> Option<&TransformRequest> {
        self.in_flight
            .as_ref()
            .filter(|request| request.status == TransformStatus::Pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Status of the request in the single-flight slot, if any.
    pub fn status(&self) -> Option<TransformStatus> {
        self.in_flight.as_ref().map(|request| request.status)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Start `op` against the history's current state.
    ///
    /// Fails with [`EditError::TransformBusy`] while another request is pending; nothing is
    /// started and the history is not touched. Must be called from within a tokio runtime.
    pub fn submit(&mut self, op: TransformOp, history: &EditHistory) -> Result<RequestId, EditError> {
        if let Some(pending) = self.pending() {
            warn!(
                request_id = %pending.request_id,
                op = %op,
                "Transform rejected: another transform is in progress"
            );
            return Err(EditError::TransformBusy {
                request_id: pending.request_id,
            });
        }

        let input = history.current()?.buffer().clone();
        let input_generation = history.generation();
        let runtime = Handle::try_current().map_err(|e| EditError::Runtime(e.to_string()))?;

        self.last_request += 1;
        let request_id = RequestId(self.last_request);
        self.in_flight = Some(TransformRequest {
            request_id,
            op,
            input_generation,
            status: TransformStatus::Pending,
            submitted_at: Instant::now(),
        });
        self.outstanding += 1;

        let provider = Arc::clone(&self.provider);
        let completions = self.completions_tx.clone();
        let progress = self.progress_tx.clone();
        runtime.spawn(async move {
            let run =
                run_to_completion(provider.as_ref(), op, input, request_id, progress.as_ref());
            let result = match FutureExt::catch_unwind(AssertUnwindSafe(run)).await {
                Ok(result) => result,
                Err(payload) => {
                    error!(request_id = %request_id, "Transform provider panicked");
                    Err(ProviderError::Failed(format!(
                        "provider panicked: {}",
                        panic_message(&*payload)
                    )))
                }
            };
            let completion = TransformCompletion {
                request_id,
                op,
                input_generation,
                result,
            };
            if completions.send(completion).is_err() {
                debug!(request_id = %request_id, "Session closed before transform completed");
            }
        });

        info!(
            request_id = %request_id,
            op = %op,
            generation = %input_generation,
            provider = self.provider.name(),
            "Transform submitted"
        );
        Ok(request_id)
    }

    /// Abandon the pending request. Its completion will be discarded whenever it arrives, and a
    /// new request may be submitted right away.
    pub fn cancel(&mut self) -> Option<RequestId> {
        match self.in_flight.as_mut() {
            Some(request) if request.status == TransformStatus::Pending => {
                request.status = TransformStatus::Abandoned;
                info!(request_id = %request.request_id, "Transform abandoned");
                Some(request.request_id)
            }
            _ => None,
        }
    }

    /// Wait for the next provider completion. Returns `None` when no run is outstanding.
    pub async fn next_completion(&mut self) -> Option<TransformCompletion> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// Non-blocking variant of [`Self::next_completion`].
    pub fn try_next_completion(&mut self) -> Option<TransformCompletion> {
        let completion = self.completions_rx.try_recv().ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(completion)
    }

    /// Apply a completion to `history`.
    ///
    /// A successful, current result is pushed and returned as [`Settled::Applied`]. Results of
    /// abandoned or superseded requests are [`Settled::Discarded`] and leave the history as it
    /// is. A provider failure for the current request clears it and returns
    /// [`EditError::TransformFailed`].
    ///
    /// The generation is checked before the outcome, so a failure of a request whose document
    /// was reset or closed in the meantime is also discarded as [`DiscardReason::Superseded`]
    /// rather than reported.
    pub fn settle(
        &mut self,
        completion: TransformCompletion,
        history: &mut EditHistory,
    ) -> Result<Settled, EditError> {
        let TransformCompletion {
            request_id,
            op,
            input_generation,
            result,
        } = completion;

        let mut request = match self.in_flight.take() {
            Some(request) if request.request_id == request_id => request,
            other => {
                self.in_flight = other;
                debug!(request_id = %request_id, "Dropping completion of a replaced request");
                return Ok(Settled::Discarded {
                    request_id,
                    reason: DiscardReason::Abandoned,
                });
            }
        };

        if request.status == TransformStatus::Abandoned {
            debug!(request_id = %request_id, "Dropping completion of an abandoned request");
            self.last_settled = Some(request);
            return Ok(Settled::Discarded {
                request_id,
                reason: DiscardReason::Abandoned,
            });
        }

        if input_generation != history.generation() {
            info!(
                request_id = %request_id,
                input_generation = %input_generation,
                generation = %history.generation(),
                "Discarding stale transform result"
            );
            request.status = TransformStatus::Abandoned;
            self.last_settled = Some(request);
            return Ok(Settled::Discarded {
                request_id,
                reason: DiscardReason::Superseded,
            });
        }

        let elapsed_ms = request.submitted_at.elapsed().as_millis();
        match result {
            Ok(buffer) => {
                let state = ImageState::new(buffer, input_generation);
                let applied = match history.push(state) {
                    Ok(applied) => applied.clone(),
                    Err(err) => {
                        error!(request_id = %request_id, error = %err, "Transform result rejected by history");
                        request.status = TransformStatus::Failed;
                        self.last_settled = Some(request);
                        return Err(err);
                    }
                };
                request.status = TransformStatus::Completed;
                self.last_settled = Some(request);
                info!(
                    request_id = %request_id,
                    op = %op,
                    depth = history.depth(),
                    duration_ms = elapsed_ms,
                    "Transform applied"
                );
                Ok(Settled::Applied {
                    request_id,
                    op,
                    state: applied,
                })
            }
            Err(err) => {
                request.status = TransformStatus::Failed;
                self.last_settled = Some(request);
                warn!(
                    request_id = %request_id,
                    op = %op,
                    error = %err,
                    duration_ms = elapsed_ms,
                    "Transform failed"
                );
                Err(EditError::TransformFailed(err.to_string()))
            }
        }
    }
}

/// Drain the provider stream, forwarding everything but the last element as progress.
async fn run_to_completion(
    provider: &dyn TransformProvider,
    op: TransformOp,
    input: ImageBuffer,
    request_id: RequestId,
    progress: Option<&mpsc::UnboundedSender<TransformProgress>>,
) -> Result<ImageBuffer, ProviderError> {
    let mut stream = provider.run(op, input).await?;
    let mut last: Option<ImageBuffer> = None;
    let mut step = 0;
    while let Some(item) = stream.next().await {
        let buffer = item?;
        if let Some(preview) = last.replace(buffer) {
            step += 1;
            if let Some(sink) = progress {
                let update = TransformProgress {
                    request_id,
                    op,
                    step,
                    preview,
                };
                if sink.send(update).is_err() {
                    debug!(request_id = %request_id, step, "Progress receiver dropped");
                }
            }
        }
    }
    last.ok_or_else(|| ProviderError::Failed("provider produced no result".to_string()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
