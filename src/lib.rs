//! Eraser: Edit History and Asynchronous Transforms
//!
//! Keeps a linear undo/redo log of image states for one editing session and coordinates
//! asynchronous transforms (background removal) against it, so that at most one transform is in
//! flight and a result never lands in a document that was reset or closed while it ran.

pub mod buffer;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod provider;
pub mod session;
pub mod transform;

pub use buffer::{Generation, ImageBuffer, ImageState, PixelFormat};
pub use error::{DecodeError, EditError, ProviderError};
pub use history::EditHistory;
pub use session::EditSession;
pub use transform::{
    DiscardReason, RequestId, Settled, TransformCoordinator, TransformOp, TransformProgress,
    TransformStatus,
};
