//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::EditError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &EditError) -> String {
    match e {
        EditError::NoImageSelected => "No image selected. Pass an input image path.".to_string(),
        EditError::TransformBusy { request_id } => format!(
            "A transform is already running (request {}). Try again once it finishes.",
            request_id
        ),
        EditError::StaleState { .. } => format!("Internal error: {}", e),
        _ => e.to_string(),
    }
}
