//! Edit History Store
//!
//! Linear undo/redo log of image states. `past` is append-only at the tail and `past[0]` is the
//! floor (the imported image), which undo never removes. Undo and redo move states between the
//! tails of `past` and `redo`, so every operation is O(1) amortized.

use crate::buffer::{Generation, ImageBuffer, ImageState};
use crate::error::EditError;
use tracing::debug;

#[derive(Debug, Default)]
pub struct EditHistory {
    past: Vec<ImageState>,
    redo: Vec<ImageState>,
    generation: Generation,
}

impl EditHistory {
    /// Uninitialized history at generation 0. Nothing is selected until [`Self::initialize`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new document with `initial` as its floor. Always bumps the generation.
    pub fn initialize(&mut self, initial: ImageBuffer) -> &ImageState {
        self.generation = self.generation.next();
        self.past.clear();
        self.redo.clear();
        self.past.push(ImageState::new(initial, self.generation));
        debug!(generation = %self.generation, "History initialized");
        &self.past[0]
    }

    /// Same as [`Self::initialize`]. Any transform still in flight for the previous generation
    /// becomes stale.
    pub fn reset(&mut self, initial: ImageBuffer) -> &ImageState {
        self.initialize(initial)
    }

    /// End the document: drop every state and bump the generation.
    pub fn clear(&mut self) {
        self.generation = self.generation.next();
        self.past.clear();
        self.redo.clear();
        debug!(generation = %self.generation, "History cleared");
    }

    /// Stamp `buffer` with the current generation.
    pub fn state_for(&self, buffer: ImageBuffer) -> ImageState {
        ImageState::new(buffer, self.generation)
    }

    /// Append a new state and clear the redo stack.
    ///
    /// The state must belong to the current generation; results computed against a superseded
    /// document are rejected with [`EditError::StaleState`] and leave the history untouched.
    pub fn push(&mut self, state: ImageState) -> Result<&ImageState, EditError> {
        if self.past.is_empty() {
            return Err(EditError::NoImageSelected);
        }
        if state.generation() != self.generation {
            return Err(EditError::StaleState {
                expected: self.generation,
                actual: state.generation(),
            });
        }
        self.past.push(state);
        self.redo.clear();
        debug!(
            depth = self.past.len(),
            generation = %self.generation,
            "State pushed"
        );
        Ok(self.tail())
    }

    /// Step back one state. At the floor this is a no-op returning the floor.
    pub fn undo(&mut self) -> Result<&ImageState, EditError> {
        if self.past.is_empty() {
            return Err(EditError::NoImageSelected);
        }
        if self.past.len() > 1 {
            if let Some(state) = self.past.pop() {
                self.redo.push(state);
            }
            debug!(
                depth = self.past.len(),
                redo_depth = self.redo.len(),
                "Undo"
            );
        }
        Ok(self.tail())
    }

    /// Re-apply the most recently undone state. With nothing to redo this is a no-op.
    pub fn redo(&mut self) -> Result<&ImageState, EditError> {
        if self.past.is_empty() {
            return Err(EditError::NoImageSelected);
        }
        if let Some(state) = self.redo.pop() {
            self.past.push(state);
            debug!(
                depth = self.past.len(),
                redo_depth = self.redo.len(),
                "Redo"
            );
        }
        Ok(self.tail())
    }

    pub fn current(&self) -> Result<&ImageState, EditError> {
        self.past.last().ok_or(EditError::NoImageSelected)
    }

    pub fn floor(&self) -> Result<&ImageState, EditError> {
        self.past.first().ok_or(EditError::NoImageSelected)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_initialized(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.past.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of states in `past`, floor included.
    pub fn depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn past(&self) -> &[ImageState] {
        &self.past
    }

    pub fn redo_stack(&self) -> &[ImageState] {
        &self.redo
    }

    // Callers check `past` is non-empty first.
    fn tail(&self) -> &ImageState {
        &self.past[self.past.len() - 1]
    }
}
