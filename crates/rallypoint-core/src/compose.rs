//! Shared compose buffer for a chat input field.
//!
//! Manual typing and the dictation bridge both write here. Clones are
//! cheap and observe the same underlying text, which is what lets the
//! bridge rewrite the field the UI is editing.

use std::sync::{Arc, Mutex};

/// The text of one compose field.
#[derive(Debug, Clone, Default)]
pub struct ComposeBuffer {
    inner: Arc<Mutex<String>>,
}

impl ComposeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with initial text.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(text.into())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        // A poisoned buffer still holds valid text; recover it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current contents.
    #[must_use]
    pub fn snapshot(&self) -> String {
        self.lock().clone()
    }

    /// Replace the whole contents.
    pub fn replace(&self, text: impl Into<String>) {
        *self.lock() = text.into();
    }

    /// Append typed text.
    pub fn push_str(&self, text: &str) {
        self.lock().push_str(text);
    }

    /// Clear the buffer.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Read and clear in one step (used on send).
    #[must_use]
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.lock())
    }

    /// Whether the buffer holds nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.lock().trim().is_empty()
    }
}
