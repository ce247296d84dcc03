//! Address bar and clipboard abstractions.
//!
//! TRADE-OFFS
//! ==========
//! History writes are fire-and-forget, as they are in a browser. Clipboard
//! writes are async and may be denied; callers get a typed error and decide
//! whether it matters.

use async_trait::async_trait;
use parking_lot::Mutex;

/// Read/write access to the current page URL.
pub trait Navigator: Send + Sync {
    /// Full current URL, including query string.
    fn href(&self) -> String;

    /// Rewrite the current history entry in place.
    fn replace_state(&self, url: &str);

    /// Push a new history entry.
    fn push_state(&self, url: &str);
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard write denied: {0}")]
    Denied(String),
    #[error("clipboard unavailable")]
    Unavailable,
}

/// System clipboard text sink.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

// =============================================================================
// IN-MEMORY NAVIGATOR
// =============================================================================

#[derive(Debug)]
struct NavigatorState {
    entries: Vec<String>,
    replace_count: usize,
    push_count: usize,
}

/// In-memory history stack. The last entry is the current URL.
#[derive(Debug)]
pub struct MemoryNavigator {
    state: Mutex<NavigatorState>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new(initial_url: &str) -> Self {
        Self {
            state: Mutex::new(NavigatorState {
                entries: vec![initial_url.to_owned()],
                replace_count: 0,
                push_count: 0,
            }),
        }
    }

    /// Number of history entries, including the initial one.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn replace_count(&self) -> usize {
        self.state.lock().replace_count
    }

    #[must_use]
    pub fn push_count(&self) -> usize {
        self.state.lock().push_count
    }
}

impl Navigator for MemoryNavigator {
    fn href(&self) -> String {
        self.state.lock().entries.last().cloned().unwrap_or_default()
    }

    fn replace_state(&self, url: &str) {
        let mut state = self.state.lock();
        state.replace_count += 1;
        match state.entries.last_mut() {
            Some(current) => url.clone_into(current),
            None => state.entries.push(url.to_owned()),
        }
    }

    fn push_state(&self, url: &str) {
        let mut state = self.state.lock();
        state.push_count += 1;
        state.entries.push(url.to_owned());
    }
}

// =============================================================================
// IN-MEMORY CLIPBOARD
// =============================================================================

/// Clipboard that remembers the last text written. Can be set to deny writes.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    deny: bool,
}

impl MemoryClipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose every write is rejected.
    #[must_use]
    pub fn denying() -> Self {
        Self { contents: Mutex::new(None), deny: true }
    }

    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.deny {
            return Err(ClipboardError::Denied("permission not granted".to_owned()));
        }
        *self.contents.lock() = Some(text.to_owned());
        Ok(())
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
