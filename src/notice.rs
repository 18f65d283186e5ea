//! # Notice Deduplication
//!
//! Bounds log volume for recurring conditions (repeated link-loss warnings,
//! failed record writes) without losing the first occurrence.

use std::collections::HashSet;

use tracing::warn;

/// Length of the message prefix used as the dedup key
pub const KEY_LEN: usize = 3;

/// Time-boxed suppression of repeated notices.
///
/// The key is only the first three characters of the message, so distinct
/// messages sharing a prefix coalesce within a window. The caller resets the
/// window on the passive tick.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    seen: HashSet<String>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `message` unless its key was already seen this window.
    ///
    /// Returns whether the message was emitted.
    pub fn notice(&mut self, message: &str) -> bool {
        let key: String = message.chars().take(KEY_LEN).collect();
        if self.seen.insert(key) {
            warn!("{}", message);
            true
        } else {
            false
        }
    }

    /// Clear all keys, opening a new suppression window
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
