//! Fixed-size overlapping character windows.

use serde::{Deserialize, Serialize};

/// Window geometry, in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub size: usize,
    pub overlap: usize,
}

impl WindowConfig {
    #[must_use]
    pub const fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    /// Distance between consecutive window starts; never zero.
    #[must_use]
    pub fn step(&self) -> usize {
        self.size.max(1).saturating_sub(self.overlap).max(1)
    }
}

/// Split `text` into overlapping windows of `config.size` chars.
///
/// Empty input yields no windows. The last window is whatever tail remains.
#[must_use]
pub fn sliding_window(text: &str, config: WindowConfig) -> Vec<&str> {
    let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let len = offsets.len();
    let size = config.size.max(1);
    let step = config.step();
    let byte_at = |char_idx: usize| offsets.get(char_idx).copied().unwrap_or(text.len());

    let mut windows = Vec::with_capacity(len / step + 1);
    let mut start = 0;
    while start < len {
        let end = (start + size).min(len);
        windows.push(&text[byte_at(start)..byte_at(end)]);
        if end == len {
            break;
        }
        start += step;
    }
    windows
}
