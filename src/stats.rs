//! Per-scan counters and deduplicated warnings.

use std::collections::HashSet;
use std::time::Duration;

/// Counters gathered over one `scan_root`/`scan_directory` invocation.
/// Created fresh per scan; the controller retains the latest instance for
/// status reporting.
#[derive(Debug, Clone, Default)]
pub struct TraversalStats {
    pub total_files: usize,
    pub total_size: u64,
    pub skipped_by_size: usize,
    pub skipped_by_total_limit: usize,
    pub skipped_by_max_files: usize,
    pub skipped_by_depth: usize,
    pub skipped_by_ignore: usize,
    pub directories: usize,
    pub symlinks: usize,
    pub warnings: Vec<String>,
    pub duration: Duration,
    /// Dedup keys already seen (message text before the first colon).
    seen_warning_keys: HashSet<String>,
}

impl TraversalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning unless one with the same prefix key was already
    /// recorded this scan. First occurrence wins, in encounter order.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        let key = message
            .split_once(':')
            .map(|(prefix, _)| prefix.to_string())
            .unwrap_or_else(|| message.clone());
        if self.seen_warning_keys.insert(key) {
            log::warn!("{message}");
            self.warnings.push(message);
        }
    }
}
