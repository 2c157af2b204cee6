//! Resource ceilings with warn → override-once → stop escalation.
//!
//! One [`ThresholdGuard`] is created per scan invocation and owned by that
//! scan's context, so override grants can never leak between scans or reset
//! when the caller rebuilds its configuration mid-scan.
//!
//! Two independent tracks (total bytes, file count) escalate the same way:
//! crossing 80% of the ceiling warns once and grants (or prompts for) a
//! single override; crossing 100% consumes the override if one is held,
//! otherwise the entry is skipped — and for the file-count track all further
//! traversal is stopped, since enumerating past the cap is wasted work.

use crate::config::ScanConfig;
use crate::error::{Result, TreeError};
use crate::stats::TraversalStats;

/// Which ceiling a prompt or warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdTrack {
    TotalSize,
    FileCount,
}

/// Outcome of an interactive threshold prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideDecision {
    /// Permit exactly one entry past the ceiling.
    GrantOnce,
    /// Stop the scan entirely.
    Abort,
}

/// Host hook consulted when `prompts_on_thresholds` is enabled.
pub trait ThresholdPrompt: Send + Sync {
    fn confirm_override(&self, track: ThresholdTrack, message: &str) -> OverrideDecision;
}

/// Per-candidate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDecision {
    Admit,
    /// The single file itself is over `max_file_size`.
    SkipOversized,
    /// Admitting the file would breach the total-size ceiling.
    SkipTotalSize,
    /// The file-count ceiling was breached; stop all traversal.
    StopMaxFiles,
}

/// One escalation track's state.
#[derive(Debug, Default)]
struct Track {
    warned: bool,
    override_granted: bool,
}

/// Running counters against the configured ceilings.
pub struct ThresholdGuard<'a> {
    max_file_size: u64,
    max_total_size: u64,
    max_files: usize,
    total_size: u64,
    total_files: usize,
    size_track: Track,
    files_track: Track,
    stop_all: bool,
    prompt: Option<&'a dyn ThresholdPrompt>,
}

impl<'a> ThresholdGuard<'a> {
    /// Builds a guard for one scan. `prompt` is consulted only when the
    /// config enables interactive escalation.
    pub fn new(config: &ScanConfig, prompt: Option<&'a dyn ThresholdPrompt>) -> Self {
        Self {
            max_file_size: config.max_file_size,
            max_total_size: config.max_total_size_bytes,
            max_files: config.max_files,
            total_size: 0,
            total_files: 0,
            size_track: Track::default(),
            files_track: Track::default(),
            stop_all: false,
            prompt: if config.prompts_on_thresholds {
                prompt
            } else {
                None
            },
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// True once the file-count ceiling tripped without an override; the
    /// walker must stop enumerating entirely.
    pub fn should_stop(&self) -> bool {
        self.stop_all
    }

    /// Decides whether one candidate file is admitted, updating the running
    /// counters on admission. `Err(ThresholdAborted)` means the user chose to
    /// stop the scan at a prompt.
    pub fn admit_file(
        &mut self,
        rel_path: &str,
        candidate_size: u64,
        stats: &mut TraversalStats,
    ) -> Result<ThresholdDecision> {
        if self.stop_all {
            return Ok(ThresholdDecision::StopMaxFiles);
        }

        // 1. Single-file ceiling: rejected outright, no override involved.
        if candidate_size >= self.max_file_size {
            stats.skipped_by_size += 1;
            stats.warn(format!("Skipped oversized file: {rel_path}"));
            return Ok(ThresholdDecision::SkipOversized);
        }

        // 2. Total-size track. Consumption of a granted override is deferred
        // until the file-count track has also admitted the entry; a file the
        // count track refuses must not burn the size grant.
        let projected = self.total_size + candidate_size;
        let ratio = projected as f64 / self.max_total_size as f64;
        let mut consume_size_override = false;
        if ratio >= 1.0 {
            if self.size_track.override_granted {
                consume_size_override = true;
            } else {
                stats.skipped_by_total_limit += 1;
                stats.warn(format!(
                    "Total size limit reached: skipping {rel_path} ({}% of budget)",
                    floored_percent(ratio)
                ));
                return Ok(ThresholdDecision::SkipTotalSize);
            }
        } else if ratio >= 0.8 && !self.size_track.warned {
            self.escalate(
                ThresholdTrack::TotalSize,
                format!(
                    "Workspace is at {}% of the total size budget",
                    floored_percent(ratio)
                ),
                stats,
            )?;
        }

        // 3. File-count track, same 80%/100% structure.
        let projected_files = self.total_files + 1;
        let count_ratio = projected_files as f64 / self.max_files as f64;
        if count_ratio >= 1.0 {
            if self.files_track.override_granted {
                self.files_track.override_granted = false;
            } else {
                self.stop_all = true;
                stats.skipped_by_max_files += 1;
                stats.warn(format!("Max file count reached: {} files", self.max_files));
                return Ok(ThresholdDecision::StopMaxFiles);
            }
        } else if count_ratio >= 0.8 && !self.files_track.warned {
            self.escalate(
                ThresholdTrack::FileCount,
                format!(
                    "Workspace is at {}% of the file count budget",
                    floored_percent(count_ratio)
                ),
                stats,
            )?;
        }

        if consume_size_override {
            self.size_track.override_granted = false;
        }
        self.total_size = projected;
        self.total_files = projected_files;
        stats.total_size = self.total_size;
        stats.total_files = self.total_files;
        Ok(ThresholdDecision::Admit)
    }

    /// Warns once per track and either grants one override (silent mode) or
    /// asks the host (interactive mode).
    fn escalate(
        &mut self,
        track: ThresholdTrack,
        message: String,
        stats: &mut TraversalStats,
    ) -> Result<()> {
        stats.warn(message.clone());
        let decision = match self.prompt {
            Some(prompt) => prompt.confirm_override(track, &message),
            None => OverrideDecision::GrantOnce,
        };
        let state = match track {
            ThresholdTrack::TotalSize => &mut self.size_track,
            ThresholdTrack::FileCount => &mut self.files_track,
        };
        state.warned = true;
        match decision {
            OverrideDecision::GrantOnce => {
                state.override_granted = true;
                Ok(())
            }
            OverrideDecision::Abort => Err(TreeError::ThresholdAborted(message)),
        }
    }
}

/// Floating ratio floored to an integer percentage for warning text.
fn floored_percent(ratio: f64) -> u32 {
    (ratio * 100.0).floor() as u32
}
