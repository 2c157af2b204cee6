//! Incremental workspace indexing and selection library.
//!
//! This crate provides the engine behind a live workspace file tree:
//! - Recursive directory scanning with include/exclude globs, gitignore
//!   support, and resource thresholds
//! - An in-memory tree with tri-state selection and expand state
//! - A debounced controller that coalesces filesystem change events into
//!   targeted rehydrations or full rescans
//! - Filesystem watching with notify

pub mod cache;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod expand;
pub mod filter;
pub mod gitignore;
pub mod lock;
pub mod node;
pub mod progress;
pub mod selection;
pub mod stats;
pub mod thresholds;
pub mod walk;
pub mod watcher;

// Re-export main types
pub use cache::DirectoryCache;
pub use cancel::CancelToken;
pub use config::{FilterPreset, ScanConfig};
pub use controller::{ScanState, TreeController};
pub use error::{Result, TreeError};
pub use expand::ExpandState;
pub use lock::{LockRegistry, WorkspaceGuard};
pub use node::{FileNode, NodeKind, PlaceholderKind, TriState};
pub use progress::{Bus, ProgressEvent, ProgressMode, ProgressOp, TreeEvent};
pub use selection::{tri_state, SelectionManager};
pub use stats::TraversalStats;
pub use thresholds::{OverrideDecision, ThresholdDecision, ThresholdGuard, ThresholdPrompt};
pub use walk::{scan_directory, scan_directory_shallow, scan_root, ScanContext, ShallowPage};
pub use watcher::{TreeWatcher, WatchEvent};
