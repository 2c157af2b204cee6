//! Directory traversal that builds the mirrored tree.
//!
//! The walk is depth-first and cooperative: every I/O step is an async
//! suspension point, the cancel token is polled at the top of each directory
//! loop and before each entry, and per-entry failures (unreadable entries,
//! stat errors) degrade to a skip plus one deduplicated warning rather than
//! failing the scan.
//!
//! Three entry points:
//! - [`scan_root`]: full recursive scan with ignore loading, preset merging,
//!   negation re-admission, and virtual-folder extraction.
//! - [`scan_directory`]: one level deep, for lazy hydration of a collapsed
//!   directory.
//! - [`scan_directory_shallow`]: paginated listing for directories with very
//!   large fan-out.

mod negation;
mod virtual_groups;

pub(crate) use negation::readmit_negated_paths;
pub(crate) use virtual_groups::extract_virtual_groups;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::filter::{FilterReason, IgnoreVerdict, PathFilter};
use crate::gitignore::{negation_reaches, IgnoreMatcher};
use crate::node::{join_rel, rel_path_of, FileNode, NodeKind};
use crate::progress::{Bus, ProgressEvent, ProgressMode, ProgressOp, TreeEvent};
use crate::stats::TraversalStats;
use crate::thresholds::{ThresholdDecision, ThresholdGuard, ThresholdPrompt};

/// Progress is reported at this cadence, not per entry, to bound
/// notification overhead.
const PROGRESS_INTERVAL: usize = 100;

/// Everything a scan invocation needs beyond the target path.
pub struct ScanContext<'a> {
    pub config: &'a ScanConfig,
    pub cancel: &'a CancelToken,
    pub bus: Option<&'a Bus>,
    pub prompt: Option<&'a dyn ThresholdPrompt>,
}

impl<'a> ScanContext<'a> {
    pub fn new(config: &'a ScanConfig, cancel: &'a CancelToken) -> Self {
        Self {
            config,
            cancel,
            bus: None,
            prompt: None,
        }
    }

    pub fn with_bus(mut self, bus: &'a Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_prompt(mut self, prompt: &'a dyn ThresholdPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    fn ignore_file_names(&self) -> Vec<String> {
        if self.config.respect_gitignore {
            vec![".gitignore".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// One page of a shallow directory listing.
#[derive(Debug)]
pub struct ShallowPage {
    pub items: Vec<FileNode>,
    /// True fan-out of the directory, so the caller can decide whether a
    /// LoadMore placeholder is needed.
    pub total: usize,
    /// Counters and warnings gathered while processing this page.
    pub stats: TraversalStats,
}

/// Full recursive scan of the workspace root. Returns the root's children
/// (virtual groups first, at depth 0/1) plus the scan's statistics.
pub async fn scan_root(
    root: &Path,
    ctx: &ScanContext<'_>,
    ignore: &mut dyn IgnoreMatcher,
) -> Result<(Vec<FileNode>, TraversalStats)> {
    let started = Instant::now();
    publish_progress(
        ctx.bus,
        ProgressEvent::scan(ProgressMode::Start, "Scanning workspace"),
    );

    ignore.load_root(root, &ctx.ignore_file_names())?;
    let (include, exclude) = ctx.config.effective_patterns();

    let mut walker = Walker::new(root, ctx, PathFilter::new(&include, &exclude), &mut *ignore);
    let mut nodes = walker
        .scan_children(root.to_path_buf(), String::new(), 1, true)
        .await?;
    let mut stats = walker.finish();

    // A structurally pruned ancestor may have kept a negated file from ever
    // being visited; re-admit anything an explicit negation references.
    let negations = ignore.negations().to_vec();
    readmit_negated_paths(root, &mut nodes, &negations, &mut stats).await;

    extract_virtual_groups(root, &mut nodes, &ctx.config.virtual_folders);

    stats.duration = started.elapsed();
    log::debug!(
        "scan of {} finished: {} files, {} bytes, {} warnings in {:?}",
        root.display(),
        stats.total_files,
        stats.total_size,
        stats.warnings.len(),
        stats.duration
    );
    publish_progress(ctx.bus, end_event(&stats));
    Ok((nodes, stats))
}

/// Single-level, non-recursive listing of one directory, used to hydrate a
/// previously collapsed node. Subdirectories come back unhydrated (empty
/// children).
pub async fn scan_directory(
    root: &Path,
    dir: &Path,
    ctx: &ScanContext<'_>,
    ignore: &mut dyn IgnoreMatcher,
) -> Result<(Vec<FileNode>, TraversalStats)> {
    let started = Instant::now();
    let parent_rel = rel_path_of(root, dir).unwrap_or_default();
    let depth = if parent_rel.is_empty() {
        1
    } else {
        parent_rel.matches('/').count() + 2
    };
    let (include, exclude) = ctx.config.effective_patterns();

    let mut walker = Walker::new(root, ctx, PathFilter::new(&include, &exclude), ignore);
    let nodes = walker
        .scan_children(dir.to_path_buf(), parent_rel, depth, false)
        .await?;
    let mut stats = walker.finish();
    stats.duration = started.elapsed();
    Ok((nodes, stats))
}

/// Paginated variant of [`scan_directory`] for very wide directories:
/// processes `[start_index, start_index + page_size)` of the name-sorted
/// entry list and reports the directory's true fan-out.
pub async fn scan_directory_shallow(
    root: &Path,
    dir: &Path,
    ctx: &ScanContext<'_>,
    ignore: &mut dyn IgnoreMatcher,
    start_index: usize,
    page_size: usize,
) -> Result<ShallowPage> {
    let started = Instant::now();
    let parent_rel = rel_path_of(root, dir).unwrap_or_default();
    let depth = if parent_rel.is_empty() {
        1
    } else {
        parent_rel.matches('/').count() + 2
    };
    let (include, exclude) = ctx.config.effective_patterns();
    let mut walker = Walker::new(root, ctx, PathFilter::new(&include, &exclude), &mut *ignore);

    walker.ignore.load_for_dir(dir)?;
    let mut entries = walker.list_sorted(dir).await?;
    let total = entries.len();
    let end = (start_index + page_size).min(total);
    let page = if start_index < end {
        entries.drain(start_index..end).collect()
    } else {
        Vec::new()
    };

    let items = walker
        .process_entries(page, parent_rel, depth, false)
        .await?;
    let mut stats = walker.finish();
    stats.duration = started.elapsed();
    Ok(ShallowPage {
        items,
        total,
        stats,
    })
}

fn publish_progress(bus: Option<&Bus>, event: ProgressEvent) {
    if let Some(bus) = bus {
        bus.publish(TreeEvent::Progress(event));
    }
}

fn end_event(stats: &TraversalStats) -> ProgressEvent {
    ProgressEvent {
        op: ProgressOp::Scan,
        mode: ProgressMode::End,
        determinate: false,
        percent: None,
        message: format!("Scanned {} files", stats.total_files),
        total_files: Some(stats.total_files),
        total_size: Some(stats.total_size),
    }
}

struct Walker<'a> {
    root: &'a Path,
    config: &'a ScanConfig,
    cancel: &'a CancelToken,
    bus: Option<&'a Bus>,
    filter: PathFilter,
    ignore: &'a mut dyn IgnoreMatcher,
    guard: ThresholdGuard<'a>,
    stats: TraversalStats,
    processed: usize,
}

impl<'a> Walker<'a> {
    fn new(
        root: &'a Path,
        ctx: &ScanContext<'a>,
        filter: PathFilter,
        ignore: &'a mut dyn IgnoreMatcher,
    ) -> Self {
        Self {
            root,
            config: ctx.config,
            cancel: ctx.cancel,
            bus: ctx.bus,
            filter,
            ignore,
            guard: ThresholdGuard::new(ctx.config, ctx.prompt),
            stats: TraversalStats::new(),
            processed: 0,
        }
    }

    fn finish(self) -> TraversalStats {
        self.stats
    }

    /// Lists a directory's entries sorted by name. An unreadable directory is
    /// a skip-with-warning, not a failure.
    async fn list_sorted(&mut self, dir: &Path) -> Result<Vec<(String, PathBuf)>> {
        let mut read_dir = match tokio::fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(error) => {
                let rel = rel_path_of(self.root, dir).unwrap_or_default();
                self.stats
                    .warn(format!("Unreadable directory: {rel} ({error})"));
                return Ok(Vec::new());
            }
        };
        let mut entries = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    entries.push((name, entry.path()));
                }
                Ok(None) => break,
                Err(error) => {
                    let rel = rel_path_of(self.root, dir).unwrap_or_default();
                    self.stats
                        .warn(format!("Unreadable directory: {rel} ({error})"));
                    break;
                }
            }
        }
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        Ok(entries)
    }

    /// Scans one directory's children; `recurse` controls whether
    /// subdirectories are descended into or returned unhydrated.
    fn scan_children<'s>(
        &'s mut self,
        dir: PathBuf,
        parent_rel: String,
        depth: usize,
        recurse: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FileNode>>> + Send + 's>> {
        Box::pin(async move {
            self.cancel.checkpoint()?;
            if self.guard.should_stop() {
                return Ok(Vec::new());
            }
            self.ignore.load_for_dir(&dir)?;
            let entries = self.list_sorted(&dir).await?;
            self.process_entries(entries, parent_rel, depth, recurse)
                .await
        })
    }

    /// Applies the per-entry pipeline (stat, classify, filter, thresholds,
    /// recursion) to a prepared entry list.
    fn process_entries<'s>(
        &'s mut self,
        entries: Vec<(String, PathBuf)>,
        parent_rel: String,
        depth: usize,
        recurse: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FileNode>>> + Send + 's>> {
        Box::pin(async move {
            let mut nodes = Vec::new();
            for (name, abs) in entries {
                self.cancel.checkpoint()?;
                if self.guard.should_stop() {
                    break;
                }
                self.tick_progress();

                let rel = join_rel(&parent_rel, &name);
                if depth > self.config.max_directory_depth {
                    self.stats.skipped_by_depth += 1;
                    self.stats
                        .warn(format!("Max directory depth exceeded: {rel}"));
                    continue;
                }

                // lstat so symlinks are seen as themselves, never followed.
                let metadata = match tokio::fs::symlink_metadata(&abs).await {
                    Ok(metadata) => metadata,
                    Err(error) => {
                        self.stats.warn(format!("Unreadable entry: {rel} ({error})"));
                        continue;
                    }
                };
                let mtime = metadata.modified().ok();

                if metadata.file_type().is_symlink() {
                    self.stats.symlinks += 1;
                    let verdict = IgnoreVerdict {
                        ignored: self.ignore.is_ignored(&abs, false),
                        negation_reaches: false,
                    };
                    let decision = self.filter.decide(&rel, false, verdict);
                    if !decision.keep {
                        if decision.reason == FilterReason::Ignored {
                            self.stats.skipped_by_ignore += 1;
                        }
                        continue;
                    }
                    let mut node = FileNode::new(abs, rel, depth, NodeKind::Symlink);
                    node.mtime = mtime;
                    nodes.push(node);
                } else if metadata.is_dir() {
                    let ignored = self.ignore.is_ignored(&abs, true);
                    let verdict = IgnoreVerdict {
                        ignored,
                        negation_reaches: ignored
                            && negation_reaches(self.ignore.negations(), self.root, &rel),
                    };
                    let decision = self.filter.decide(&rel, true, verdict);
                    if !decision.keep {
                        if decision.reason == FilterReason::Ignored {
                            self.stats.skipped_by_ignore += 1;
                        }
                        continue;
                    }
                    let children = if recurse {
                        self.scan_children(abs.clone(), rel.clone(), depth + 1, true)
                            .await?
                    } else {
                        Vec::new()
                    };
                    self.stats.directories += 1;
                    let mut node = FileNode::new(abs, rel, depth, NodeKind::Directory);
                    node.mtime = mtime;
                    node.children = children;
                    nodes.push(node);
                } else {
                    let verdict = IgnoreVerdict {
                        ignored: self.ignore.is_ignored(&abs, false),
                        negation_reaches: false,
                    };
                    let decision = self.filter.decide(&rel, false, verdict);
                    if !decision.keep {
                        if decision.reason == FilterReason::Ignored {
                            self.stats.skipped_by_ignore += 1;
                        }
                        continue;
                    }
                    match self
                        .guard
                        .admit_file(&rel, metadata.len(), &mut self.stats)?
                    {
                        ThresholdDecision::Admit => {
                            let mut node = FileNode::new(abs, rel, depth, NodeKind::File);
                            node.size = metadata.len();
                            node.mtime = mtime;
                            nodes.push(node);
                        }
                        ThresholdDecision::StopMaxFiles => break,
                        ThresholdDecision::SkipOversized | ThresholdDecision::SkipTotalSize => {}
                    }
                }
            }
            Ok(nodes)
        })
    }

    fn tick_progress(&mut self) {
        self.processed += 1;
        if self.processed % PROGRESS_INTERVAL == 0 {
            publish_progress(
                self.bus,
                ProgressEvent {
                    op: ProgressOp::Scan,
                    mode: ProgressMode::Progress,
                    determinate: false,
                    percent: None,
                    message: format!("Processed {} entries", self.processed),
                    total_files: Some(self.guard.total_files()),
                    total_size: Some(self.guard.total_size()),
                },
            );
        }
    }
}
