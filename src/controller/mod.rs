//! The top-level state machine tying the engine together.
//!
//! The [`TreeController`] consumes coarse filesystem change notifications,
//! debounces them per directory, and decides between full rescans and
//! targeted hydrations. While a full scan is in flight, directory events
//! land in a pending-hydration backlog; on completion the backlog is either
//! drained in batches (yielding between batches so the host stays
//! responsive) or, past a size threshold, collapsed into one deferred full
//! rescan — many small hydrations cost more than one optimized scan.
//!
//! Every structural mutation of the live tree runs under the workspace's
//! per-key lock, so a hydration triggered by a change event can never
//! interleave with a concurrent rescan and partially overwrite its results.

mod coalesce;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::task::JoinHandle;

use crate::cache::DirectoryCache;
use crate::cancel::CancelToken;
use crate::config::ScanConfig;
use crate::expand::ExpandState;
use crate::gitignore::{GitignoreMatcher, IgnoreMatcher, NoIgnore};
use crate::lock::LockRegistry;
use crate::node::{FileNode, NodeKind, PlaceholderKind};
use crate::progress::{Bus, ProgressEvent, ProgressMode, TreeEvent};
use crate::selection::SelectionManager;
use crate::stats::TraversalStats;
use crate::thresholds::ThresholdPrompt;
use crate::walk::{scan_directory_shallow, scan_root, ScanContext};

use coalesce::minimal_cover;

/// Where the controller is in its scan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    /// A full `scan_root` is in flight.
    Scanning,
    /// Post-scan hydration catch-up is running.
    DrainingBacklog,
}

struct Inner {
    key: String,
    root: PathBuf,
    config: ScanConfig,
    bus: Bus,
    locks: Arc<LockRegistry>,
    cache: DirectoryCache,
    tree: SyncMutex<Vec<FileNode>>,
    state: SyncMutex<ScanState>,
    pending: SyncMutex<HashSet<PathBuf>>,
    pending_rescan: AtomicBool,
    last_stats: SyncMutex<Option<TraversalStats>>,
    debounce: SyncMutex<HashMap<PathBuf, JoinHandle<()>>>,
    cancel: SyncMutex<CancelToken>,
    selection: SelectionManager,
    expand: SyncMutex<ExpandState>,
    prompt: Option<Arc<dyn ThresholdPrompt>>,
}

/// Live, queryable mirror of one workspace tree.
pub struct TreeController {
    inner: Arc<Inner>,
}

impl TreeController {
    pub fn new(root: PathBuf, config: ScanConfig, locks: Arc<LockRegistry>) -> Self {
        Self::with_prompt(root, config, locks, None)
    }

    pub fn with_prompt(
        root: PathBuf,
        config: ScanConfig,
        locks: Arc<LockRegistry>,
        prompt: Option<Arc<dyn ThresholdPrompt>>,
    ) -> Self {
        let bus = Bus::default();
        let key = root.to_string_lossy().into_owned();
        Self {
            inner: Arc::new(Inner {
                key,
                root,
                config,
                bus: bus.clone(),
                locks,
                cache: DirectoryCache::new(),
                tree: SyncMutex::new(Vec::new()),
                state: SyncMutex::new(ScanState::Idle),
                pending: SyncMutex::new(HashSet::new()),
                pending_rescan: AtomicBool::new(false),
                last_stats: SyncMutex::new(None),
                debounce: SyncMutex::new(HashMap::new()),
                cancel: SyncMutex::new(CancelToken::new()),
                selection: SelectionManager::new(bus.clone()),
                expand: SyncMutex::new(ExpandState::new(bus)),
                prompt,
            }),
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TreeEvent> {
        self.inner.bus.subscribe()
    }

    pub fn state(&self) -> ScanState {
        *self.inner.state.lock()
    }

    pub fn last_stats(&self) -> Option<TraversalStats> {
        self.inner.last_stats.lock().clone()
    }

    /// Snapshot of the current tree.
    pub fn tree(&self) -> Vec<FileNode> {
        self.inner.tree.lock().clone()
    }

    /// Runs a full workspace scan now and waits for it.
    pub async fn scan(&self) {
        run_full_rescan(self.inner.clone()).await;
    }

    /// Cancels whatever scan is currently in flight.
    pub fn cancel_active_scan(&self) {
        self.inner.cancel.lock().cancel();
    }

    /// Entry point for the external watch facility: one changed path. The
    /// containing directory is debounced; rapid repeats within the window
    /// coalesce into a single dispatch.
    pub fn notify_change(&self, changed: PathBuf) {
        let root = &self.inner.root;
        if !changed.starts_with(root) {
            return;
        }
        let dir = if changed == *root {
            root.clone()
        } else {
            changed
                .parent()
                .map(Path::to_path_buf)
                .filter(|parent| parent.starts_with(root))
                .unwrap_or_else(|| root.clone())
        };

        let inner = self.inner.clone();
        let mut timers = self.inner.debounce.lock();
        if let Some(stale) = timers.remove(&dir) {
            stale.abort();
        }
        let delay = Duration::from_millis(self.inner.config.debounce_ms);
        let task_dir = dir.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.debounce.lock().remove(&task_dir);
            dispatch(inner.clone(), task_dir).await;
        });
        timers.insert(dir, handle);
    }

    /// Lazy children protocol. A hydrated (or cached) directory answers
    /// immediately; an unhydrated one answers with a single Loading
    /// placeholder while hydration proceeds in the background, followed by a
    /// `TreeChanged` notification once real children are attached.
    pub fn request_children(&self, dir: &Path) -> Vec<FileNode> {
        let inner = &self.inner;
        if dir == inner.root {
            let tree = inner.tree.lock();
            if !tree.is_empty() {
                return tree.clone();
            }
            drop(tree);
            return match *inner.state.lock() {
                ScanState::Idle => vec![FileNode::placeholder("", 1, PlaceholderKind::Welcome)],
                _ => vec![FileNode::placeholder("", 1, PlaceholderKind::Scanning)],
            };
        }
        if let Some(children) = inner.cache.get(dir) {
            return children;
        }
        let (depth, rel) = {
            let tree = inner.tree.lock();
            match find_node(&tree, dir) {
                Some(node) if !node.children.is_empty() => return node.children.clone(),
                Some(node) => (node.depth, node.rel_path.clone()),
                None => return Vec::new(),
            }
        };
        let task_inner = self.inner.clone();
        let task_dir = dir.to_path_buf();
        tokio::spawn(async move {
            hydrate_one(task_inner, task_dir).await;
        });
        vec![FileNode::placeholder(&rel, depth + 1, PlaceholderKind::Loading)]
    }

    /// Requesting "children" of a LoadMore placeholder fetches the next page
    /// into the parent in place and returns nothing.
    pub fn request_more(&self, placeholder: &FileNode) -> Vec<FileNode> {
        if let NodeKind::Placeholder(PlaceholderKind::LoadMore {
            parent,
            next_index,
            page_size,
        }) = &placeholder.kind
        {
            let inner = self.inner.clone();
            let parent = parent.clone();
            let start = *next_index;
            let page = *page_size;
            tokio::spawn(async move {
                load_more(inner, parent, start, page).await;
            });
        }
        Vec::new()
    }

    // --- selection facade -------------------------------------------------

    /// Flips one file's selection by rel-path. Returns false if no such
    /// file node exists.
    pub fn toggle_selection(&self, rel_path: &str) -> bool {
        let mut tree = self.inner.tree.lock();
        match find_by_rel_mut(&mut tree, rel_path) {
            Some(node) if node.kind == NodeKind::File => {
                self.inner.selection.toggle_selection(node);
                true
            }
            _ => false,
        }
    }

    pub fn set_selection_by_rel_paths(&self, paths: &[String]) {
        let mut tree = self.inner.tree.lock();
        self.inner.selection.set_selection_by_rel_paths(&mut tree, paths);
    }

    pub fn select_all(&self) {
        let mut tree = self.inner.tree.lock();
        self.inner.selection.select_all(&mut tree);
    }

    pub fn clear_selection(&self) {
        let mut tree = self.inner.tree.lock();
        self.inner.selection.clear_selection(&mut tree);
    }

    /// Selected file nodes, sorted by rel-path; the digest layer's input.
    pub fn selected_files(&self) -> Vec<FileNode> {
        let tree = self.inner.tree.lock();
        self.inner
            .selection
            .selected_files(&tree)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn selected_rel_paths(&self) -> Vec<String> {
        let tree = self.inner.tree.lock();
        self.inner.selection.selected_rel_paths(&tree)
    }

    // --- expand facade ----------------------------------------------------

    pub fn toggle_expanded(&self, rel_path: &str) {
        self.inner.expand.lock().toggle(rel_path);
    }

    pub fn is_expanded(&self, rel_path: &str) -> bool {
        self.inner.expand.lock().is_expanded(rel_path)
    }

    pub fn expand_all(&self) {
        let tree = self.inner.tree.lock();
        self.inner.expand.lock().expand_all(&tree);
    }

    pub fn collapse_all(&self) {
        self.inner.expand.lock().collapse_all();
    }
}

impl Drop for TreeController {
    /// Scoped teardown: all debounce timers die with their owner and any
    /// in-flight scan is cancelled.
    fn drop(&mut self) {
        self.inner.cancel.lock().cancel();
        for (_, handle) in self.inner.debounce.lock().drain() {
            handle.abort();
        }
        self.inner.cache.clear();
    }
}

/// Schedules a deferred full rescan on the runtime. The future is boxed
/// here because rescan, backlog drain, and hydration call into each other;
/// the type erasure keeps that cycle finite for the compiler.
fn spawn_rescan(inner: Arc<Inner>) {
    let rescan: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(run_full_rescan(inner));
    tokio::spawn(rescan);
}

/// Routes one debounced directory event.
async fn dispatch(inner: Arc<Inner>, dir: PathBuf) {
    if dir == inner.root {
        run_full_rescan(inner).await;
        return;
    }
    let deferred = {
        let state = inner.state.lock();
        if *state == ScanState::Scanning {
            inner.pending.lock().insert(dir.clone());
            true
        } else {
            false
        }
    };
    if deferred {
        log::debug!("deferring hydration of {} until scan completes", dir.display());
        return;
    }
    hydrate_one(inner, dir).await;
}

async fn run_full_rescan(inner: Arc<Inner>) {
    {
        let mut state = inner.state.lock();
        if *state == ScanState::Scanning {
            // One deferred rescan is enough, however many asked.
            inner.pending_rescan.store(true, Ordering::Relaxed);
            return;
        }
        *state = ScanState::Scanning;
    }
    let cancel = CancelToken::new();
    *inner.cancel.lock() = cancel.clone();

    let guard = inner.locks.lock(&inner.key).await;
    let mut ignore = make_matcher(&inner.config);
    let prompt = inner.prompt.clone();
    let ctx = {
        let mut ctx = ScanContext::new(&inner.config, &cancel).with_bus(&inner.bus);
        if let Some(prompt) = prompt.as_deref() {
            ctx = ctx.with_prompt(prompt);
        }
        ctx
    };
    let result = scan_root(&inner.root, &ctx, ignore.as_mut()).await;
    drop(guard);

    match result {
        Ok((mut nodes, stats)) => {
            // Carry the selection across the rescan; paths that vanished
            // simply drop out of the membership set.
            let previous = {
                let tree = inner.tree.lock();
                inner.selection.selected_rel_paths(&tree)
            };
            if !previous.is_empty() {
                inner
                    .selection
                    .set_selection_by_rel_paths(&mut nodes, &previous);
            }
            inner.cache.clear();
            inner.cache.set(inner.root.clone(), nodes.clone());
            for node in &nodes {
                node.walk(&mut |n| {
                    if n.kind == NodeKind::Directory {
                        inner.cache.set(n.path.clone(), n.children.clone());
                    }
                });
            }
            *inner.tree.lock() = nodes;
            *inner.last_stats.lock() = Some(stats);
            inner.bus.tree_changed();
            inner.bus.preview_changed();
        }
        Err(error) if error.is_cancellation() => {
            // Partial results are discarded; the previous tree stands.
            inner.bus.publish(TreeEvent::Progress(ProgressEvent::scan(
                ProgressMode::Cancel,
                "Scan cancelled",
            )));
        }
        Err(error) => {
            // An unexpected top-level failure must not leave a partially
            // mutated tree behind.
            log::warn!("workspace scan of {} failed: {error}", inner.root.display());
            inner.cache.clear();
            inner.tree.lock().clear();
            inner.bus.tree_changed();
        }
    }

    *inner.state.lock() = ScanState::Idle;
    finish_scan_cycle(inner).await;
}

/// Post-scan backlog decision: rescan once, drain in batches, or nothing.
async fn finish_scan_cycle(inner: Arc<Inner>) {
    if inner.pending_rescan.swap(false, Ordering::Relaxed) {
        inner.pending.lock().clear();
        spawn_rescan(inner);
        return;
    }
    let backlog: Vec<PathBuf> = inner.pending.lock().drain().collect();
    if backlog.is_empty() {
        return;
    }
    if backlog.len() > inner.config.max_pending_hydrations {
        log::debug!(
            "backlog of {} directories exceeds {}; scheduling one full rescan",
            backlog.len(),
            inner.config.max_pending_hydrations
        );
        spawn_rescan(inner);
        return;
    }
    *inner.state.lock() = ScanState::DrainingBacklog;
    drain_backlog(inner, backlog).await;
}

async fn drain_backlog(inner: Arc<Inner>, backlog: Vec<PathBuf>) {
    let cover = minimal_cover(backlog);
    let batch_size = inner.config.pending_hydration_batch_size.max(1);
    let delay = Duration::from_millis(inner.config.pending_hydration_batch_delay_ms);

    for batch in cover.chunks(batch_size) {
        if inner.pending_rescan.load(Ordering::Relaxed) {
            break;
        }
        for dir in batch {
            hydrate_one(inner.clone(), dir.clone()).await;
        }
        // Yield between batches so the host stays responsive.
        tokio::time::sleep(delay).await;
    }

    {
        // A rescan that started mid-drain owns the state until it finishes;
        // only step down from DrainingBacklog.
        let mut state = inner.state.lock();
        if *state == ScanState::DrainingBacklog {
            *state = ScanState::Idle;
        }
    }
    if inner.pending_rescan.swap(false, Ordering::Relaxed) {
        spawn_rescan(inner);
    }
}

/// Hydrates one directory under the workspace lock and splices the result
/// into the live tree. If the directory itself is not in the tree (it may
/// be brand new), its nearest indexed ancestor is hydrated instead.
async fn hydrate_one(inner: Arc<Inner>, dir: PathBuf) {
    let target = {
        let tree = inner.tree.lock();
        nearest_indexed_dir(&tree, &inner.root, &dir)
    };
    let Some(target) = target else {
        // Nothing between here and the root is indexed; only a full scan
        // can place this directory.
        spawn_rescan(inner);
        return;
    };

    let guard = inner.locks.lock(&inner.key).await;
    let cancel = inner.cancel.lock().clone();
    let mut ignore = make_matcher_for(&inner.config, &inner.root, &target);
    let prompt = inner.prompt.clone();
    let ctx = {
        let mut ctx = ScanContext::new(&inner.config, &cancel);
        if let Some(prompt) = prompt.as_deref() {
            ctx = ctx.with_prompt(prompt);
        }
        ctx
    };
    let page_size = inner.config.directory_page_size;
    let result =
        scan_directory_shallow(&inner.root, &target, &ctx, ignore.as_mut(), 0, page_size).await;
    drop(guard);

    match result {
        Ok(page) => {
            let mut children = page.items;
            let mut tree = inner.tree.lock();
            let selected: HashSet<String> = inner
                .selection
                .selected_rel_paths(&tree)
                .into_iter()
                .collect();
            if let Some(node) = find_node_mut(&mut tree, &target) {
                // A one-level listing returns subdirectories unhydrated;
                // graft the already-scanned subtrees back on so grandchildren
                // (and the selection beneath them) survive the splice.
                carry_hydrated_subtrees(&mut children, &node.children);
                for child in &mut children {
                    child.walk_mut(&mut |n| {
                        if n.kind == NodeKind::File {
                            n.selected = selected.contains(&n.rel_path);
                        }
                    });
                }
                if page.total > page_size {
                    children.push(FileNode::placeholder(
                        &node.rel_path,
                        node.depth + 1,
                        PlaceholderKind::LoadMore {
                            parent: target.clone(),
                            next_index: page_size,
                            page_size,
                        },
                    ));
                }
                node.children = children.clone();
            }
            drop(tree);
            inner.cache.set(target, children);
            *inner.last_stats.lock() = Some(page.stats);
            inner.bus.tree_changed();
        }
        Err(error) if error.is_cancellation() => {}
        Err(error) => {
            log::warn!("hydration of {} failed: {error}", dir.display());
        }
    }
}

/// Fetches one further page for a wide directory and appends it in place.
async fn load_more(inner: Arc<Inner>, parent: PathBuf, start_index: usize, page_size: usize) {
    let guard = inner.locks.lock(&inner.key).await;
    let cancel = inner.cancel.lock().clone();
    let mut ignore = make_matcher_for(&inner.config, &inner.root, &parent);
    let ctx = ScanContext::new(&inner.config, &cancel);
    let result = scan_directory_shallow(
        &inner.root,
        &parent,
        &ctx,
        ignore.as_mut(),
        start_index,
        page_size,
    )
    .await;
    drop(guard);

    let Ok(page) = result else {
        return;
    };
    let mut tree = inner.tree.lock();
    let Some(node) = find_node_mut(&mut tree, &parent) else {
        return;
    };
    node.children.retain(|child| {
        !matches!(
            child.kind,
            NodeKind::Placeholder(PlaceholderKind::LoadMore { .. })
        )
    });
    node.children.extend(page.items);
    let next_index = start_index + page_size;
    if next_index < page.total {
        children_push_load_more(node, &parent, next_index, page_size);
    }
    let snapshot = node.children.clone();
    drop(tree);
    inner.cache.set(parent, snapshot);
    inner.bus.tree_changed();
}

fn children_push_load_more(node: &mut FileNode, parent: &Path, next_index: usize, page_size: usize) {
    let rel = node.rel_path.clone();
    let depth = node.depth + 1;
    node.children.push(FileNode::placeholder(
        &rel,
        depth,
        PlaceholderKind::LoadMore {
            parent: parent.to_path_buf(),
            next_index,
            page_size,
        },
    ));
}

/// Grafts previously scanned subtrees onto a fresh one-level listing.
/// Directories that vanished from disk are simply absent from the fresh
/// list and drop out with their subtrees.
fn carry_hydrated_subtrees(fresh: &mut [FileNode], prior: &[FileNode]) {
    for child in fresh.iter_mut() {
        if child.is_dir() && child.children.is_empty() {
            if let Some(existing) = prior.iter().find(|p| p.is_dir() && p.path == child.path) {
                child.children = existing.children.clone();
            }
        }
    }
}

fn make_matcher(config: &ScanConfig) -> Box<dyn IgnoreMatcher> {
    if config.respect_gitignore {
        Box::new(GitignoreMatcher::new())
    } else {
        Box::new(NoIgnore)
    }
}

/// Matcher preloaded with the rules on the path from root down to `dir`, so
/// a targeted hydration sees the same verdicts a full scan would.
fn make_matcher_for(config: &ScanConfig, root: &Path, dir: &Path) -> Box<dyn IgnoreMatcher> {
    let mut matcher = make_matcher(config);
    let names = if config.respect_gitignore {
        vec![".gitignore".to_string()]
    } else {
        Vec::new()
    };
    if let Err(error) = matcher.load_root(root, &names) {
        log::debug!("ignore rules for {} unavailable: {error}", root.display());
    }
    let mut ancestors: Vec<&Path> = dir
        .ancestors()
        .take_while(|ancestor| ancestor.starts_with(root) && *ancestor != root)
        .collect();
    ancestors.reverse();
    for ancestor in ancestors {
        if let Err(error) = matcher.load_for_dir(ancestor) {
            log::debug!(
                "ignore rules for {} unavailable: {error}",
                ancestor.display()
            );
        }
    }
    matcher
}

fn find_node<'a>(nodes: &'a [FileNode], path: &Path) -> Option<&'a FileNode> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if node.is_dir() && path.starts_with(&node.path) {
            if let Some(found) = find_node(&node.children, path) {
                return Some(found);
            }
        }
    }
    None
}

fn find_node_mut<'a>(nodes: &'a mut [FileNode], path: &Path) -> Option<&'a mut FileNode> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if node.is_dir() && path.starts_with(&node.path) {
            if let Some(found) = find_node_mut(&mut node.children, path) {
                return Some(found);
            }
        }
    }
    None
}

fn find_by_rel_mut<'a>(nodes: &'a mut [FileNode], rel: &str) -> Option<&'a mut FileNode> {
    for node in nodes {
        if node.rel_path == rel {
            return Some(node);
        }
        if let Some(found) = find_by_rel_mut(&mut node.children, rel) {
            return Some(found);
        }
    }
    None
}

/// Deepest directory at or above `dir` that exists in the tree (or is the
/// root, in which case `None` signals "full rescan").
fn nearest_indexed_dir(nodes: &[FileNode], root: &Path, dir: &Path) -> Option<PathBuf> {
    let mut candidate = dir.to_path_buf();
    loop {
        if candidate == root {
            return None;
        }
        if find_node(nodes, &candidate).is_some() {
            return Some(candidate);
        }
        if !candidate.pop() || !candidate.starts_with(root) {
            return None;
        }
    }
}
