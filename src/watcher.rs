//! Filesystem watching via notify.
//!
//! The watcher callback runs on notify's own thread; it never touches the
//! controller directly. Events cross into async land through an unbounded
//! channel, and a pump task owned by [`TreeWatcher`] feeds them to the
//! controller's debounced `notify_change` entry point.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::controller::TreeController;
use crate::error::{Result, TreeError};

/// An event crossing from the watcher thread to the controller.
#[derive(Debug)]
pub enum WatchEvent {
    /// Incremental path changes to apply.
    PathsChanged(Vec<PathBuf>),
    /// A full rescan is required (the backend dropped events, or reported a
    /// change with no paths attached).
    RescanRequired,
    /// The watcher backend reported an error.
    Error(String),
}

/// Creates a recursive notify watcher on `root` that forwards raw events
/// into `event_tx`. Access events carry no structural information and are
/// dropped at the source.
pub fn create_tree_watcher(
    root: PathBuf,
    event_tx: UnboundedSender<WatchEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher =
        recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                if event.paths.is_empty() {
                    let _ = event_tx.send(WatchEvent::RescanRequired);
                } else {
                    let _ = event_tx.send(WatchEvent::PathsChanged(event.paths));
                }
            }
            Err(error) => {
                let _ = event_tx.send(WatchEvent::Error(error.to_string()));
            }
        })
        .map_err(|error| {
            TreeError::Internal(format!(
                "failed to create filesystem watcher for {}: {error}",
                root.display()
            ))
        })?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|error| {
            TreeError::Internal(format!("failed to watch {}: {error}", root.display()))
        })?;

    Ok(watcher)
}

/// Owns a running watcher and its pump task. Dropping it stops both.
pub struct TreeWatcher {
    _watcher: RecommendedWatcher,
    pump: JoinHandle<()>,
}

impl TreeWatcher {
    /// Starts watching `root` and feeding changes into `controller`.
    pub fn attach(root: PathBuf, controller: Arc<TreeController>) -> Result<Self> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let watcher = create_tree_watcher(root.clone(), event_tx)?;

        let pump = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    WatchEvent::PathsChanged(paths) => {
                        for path in paths {
                            controller.notify_change(path);
                        }
                    }
                    WatchEvent::RescanRequired => {
                        // A root-directed change is the controller's full
                        // rescan trigger.
                        controller.notify_change(root.clone());
                    }
                    WatchEvent::Error(message) => {
                        log::warn!("watcher error for {}: {message}", root.display());
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            pump,
        })
    }
}

impl Drop for TreeWatcher {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::lock::LockRegistry;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn paths_changed_reaches_controller() {
        let temp = TempDir::new().unwrap();
        let mut file = File::create(temp.path().join("a.txt")).unwrap();
        file.write_all(b"a").unwrap();

        let config = ScanConfig {
            debounce_ms: 10,
            ..ScanConfig::default()
        };
        let controller = Arc::new(TreeController::new(
            temp.path().to_path_buf(),
            config,
            Arc::new(LockRegistry::new()),
        ));
        controller.scan().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::PathsChanged(vec![temp.path().join("b.txt")]))
            .unwrap();
        drop(tx);

        // Drive the pump loop body directly; platform watcher backends are
        // too timing-dependent to exercise here.
        while let Some(event) = rx.recv().await {
            if let WatchEvent::PathsChanged(paths) = event {
                let mut file = File::create(temp.path().join("b.txt")).unwrap();
                file.write_all(b"b").unwrap();
                for path in paths {
                    controller.notify_change(path);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(controller.last_stats().unwrap().total_files, 2);
    }

    #[tokio::test]
    async fn access_events_do_not_cross_the_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
        let forward = move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                let _ = tx.send(WatchEvent::PathsChanged(event.paths));
            }
            Err(_) => {}
        };
        forward(Ok(Event::new(EventKind::Access(
            notify::event::AccessKind::Read,
        ))));
        forward(Ok(
            Event::new(EventKind::Create(notify::event::CreateKind::File))
                .add_path(PathBuf::from("/x")),
        ));

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, WatchEvent::PathsChanged(paths) if paths.len() == 1));
        assert!(rx.try_recv().is_err());
    }
}
