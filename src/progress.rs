//! Tree-change and progress notifications.
//!
//! The engine never talks to a UI directly. Observers subscribe to a
//! broadcast [`Bus`]; slow or absent receivers only lag their own channel.

use tokio::sync::broadcast;

/// Which long-running operation a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOp {
    Scan,
    Write,
}

/// Lifecycle phase of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Start,
    Progress,
    End,
    Cancel,
}

/// A discrete progress/telemetry event.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub op: ProgressOp,
    pub mode: ProgressMode,
    pub determinate: bool,
    /// Floored integer percentage, when determinate.
    pub percent: Option<u8>,
    pub message: String,
    pub total_files: Option<usize>,
    pub total_size: Option<u64>,
}

impl ProgressEvent {
    pub fn scan(mode: ProgressMode, message: impl Into<String>) -> Self {
        Self {
            op: ProgressOp::Scan,
            mode,
            determinate: false,
            percent: None,
            message: message.into(),
            total_files: None,
            total_size: None,
        }
    }
}

/// Events the presentation and digest layers react to.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// The tree structure changed (scan finished, directory hydrated, node
    /// expanded/collapsed, selection mutated).
    TreeChanged,
    /// The derived preview (selection summary) changed.
    PreviewChanged,
    Progress(ProgressEvent),
}

/// Broadcast fan-out for [`TreeEvent`]s.
#[derive(Clone)]
pub struct Bus {
    sender: broadcast::Sender<TreeEvent>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. A send error only means no subscriber is
    /// listening, which is fine for fire-and-forget notifications.
    pub fn publish(&self, event: TreeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn tree_changed(&self) {
        self.publish(TreeEvent::TreeChanged);
    }

    pub fn preview_changed(&self) {
        self.publish(TreeEvent::PreviewChanged);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn publish_and_receive_event() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.tree_changed();

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timeout")
            .expect("recv");
        assert!(matches!(received, TreeEvent::TreeChanged));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_event() {
        let bus = Bus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(TreeEvent::Progress(ProgressEvent::scan(
            ProgressMode::Start,
            "Scanning workspace",
        )));

        for rx in [&mut rx1, &mut rx2] {
            let event = rx.recv().await.expect("recv");
            assert!(
                matches!(event, TreeEvent::Progress(ref p) if p.mode == ProgressMode::Start)
            );
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = Bus::new(8);
        bus.tree_changed();
        bus.preview_changed();
    }
}
