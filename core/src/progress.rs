use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Error, Result};

/// Today's progress as shown by the home-screen widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub target_calories: i16,
    pub current_calories: i16,
    pub reload_timeline: bool,
}

/// Receiver of progress snapshots registered by the host.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, snapshot: &ProgressSnapshot) -> Result<()>;
}

/// Deliver `snapshot` without letting a failure reach the caller.
pub fn notify(sink: Option<&dyn ProgressSink>, snapshot: ProgressSnapshot) {
    let Some(sink) = sink else {
        return;
    };
    match sink.publish(&snapshot) {
        Ok(()) => tracing::debug!(
            target_calories = snapshot.target_calories,
            current_calories = snapshot.current_calories,
            "Published progress snapshot"
        ),
        Err(e) => tracing::warn!(error = %e, "Failed to publish progress snapshot"),
    }
}

/// Forwards snapshots into a host-owned channel.
pub struct ChannelSink {
    sender: UnboundedSender<ProgressSnapshot>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: UnboundedSender<ProgressSnapshot>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        self.sender
            .send(*snapshot)
            .map_err(|_| Error::Background("progress receiver dropped".to_string()))
    }
}

/// Writes the latest snapshot as JSON to a file shared with the widget.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn read(&self) -> Result<Option<ProgressSnapshot>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ProgressSink for SnapshotFile {
    fn publish(&self, snapshot: &ProgressSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
