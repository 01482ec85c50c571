//! Mutation notifications for the background push task

use tokio::sync::mpsc;
use tracing::debug;

/// Which collection a successful mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Cellars,
    Bottles,
    Settings,
    /// A backup import replaced one or more collections
    Import,
}

/// Sending half handed to the store. Sends never block and never fail the
/// caller.
#[derive(Debug, Clone)]
pub struct SyncNotifier {
    tx: mpsc::UnboundedSender<Change>,
}

impl SyncNotifier {
    pub fn notify(&self, change: Change) {
        if let Err(e) = self.tx.send(change) {
            debug!("No sync listener, dropping {:?} notification", e.0);
        }
    }
}

/// Create a notifier and the receiver the push task drains
pub fn notification_channel() -> (SyncNotifier, mpsc::UnboundedReceiver<Change>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SyncNotifier { tx }, rx)
}
