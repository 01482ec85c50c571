//! Cloud drive sync
//!
//! Keeps one remote file (`cellarvision_db.json` by default) as a mirror of
//! the whole dataset.
//!
//! ## Flow
//!
//! 1. `pull` with a credential replaces local collections with the remote copy
//! 2. The store sends a [`Change`] through its [`SyncNotifier`] after every
//!    successful mutation
//! 3. The background task started by [`SyncCoordinator::start`] pushes the
//!    full dataset when sync is enabled
//!
//! ## Usage
//!
//! ```ignore
//! let (notifier, changes) = notification_channel();
//! store.attach_sync(notifier);
//!
//! let coordinator = Arc::new(SyncCoordinator::new(drive, store.shared_medium()));
//! coordinator.pull(Credential::new(token)).await?;
//! coordinator.enable();
//! let task = coordinator.start(changes);
//! ```

mod coordinator;
mod drive;
mod error;
mod notifier;
mod remote;

pub use coordinator::{PushOutcome, SyncCoordinator, DEFAULT_FILE_NAME};
pub use drive::{DriveClient, DEFAULT_API_URL};
pub use error::SyncError;
pub use notifier::{notification_channel, Change, SyncNotifier};
pub use remote::{Credential, RemoteFile, RemoteStore};
