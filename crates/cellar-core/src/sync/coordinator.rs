//! Sync coordinator
//!
//! Mirrors the whole dataset to one remote file. Pull replaces local
//! collections with the remote document; push replaces the remote document
//! with the local one. There is no merge: whichever side writes last wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::SyncError;
use super::notifier::Change;
use super::remote::{Credential, RemoteStore};
use crate::backup::{export_from, import_into};
use crate::storage::{lock, SharedMedium};

/// Default name of the remote file
pub const DEFAULT_FILE_NAME: &str = "cellarvision_db.json";

/// What a push did to the remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Created,
    Updated,
}

/// Exchanges the local dataset with a remote store
pub struct SyncCoordinator<R: RemoteStore> {
    remote: R,
    medium: SharedMedium,
    file_name: String,
    credential: Mutex<Option<Credential>>,
    enabled: AtomicBool,
    /// Serializes pushes so two of them never race to create the file
    push_gate: tokio::sync::Mutex<()>,
}

impl<R: RemoteStore> SyncCoordinator<R> {
    pub fn new(remote: R, medium: SharedMedium) -> Self {
        Self::with_file_name(remote, medium, DEFAULT_FILE_NAME)
    }

    pub fn with_file_name(remote: R, medium: SharedMedium, file_name: impl Into<String>) -> Self {
        Self {
            remote,
            medium,
            file_name: file_name.into(),
            credential: Mutex::new(None),
            enabled: AtomicBool::new(false),
            push_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    // ==================== State ====================

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Allow background pushes
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        info!("Cloud sync enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        info!("Cloud sync disabled");
    }

    pub fn is_signed_in(&self) -> bool {
        self.credential().is_some()
    }

    /// Set the credential without pulling
    pub fn sign_in(&self, credential: Credential) {
        *self.credential_slot() = Some(credential);
    }

    /// Forget the credential and stop background pushes
    pub fn sign_out(&self) {
        *self.credential_slot() = None;
        self.disable();
    }

    fn credential(&self) -> Option<Credential> {
        self.credential_slot().clone()
    }

    /// Lock the credential, recovering it if a holder panicked
    fn credential_slot(&self) -> MutexGuard<'_, Option<Credential>> {
        self.credential.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Transfers ====================

    /// Replace local collections with the remote document.
    ///
    /// Stores `credential` for later pushes. Returns `false` when there is no
    /// remote file yet; local data is then left alone.
    pub async fn pull(&self, credential: Credential) -> Result<bool, SyncError> {
        self.sign_in(credential.clone());

        let Some(file) = self.remote.find_file(&credential, &self.file_name).await? else {
            info!("No remote copy named {} yet", self.file_name);
            return Ok(false);
        };
        let payload = self.remote.download(&credential, &file).await?;

        let summary = {
            let mut medium = lock(&self.medium)?;
            import_into(&mut **medium, &payload)?
        };
        info!(
            "Pulled {} (cellars: {:?}, bottles: {:?})",
            self.file_name, summary.cellars, summary.bottles
        );
        Ok(true)
    }

    /// Upload the whole local dataset, creating the remote file if needed
    pub async fn push(&self) -> Result<PushOutcome, SyncError> {
        let credential = self.credential().ok_or(SyncError::NotAuthenticated)?;
        let _gate = self.push_gate.lock().await;

        let payload = {
            let medium = lock(&self.medium)?;
            export_from(&**medium)?.to_json()?
        };

        let outcome = match self.remote.find_file(&credential, &self.file_name).await? {
            Some(file) => {
                self.remote.update(&credential, &file, &payload).await?;
                PushOutcome::Updated
            }
            None => {
                self.remote.create(&credential, &self.file_name, &payload).await?;
                PushOutcome::Created
            }
        };
        info!("Pushed {} bytes to {} ({:?})", payload.len(), self.file_name, outcome);
        Ok(outcome)
    }

    /// Spawn the background push task.
    ///
    /// Bursts of notifications collapse into one push. Failures are logged
    /// and dropped; the next mutation tries again. The task ends once every
    /// notifier has been dropped.
    pub fn start(self: &Arc<Self>, mut changes: mpsc::UnboundedReceiver<Change>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(first) = changes.recv().await {
                let mut pending = 1;
                while changes.try_recv().is_ok() {
                    pending += 1;
                }

                if !coordinator.is_enabled() {
                    debug!("Sync disabled, skipping push for {} change(s)", pending);
                    continue;
                }

                debug!("Pushing after {} change(s), first {:?}", pending, first);
                if let Err(e) = coordinator.push().await {
                    warn!("Background sync push failed: {}", e);
                }
            }
            debug!("Sync notifications closed, push task exiting");
        })
    }
}
