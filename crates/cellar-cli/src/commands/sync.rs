//! Sync command handlers and the background push session

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cellar_core::sync::{notification_channel, PushOutcome};
use cellar_core::{Config, Credential, DriveClient, Store, SyncCoordinator, SyncError};

use crate::output::{Output, OutputFormat};

/// Background pushes for the lifetime of one command
pub struct SyncSession {
    coordinator: Arc<SyncCoordinator<DriveClient>>,
    task: JoinHandle<()>,
    timeout: Duration,
}

impl SyncSession {
    /// Start pushing after every mutation when sync is enabled and a token
    /// is available. Returns `None` otherwise.
    pub fn attach(store: &mut Store, token: Option<String>) -> Result<Option<Self>> {
        let config = store.config().clone();
        let Some(token) = token.filter(|_| config.sync_enabled) else {
            return Ok(None);
        };

        let coordinator = Arc::new(coordinator(store, &config)?);
        coordinator.sign_in(Credential::new(token));
        coordinator.enable();

        let (notifier, changes) = notification_channel();
        store.attach_sync(notifier);
        let task = coordinator.start(changes);
        debug!("Background sync attached to {}", coordinator.file_name());

        Ok(Some(Self {
            coordinator,
            task,
            timeout: Duration::from_secs(config.sync_timeout_secs),
        }))
    }

    /// Stop notifying and wait for pending pushes, bounded by the timeout
    pub async fn finish(self, store: &mut Store) {
        drop(store.detach_sync());
        match tokio::time::timeout(self.timeout, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Sync task failed: {}", e),
            Err(_) => {
                warn!(
                    "Sync push to {} did not finish within {}s",
                    self.coordinator.file_name(),
                    self.timeout.as_secs()
                );
                eprintln!("Warning: cloud sync timed out; run `cellar sync push` to retry.");
            }
        }
    }
}

/// Replace local data with the cloud copy
pub async fn pull(store: &Store, token: Option<String>, output: &Output) -> Result<()> {
    let config = store.config();
    let credential = credential(token)?;
    let coordinator = coordinator(store, config)?;

    let found = bounded(config, coordinator.pull(credential)).await?;

    if !found {
        output.message(&format!(
            "No cloud copy named {} yet; local data left unchanged.",
            coordinator.file_name()
        ));
        return Ok(());
    }

    let cellars = store.cellars()?.len();
    let bottles = store.bottles()?.len();
    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "status": "success",
            "file": coordinator.file_name(),
            "cellars": cellars,
            "bottles": bottles
        })),
        OutputFormat::Quiet => {}
        OutputFormat::Human => output.success(&format!(
            "Pulled {}: {} cellar(s), {} bottle(s)",
            coordinator.file_name(),
            cellars,
            bottles
        )),
    }
    Ok(())
}

/// Upload local data to the cloud copy
pub async fn push(store: &Store, token: Option<String>, output: &Output) -> Result<()> {
    let config = store.config();
    let coordinator = coordinator(store, config)?;
    coordinator.sign_in(credential(token)?);

    let outcome = bounded(config, coordinator.push()).await?;
    let verb = match outcome {
        PushOutcome::Created => "Created",
        PushOutcome::Updated => "Updated",
    };
    output.success(&format!("{} {}", verb, coordinator.file_name()));
    Ok(())
}

pub fn status(store: &Store, has_token: bool, output: &Output) -> Result<()> {
    let config = store.config();
    let auto = config.sync_enabled && has_token;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "sync_enabled": config.sync_enabled,
            "token_present": has_token,
            "background_push": auto,
            "api_url": config.sync_api_url,
            "file_name": config.sync_file_name,
            "timeout_secs": config.sync_timeout_secs
        })),
        OutputFormat::Quiet => println!("{}", if auto { "enabled" } else { "disabled" }),
        OutputFormat::Human => {
            println!("Sync:");
            println!(
                "  Status:  {}",
                if config.sync_enabled { "enabled" } else { "disabled" }
            );
            println!("  Token:   {}", if has_token { "present" } else { "missing" });
            println!("  Server:  {}", config.sync_api_url);
            println!("  File:    {}", config.sync_file_name);
            println!("  Timeout: {}s", config.sync_timeout_secs);
            if config.sync_enabled && !has_token {
                println!();
                println!("Set CELLAR_SYNC_TOKEN or pass --token to push changes automatically.");
            }
        }
    }
    Ok(())
}

fn coordinator(store: &Store, config: &Config) -> Result<SyncCoordinator<DriveClient>> {
    let drive = DriveClient::new(
        config.sync_api_url.clone(),
        Some(Duration::from_secs(config.sync_timeout_secs)),
    )
    .context("Failed to create cloud drive client")?;
    Ok(SyncCoordinator::with_file_name(
        drive,
        store.shared_medium(),
        config.sync_file_name.clone(),
    ))
}

fn credential(token: Option<String>) -> Result<Credential> {
    match token.filter(|t| !t.trim().is_empty()) {
        Some(token) => Ok(Credential::new(token.trim())),
        None => bail!("No access token. Pass --token or set CELLAR_SYNC_TOKEN."),
    }
}

/// Run a transfer under the configured timeout
async fn bounded<T>(
    config: &Config,
    transfer: impl std::future::Future<Output = Result<T, SyncError>>,
) -> Result<T> {
    let limit = Duration::from_secs(config.sync_timeout_secs);
    match tokio::time::timeout(limit, transfer).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.needs_sign_in() => {
            Err(anyhow::Error::new(e).context("Cloud drive rejected the access token; sign in again"))
        }
        Ok(Err(e)) => Err(anyhow::Error::new(e).context("Sync failed")),
        Err(_) => bail!("Sync timed out after {}s", limit.as_secs()),
    }
}
