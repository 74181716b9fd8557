use std::sync::Arc;

use anyhow::{Context, Result};
use shared::domain::Credential;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Storage;

pub const COMPUTE_API_KEY: &str = "compute_api_key";

/// Asks the user for the access key. Blocking; `None` means the user declined.
pub trait CredentialPrompt: Send + Sync {
    fn prompt(&self, label: &str) -> Option<String>;
}

pub struct CredentialStore {
    storage: Storage,
    prompt: Arc<dyn CredentialPrompt>,
    // Outer `Option` is "not resolved yet"; inner is the resolved value.
    resolved: Mutex<Option<Option<Credential>>>,
}

impl CredentialStore {
    pub fn new(storage: Storage, prompt: Arc<dyn CredentialPrompt>) -> Self {
        Self {
            storage,
            prompt,
            resolved: Mutex::new(None),
        }
    }

    /// Returns the stored key, prompting and persisting it if none is stored yet.
    pub async fn credential(&self) -> Result<Option<Credential>> {
        let mut resolved = self.resolved.lock().await;
        if let Some(cached) = resolved.as_ref() {
            return Ok(cached.clone());
        }

        if let Some(stored) = self.storage.load_setting(COMPUTE_API_KEY).await? {
            debug!("using persisted compute api key");
            let credential = Some(Credential::new(stored.value));
            *resolved = Some(credential.clone());
            return Ok(credential);
        }

        let prompt = Arc::clone(&self.prompt);
        let entered = tokio::task::spawn_blocking(move || prompt.prompt("Compute server API key"))
            .await
            .context("credential prompt task failed")?;

        let credential = match entered {
            Some(value) if !value.is_empty() => {
                self.storage.store_setting(COMPUTE_API_KEY, &value).await?;
                info!("persisted compute api key");
                Some(Credential::new(value))
            }
            _ => {
                info!("no compute api key entered; requests will be unauthenticated");
                None
            }
        };

        *resolved = Some(credential.clone());
        Ok(credential)
    }

    /// Removes the persisted key; the next lookup prompts again.
    pub async fn forget(&self) -> Result<bool> {
        let removed = self.storage.delete_setting(COMPUTE_API_KEY).await?;
        *self.resolved.lock().await = None;
        Ok(removed)
    }
}
