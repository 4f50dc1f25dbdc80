use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "lodgeform";

/// Keychain account the backend key is stored under.
const API_KEY_ACCOUNT: &str = "supabase-api-key";

pub const ENV_SUPABASE_KEY: &str = "LODGEFORM_SUPABASE_KEY";

pub struct CredentialStore;

impl CredentialStore {
    fn entry() -> Result<Entry> {
        Entry::new(SERVICE_NAME, API_KEY_ACCOUNT).context("Failed to create keyring entry")
    }

    /// Store the backend API key in the OS keychain
    pub fn store(api_key: &str) -> Result<()> {
        Self::entry()?
            .set_password(api_key.trim())
            .context("Failed to store API key in keychain")?;
        Ok(())
    }

    pub fn get_api_key() -> Result<String> {
        Self::entry()?
            .get_password()
            .context("Failed to retrieve API key from keychain")
    }

    pub fn delete() -> Result<()> {
        Self::entry()?
            .delete_credential()
            .context("Failed to delete API key from keychain")?;
        Ok(())
    }

    pub fn has_api_key() -> bool {
        Self::entry()
            .map(|entry| entry.get_password().is_ok())
            .unwrap_or(false)
    }
}

/// Pick the API key: a non-empty `env_value` first, then the keychain.
pub fn resolve_api_key(env_value: Option<String>) -> Option<String> {
    if let Some(key) = env_value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        debug!("Using API key from environment");
        return Some(key);
    }
    match CredentialStore::get_api_key() {
        Ok(key) => Some(key),
        Err(e) => {
            debug!(error = %e, "No API key in keychain");
            None
        }
    }
}
