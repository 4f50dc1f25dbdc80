//! Application configuration management.
//!
//! Holds the backend location, the event being registered for, debounce
//! windows, per-flow attendee limits and the last registration the user
//! worked on.
//!
//! Configuration is stored at `~/.config/lodgeform/config.json`. The
//! `LODGEFORM_SUPABASE_URL`, `LODGEFORM_EVENT_ID` and `LODGEFORM_PAYMENT_URL`
//! environment variables take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::form::LimitsConfig;
use crate::models::RegistrationType;
use crate::store::StoreOptions;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "lodgeform";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_SUPABASE_URL: &str = "LODGEFORM_SUPABASE_URL";
pub const ENV_EVENT_ID: &str = "LODGEFORM_EVENT_ID";
pub const ENV_PAYMENT_URL: &str = "LODGEFORM_PAYMENT_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supabase_url: Option<String>,
    pub event_id: Option<String>,
    /// Defaults to `{supabase_url}/functions/v1/create-registration`.
    pub payment_endpoint: Option<String>,
    /// Debounce window for free-text attendee fields.
    pub debounce_ms: u64,
    /// Debounce window for lodge search keystrokes.
    pub search_debounce_ms: u64,
    /// Keep same-lodge attendees in step with the primary after the box is ticked.
    pub live_lodge_sync: bool,
    pub limits: LimitsConfig,
    pub last_registration_type: Option<RegistrationType>,
    pub active_registration_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: None,
            event_id: None,
            payment_endpoint: None,
            debounce_ms: 300,
            search_debounce_ms: 300,
            live_lodge_sync: true,
            limits: LimitsConfig::default(),
            last_registration_type: None,
            active_registration_id: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_SUPABASE_URL) {
            self.supabase_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(event) = non_empty(ENV_EVENT_ID) {
            self.event_id = Some(event);
        }
        if let Some(url) = non_empty(ENV_PAYMENT_URL) {
            self.payment_endpoint = Some(url);
        }
    }

    pub fn payment_url(&self) -> Option<String> {
        self.payment_endpoint.clone().or_else(|| {
            self.supabase_url
                .as_ref()
                .map(|base| format!("{}/functions/v1/create-registration", base.trim_end_matches('/')))
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            debounce: self.debounce(),
            live_lodge_sync: self.live_lodge_sync,
        }
    }
}
