//! Server settings.
//!
//! Read from `~/.config/calmirror/config.toml` (or `--config`), then overridden by
//! `CALMIRROR_*` environment variables. Nested keys use a double underscore:
//! `CALMIRROR_GOOGLE__CLIENT_ID`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use calmirror_core::constants::{DEFAULT_MAX_CONCURRENT_SYNCS, DEFAULT_PAGE_SIZE};
use calmirror_provider_google::Credentials;

static DEFAULT_DATA_DIR: &str = "~/.calmirror";

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4096))
}

fn default_site_url() -> String {
    "http://127.0.0.1:4096".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_max_concurrent_syncs() -> usize {
    DEFAULT_MAX_CONCURRENT_SYNCS
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public URL this server is reachable at. Webhook and action links point here.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default = "default_max_concurrent_syncs")]
    pub max_concurrent_syncs: usize,

    /// Users fetched per directory page during a sweep.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Incoming-webhook URL of the chat system. Messages are only logged when unset.
    pub messenger_url: Option<String>,

    #[serde(default)]
    pub google: Credentials,
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("calmirror");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings from `path` (or the default location) and the environment.
    /// A missing file is fine; every field has a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        Config::builder()
            .add_source(File::from(path.clone()).required(false))
            .add_source(
                Environment::with_prefix("CALMIRROR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// `data_dir` with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir.to_string_lossy()).into_owned())
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_path().join("store")
    }

    pub fn users_dir(&self) -> PathBuf {
        self.data_path().join("users")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_path().join("sessions")
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();

        assert_eq!(settings.listen_addr, default_listen_addr());
        assert_eq!(settings.sync_interval_secs, 60);
        assert_eq!(settings.max_concurrent_syncs, 20);
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert!(settings.messenger_url.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "0.0.0.0:8080"
site_url = "https://chat.example.com/plugins/calendar"
data_dir = "/var/lib/calmirror"
max_concurrent_syncs = 5
messenger_url = "https://chat.example.com/hooks/abc"

[google]
client_id = "id.apps.googleusercontent.com"
client_secret = "shh"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.listen_addr.port(), 8080);
        assert_eq!(settings.max_concurrent_syncs, 5);
        assert_eq!(settings.google.client_id, "id.apps.googleusercontent.com");
        assert_eq!(settings.data_path(), PathBuf::from("/var/lib/calmirror"));
        assert_eq!(settings.users_dir(), PathBuf::from("/var/lib/calmirror/users"));
    }

    #[test]
    fn tilde_is_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap();

        assert!(!settings.data_path().to_string_lossy().starts_with('~'));
        assert!(settings.data_path().ends_with(".calmirror"));
    }
}
