// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProtectError, Result};

/// Top-level configuration, loaded from an optional TOML file and then
/// overridden by command line flags.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Protect server connection.
    #[serde(default)]
    pub server: ServerConfig,
    /// Download behaviour shared by all subcommands.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Sync state settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Connection parameters for the Protect server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// IP address or hostname.
    #[serde(default = "default_address")]
    pub address: String,
    /// Port; defaults to 443 on UniFi OS consoles and 7443 otherwise.
    #[serde(default)]
    pub port: Option<u16>,
    /// `https` in production, `http` is accepted for local testing.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Local Protect user.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Verify the server TLS certificate (self-signed by default on Protect).
    #[serde(default)]
    pub verify_ssl: bool,
    /// Legacy Cloud Key / NVR without UniFi OS (bearer token auth).
    #[serde(default)]
    pub not_unifi_os: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: None,
            protocol: default_protocol(),
            username: default_username(),
            password: None,
            verify_ssl: false,
            not_unifi_os: false,
        }
    }
}

impl ServerConfig {
    /// Effective port, taking the console type into account.
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.not_unifi_os { 7443 } else { 443 })
    }

    /// `protocol://address:port`
    pub fn authority(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.address, self.effective_port())
    }
}

/// Download and retry behaviour.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DownloadConfig {
    /// Root directory for downloaded files.
    #[serde(default = "default_destination")]
    pub destination_path: PathBuf,
    /// Store files under `YYYY/MM/DD/<camera>/`.
    #[serde(default = "default_true")]
    pub use_subfolders: bool,
    /// Skip targets whose destination file already exists (no size check).
    #[serde(default)]
    pub skip_existing_files: bool,
    /// Create an empty placeholder file before each footage download.
    #[serde(default)]
    pub touch_files: bool,
    /// Count exhausted downloads as failed and keep going instead of aborting.
    #[serde(default)]
    pub ignore_failed_downloads: bool,
    /// Pause between consecutive downloads, in seconds.
    #[serde(default)]
    pub download_wait_secs: u64,
    /// Socket read timeout, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: f64,
    /// Attempts per target before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Lower bound for the pause between attempts, in seconds.
    #[serde(default = "default_min_retry_delay")]
    pub min_retry_delay_secs: u64,
    /// Responses smaller than this are treated as empty clips and skipped.
    #[serde(default = "default_min_payload_bytes")]
    pub min_payload_bytes: u64,
    /// Render file name timestamps in UTC instead of local time.
    #[serde(default)]
    pub use_utc_filenames: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            destination_path: default_destination(),
            use_subfolders: true,
            skip_existing_files: false,
            touch_files: false,
            ignore_failed_downloads: false,
            download_wait_secs: 0,
            download_timeout_secs: default_download_timeout(),
            max_retries: default_max_retries(),
            min_retry_delay_secs: default_min_retry_delay(),
            min_payload_bytes: default_min_payload_bytes(),
            use_utc_filenames: false,
        }
    }
}

impl DownloadConfig {
    pub fn download_wait(&self) -> Duration {
        Duration::from_secs(self.download_wait_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.download_timeout_secs)
    }
}

/// Incremental sync settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// State file name, relative to the destination directory.
    #[serde(default = "default_statefile")]
    pub statefile: String,
    /// Start from each camera's first recording instead of the saved state.
    #[serde(default)]
    pub ignore_state: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { statefile: default_statefile(), ignore_state: false }
    }
}

fn default_address() -> String { "unifi".into() }
fn default_protocol() -> String { "https".into() }
fn default_username() -> String { "ubnt".into() }
fn default_destination() -> PathBuf { PathBuf::from("./") }
fn default_true() -> bool { true }
fn default_download_timeout() -> f64 { 60.0 }
fn default_max_retries() -> u32 { 3 }
fn default_min_retry_delay() -> u64 { 3 }
fn default_min_payload_bytes() -> u64 { 300 }
fn default_statefile() -> String { "sync.state".into() }

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProtectError::Config(format!("Cannot read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProtectError::Config(format!("Invalid TOML: {e}")))
    }

    /// Check the merged configuration before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.server.address.trim().is_empty() {
            return Err(ProtectError::Config("address must not be empty".into()));
        }
        if !matches!(self.server.protocol.as_str(), "http" | "https") {
            return Err(ProtectError::Config(format!(
                "unsupported protocol '{}'",
                self.server.protocol
            )));
        }
        if self.server.password.as_deref().map_or(true, str::is_empty) {
            return Err(ProtectError::Config("password is required".into()));
        }
        if self.download.max_retries == 0 {
            return Err(ProtectError::Config("max_retries must be > 0".into()));
        }
        if !(self.download.download_timeout_secs > 0.0) {
            return Err(ProtectError::Config("download_timeout_secs must be > 0".into()));
        }
        if self.sync.statefile.trim().is_empty() {
            return Err(ProtectError::Config("statefile must not be empty".into()));
        }
        Ok(())
    }
}
