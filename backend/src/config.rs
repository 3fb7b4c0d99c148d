//! Runtime configuration.
//!
//! Built in three layers: built-in defaults, then an optional YAML file
//! (path in `PETNFC_CONFIG`), then environment variables.
//!
//! ```yaml
//! data_dir: /var/lib/petnfc
//! bind_addr: 0.0.0.0:3000
//! cors_origin: http://localhost:8080
//! nfc_bridge_enabled: true
//! seed_demo_profile: true
//! log_filter: info,petnfc_backend=debug
//! gemini:
//!   model: gemini-3-flash-preview
//!   timeout_secs: 30
//! ```
//!
//! The Gemini API key is only read from `GEMINI_API_KEY` or the file's
//! `gemini.api_key`. Without a key the assistant features are disabled.

use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "PETNFC_CONFIG";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the profile snapshot
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// Browser origin allowed to call the API
    pub cors_origin: String,
    /// Accept tag readings from an external bridge device
    pub nfc_bridge_enabled: bool,
    /// Start with the demo profile when no profiles are saved
    pub seed_demo_profile: bool,
    /// Default `tracing` filter, overridden by `RUST_LOG`
    pub log_filter: String,
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Shape of the YAML file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    bind_addr: Option<SocketAddr>,
    cors_origin: Option<String>,
    nfc_bridge_enabled: Option<bool>,
    seed_demo_profile: Option<bool>,
    log_filter: Option<String>,
    #[serde(default)]
    gemini: FileGeminiConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileGeminiConfig {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load from the file named by `PETNFC_CONFIG` (if any) and the process
    /// environment
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::load_from(file.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn load_from(file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file_config = match file {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_yaml::from_str::<FileConfig>(&yaml)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let data_dir = match env("PETNFC_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => file_config.data_dir.unwrap_or_else(default_data_dir),
        };

        let bind_addr: SocketAddr = match env("PETNFC_BIND_ADDR") {
            Some(addr) => addr
                .parse()
                .with_context(|| format!("Invalid PETNFC_BIND_ADDR: {}", addr))?,
            None => match file_config.bind_addr {
                Some(addr) => addr,
                None => DEFAULT_BIND_ADDR.parse()?,
            },
        };

        let nfc_bridge_enabled = match env("PETNFC_NFC_ENABLED") {
            Some(value) => parse_flag("PETNFC_NFC_ENABLED", &value)?,
            None => file_config.nfc_bridge_enabled.unwrap_or(true),
        };
        let seed_demo_profile = match env("PETNFC_SEED_DEMO") {
            Some(value) => parse_flag("PETNFC_SEED_DEMO", &value)?,
            None => file_config.seed_demo_profile.unwrap_or(true),
        };

        let gemini_file = file_config.gemini;
        let gemini = env("GEMINI_API_KEY")
            .or(gemini_file.api_key)
            .filter(|key| !key.trim().is_empty())
            .map(|key| GeminiConfig {
                api_key: SecretString::from(key),
                model: env("GEMINI_MODEL")
                    .or(gemini_file.model)
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                base_url: gemini_file
                    .base_url
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                timeout: Duration::from_secs(gemini_file.timeout_secs.unwrap_or(DEFAULT_GEMINI_TIMEOUT_SECS)),
            });

        let config = Self {
            data_dir,
            bind_addr,
            cors_origin: env("PETNFC_CORS_ORIGIN")
                .or(file_config.cors_origin)
                .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            nfc_bridge_enabled,
            seed_demo_profile,
            log_filter: env("PETNFC_LOG")
                .or(file_config.log_filter)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            gemini,
        };

        Ok(config)
    }

    /// One-line description for the startup log. Secrets are left out.
    pub fn summary(&self) -> String {
        format!(
            "data_dir={}, bind_addr={}, nfc_bridge={}, gemini={}",
            self.data_dir.display(),
            self.bind_addr,
            self.nfc_bridge_enabled,
            self.gemini.as_ref().map_or("off", |g| g.model.as_str())
        )
    }
}

/// `~/Documents/PetNFC`, or `./PetNFC` when there is no documents folder
fn default_data_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("PetNFC")
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Invalid value for {}: {}", name, other),
    }
}
