//! Settings file management

use anyhow::Context;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::DeployerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::storage::layout::StorageLayout;

/// netbox-deploy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub source_blob: SourceBlobSettings,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub poller: PollerSettings,
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub async fn load(file: &File) -> Result<Self, DeployerError> {
        Ok(file.read_json_opt::<Settings>().await?.unwrap_or_default())
    }
}

/// Load the settings named by `--config`, or those of the default layout
pub async fn load_settings(config_path: Option<&str>) -> anyhow::Result<Settings> {
    let file = match config_path {
        Some(path) => File::new(path),
        None => StorageLayout::default().settings_file(),
    };
    Settings::load(&file)
        .await
        .with_context(|| format!("unable to read settings file {}", file.path().display()))
}

/// Platform API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable holding the OAuth access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Region new apps are created in
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_api_base() -> String {
    "https://api.heroku.com".to_string()
}

fn default_token_env() -> String {
    "HEROKU_API_TOKEN".to_string()
}

fn default_region() -> String {
    "eu".to_string()
}

impl PlatformSettings {
    /// Read the access token from the configured environment variable
    pub fn access_token(&self) -> Result<SecretString, DeployerError> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
            _ => Err(DeployerError::ConfigError(format!(
                "{} is not set in the environment",
                self.token_env
            ))),
        }
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            region: default_region(),
        }
    }
}

/// Source tarball settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBlobSettings {
    /// Upstream repository whose tarball is rewritten
    #[serde(default = "default_template_repo")]
    pub template_repo: String,

    #[serde(default = "default_template_ref")]
    pub template_ref: String,

    /// Public origin under which `/source_blob` is reachable by the platform
    #[serde(default = "default_public_origin")]
    pub public_origin: String,

    /// Netbox version deployed by default
    #[serde(default = "default_target_version")]
    pub target_version: String,
}

fn default_template_repo() -> String {
    "https://github.com/mraerino/netbox-heroku".to_string()
}

fn default_template_ref() -> String {
    "main".to_string()
}

fn default_public_origin() -> String {
    "https://netbox-deploy.netlify.com".to_string()
}

fn default_target_version() -> String {
    "v2.6.7".to_string()
}

impl Default for SourceBlobSettings {
    fn default() -> Self {
        Self {
            template_repo: default_template_repo(),
            template_ref: default_template_ref(),
            public_origin: default_public_origin(),
            target_version: default_target_version(),
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Setup poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive failed fetches tolerated before polling gives up
    #[serde(default = "default_max_fetch_errors")]
    pub max_fetch_errors: u32,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_fetch_errors() -> u32 {
    5
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_fetch_errors: default_max_fetch_errors(),
        }
    }
}
