//! Application configuration options

use std::time::Duration;

use crate::storage::settings::Settings;
use crate::utils::CooldownOptions;
use crate::workers::poller;

/// Options of the `serve` command
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub server: ServerOptions,

    /// Repository whose tarball is rewritten
    pub template_repo: String,

    /// Git ref of the tarball
    pub template_ref: String,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            template_repo: settings.source_blob.template_repo.clone(),
            template_ref: settings.source_blob.template_ref.clone(),
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

/// Poller options from the settings file
pub fn poller_options(settings: &Settings) -> poller::Options {
    let interval = Duration::from_millis(settings.poller.interval_ms.max(1));
    poller::Options {
        interval,
        initial_delay: Duration::ZERO,
        max_fetch_errors: settings.poller.max_fetch_errors,
        cooldown: CooldownOptions {
            base_delay: interval,
            ..Default::default()
        },
    }
}
