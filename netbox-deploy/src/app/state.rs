//! Per-session application state

use std::sync::Arc;

use tracing::info;

use crate::errors::DeployerError;
use crate::http::client::PlatformClient;
use crate::storage::settings::Settings;

/// State shared by the platform commands of one session. The client is built
/// once from the access token and passed to every component explicitly.
pub struct AppState {
    pub settings: Settings,
    pub platform: Arc<PlatformClient>,
}

impl AppState {
    /// Initialize application state from settings and the token environment
    pub fn init(settings: Settings) -> Result<Self, DeployerError> {
        info!("Connecting to {}", settings.platform.api_base);

        let token = settings.platform.access_token()?;
        let platform = Arc::new(PlatformClient::new(&settings.platform.api_base, token)?);

        Ok(Self { settings, platform })
    }
}
