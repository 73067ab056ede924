//! App setup API client

use async_trait::async_trait;
use platform_models::{AppSetup, AppSetupApp, AppSetupRequest, SourceBlob};

use crate::errors::DeployerError;
use crate::http::client::PlatformClient;

/// Source of app setup records, abstracted for the poller
#[async_trait]
pub trait SetupSource: Send + Sync {
    async fn fetch_setup(&self, setup_id: &str) -> Result<AppSetup, DeployerError>;
}

impl PlatformClient {
    /// Start an app setup from a source tarball
    pub async fn create_app_setup(
        &self,
        source_blob: SourceBlob,
        app: Option<AppSetupApp>,
    ) -> Result<AppSetup, DeployerError> {
        let body = AppSetupRequest { source_blob, app };
        self.post("/app-setups", &body).await
    }

    pub async fn get_app_setup(&self, setup_id: &str) -> Result<AppSetup, DeployerError> {
        self.get(&format!("/app-setups/{}", setup_id)).await
    }
}

#[async_trait]
impl SetupSource for PlatformClient {
    async fn fetch_setup(&self, setup_id: &str) -> Result<AppSetup, DeployerError> {
        self.get_app_setup(setup_id).await
    }
}
