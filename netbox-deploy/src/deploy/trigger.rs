//! Deploy action: start an app setup from the rewritten source tarball

use platform_models::{AppSetupApp, SourceBlob};
use tracing::info;
use url::Url;

use crate::deploy::tag::encode_version;
use crate::errors::DeployerError;
use crate::http::client::PlatformClient;

/// Parameters of one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub source_blob: SourceBlob,
    pub region: Option<String>,
    pub app_name: Option<String>,
}

impl DeployRequest {
    /// Point the platform at `<origin>/source_blob?version=<version>` and tag
    /// the build with the managed version
    pub fn new(public_origin: &str, target_version: &str) -> Result<Self, DeployerError> {
        let mut url = Url::parse(public_origin)
            .map_err(|e| DeployerError::ConfigError(format!("invalid public origin: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DeployerError::ConfigError(format!("invalid public origin: {}", public_origin)))?
            .pop_if_empty()
            .push("source_blob");
        url.query_pairs_mut().append_pair("version", target_version);

        Ok(Self {
            source_blob: SourceBlob {
                url: url.to_string(),
                version: Some(encode_version(target_version)),
            },
            region: None,
            app_name: None,
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    fn app_overrides(&self) -> Option<AppSetupApp> {
        if self.region.is_none() && self.app_name.is_none() {
            return None;
        }
        Some(AppSetupApp {
            name: self.app_name.clone(),
            region: self.region.clone(),
            organization: None,
        })
    }
}

/// Create the app setup and return its id for polling
pub async fn deploy(client: &PlatformClient, request: &DeployRequest) -> Result<String, DeployerError> {
    info!("Creating app setup from {}", request.source_blob.url);
    let setup = client
        .create_app_setup(request.source_blob.clone(), request.app_overrides())
        .await?;
    info!("App setup {} created ({})", setup.id, setup.status);
    Ok(setup.id)
}
