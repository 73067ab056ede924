//! Server state

use reqwest::Client;

use crate::archive::source::template_tarball_url;
use crate::errors::DeployerError;

/// Server state shared across handlers
pub struct ServerState {
    /// Client used to download the template tarball
    pub http_client: Client,

    /// Tarball the source blob endpoint rewrites
    pub template_url: String,
}

impl ServerState {
    pub fn new(template_repo: &str, template_ref: &str) -> Result<Self, DeployerError> {
        let http_client = Client::builder()
            .user_agent(concat!("netbox-deploy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(http_client, template_tarball_url(template_repo, template_ref)))
    }

    pub fn with_client(http_client: Client, template_url: String) -> Self {
        Self {
            http_client,
            template_url,
        }
    }
}
