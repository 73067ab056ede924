//! App API client

use std::collections::BTreeMap;

use platform_models::{App, Domain};

use crate::errors::DeployerError;
use crate::http::client::PlatformClient;

impl PlatformClient {
    /// List all apps visible to the token
    pub async fn get_apps(&self) -> Result<Vec<App>, DeployerError> {
        self.get("/apps").await
    }

    pub async fn get_app(&self, app_id: &str) -> Result<App, DeployerError> {
        self.get(&format!("/apps/{}", app_id)).await
    }

    /// Config vars of an app
    pub async fn get_app_env(&self, app_id: &str) -> Result<BTreeMap<String, String>, DeployerError> {
        let vars: BTreeMap<String, Option<String>> =
            self.get(&format!("/apps/{}/config-vars", app_id)).await?;
        Ok(vars
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect())
    }

    pub async fn get_domains(&self, app_id: &str) -> Result<Vec<Domain>, DeployerError> {
        self.get(&format!("/apps/{}/domains", app_id)).await
    }
}
