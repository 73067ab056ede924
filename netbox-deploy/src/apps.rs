//! Managed app listing and overview

use std::collections::BTreeMap;

use futures::future::join_all;
use platform_models::{App, Build, Domain, Release};
use serde::Serialize;
use tracing::{debug, warn};

use crate::deploy::tag::decode_version;
use crate::errors::DeployerError;
use crate::http::client::PlatformClient;
use crate::utils::is_truthy;

/// Config var toggling Netbox's login requirement
pub const LOGIN_REQUIRED: &str = "LOGIN_REQUIRED";

/// Managed version of a build, `None` when it was not deployed by this tool
pub fn managed_version(build: &Build) -> Option<String> {
    build
        .source_blob
        .as_ref()
        .and_then(|blob| blob.version.as_deref())
        .and_then(decode_version)
}

/// One row of the app list
#[derive(Debug, Clone, Serialize)]
pub struct AppSummary {
    pub app: App,

    /// Version deployed by this tool, `None` for unmanaged apps
    pub version: Option<String>,

    /// Set when the latest build could not be looked up
    pub error: Option<String>,
}

impl AppSummary {
    pub fn is_managed(&self) -> bool {
        self.version.is_some()
    }
}

/// List all apps and classify them by their latest build. The build lookups
/// run concurrently; a failed lookup marks that row instead of failing the list.
pub async fn list_apps(client: &PlatformClient) -> Result<Vec<AppSummary>, DeployerError> {
    let apps = client.get_apps().await?;
    debug!("Resolving latest builds of {} apps", apps.len());

    let builds = join_all(apps.iter().map(|app| client.get_last_build(&app.id))).await;

    Ok(apps
        .into_iter()
        .zip(builds)
        .map(|(app, build)| match build {
            Ok(build) => AppSummary {
                version: build.as_ref().and_then(managed_version),
                app,
                error: None,
            },
            Err(e) => {
                warn!("Failed to load latest build of {}: {}", app.name, e);
                AppSummary {
                    app,
                    version: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect())
}

/// Everything the management view shows about one app
#[derive(Debug, Clone, Serialize)]
pub struct AppOverview {
    pub app: App,
    pub build: Build,
    pub release: Release,
    pub version: String,
    pub env: BTreeMap<String, String>,
    pub domains: Vec<Domain>,
}

impl AppOverview {
    /// Whether Netbox requires a login; on unless explicitly disabled
    pub fn login_required(&self) -> bool {
        self.env
            .get(LOGIN_REQUIRED)
            .map(|value| is_truthy(value))
            .unwrap_or(true)
    }
}

/// Load a managed app with its latest build and release, config vars and
/// domains, all fetched concurrently
pub async fn load_app_overview(client: &PlatformClient, app_id: &str) -> Result<AppOverview, DeployerError> {
    let (app, build, release, env, domains) = tokio::try_join!(
        client.get_app(app_id),
        client.get_last_build(app_id),
        client.get_last_release(app_id),
        client.get_app_env(app_id),
        client.get_domains(app_id),
    )?;

    assemble_overview(app, build, release, env, domains)
}

fn assemble_overview(
    app: App,
    build: Option<Build>,
    release: Option<Release>,
    env: BTreeMap<String, String>,
    domains: Vec<Domain>,
) -> Result<AppOverview, DeployerError> {
    let (Some(build), Some(release)) = (build, release) else {
        return Err(DeployerError::ValidationError("Failed to load all data".to_string()));
    };

    let version = managed_version(&build)
        .ok_or_else(|| DeployerError::ValidationError("App not managed by this tool".to_string()))?;

    Ok(AppOverview {
        app,
        build,
        release,
        version,
        env,
        domains,
    })
}
