//! Latest build and release lookup
//!
//! The platform sorts and pages list endpoints through the `Range` request
//! header. The resolver asks for a single record ordered by recency and treats
//! an empty page as "nothing yet" rather than an error. Whatever comes back is
//! still run through a client-side selection so a platform that ignores the
//! header yields the most recent record too.

use platform_models::{Build, Release};

use crate::errors::DeployerError;
use crate::http::client::PlatformClient;

/// Newest build first, one record
pub const LATEST_BUILD_RANGE: &str = "created_at; max=1, order=desc";

/// Highest release version first, one record
pub const LATEST_RELEASE_RANGE: &str = "version; max=1, order=desc";

impl PlatformClient {
    /// Most recent build of an app, `None` for apps without builds
    pub async fn get_last_build(&self, app_id: &str) -> Result<Option<Build>, DeployerError> {
        let builds: Vec<Build> = self
            .get_range(&format!("/apps/{}/builds", app_id), LATEST_BUILD_RANGE)
            .await?;
        Ok(select_latest_build(builds))
    }

    /// Most recent release of an app, `None` for apps without releases
    pub async fn get_last_release(&self, app_id: &str) -> Result<Option<Release>, DeployerError> {
        let releases: Vec<Release> = self
            .get_range(&format!("/apps/{}/releases", app_id), LATEST_RELEASE_RANGE)
            .await?;
        Ok(select_latest_release(releases))
    }
}

/// Pick the build with the latest `created_at`. Builds without a timestamp
/// lose against any timestamped build; among equals the first one wins.
pub fn select_latest_build(builds: Vec<Build>) -> Option<Build> {
    builds.into_iter().reduce(|best, candidate| {
        if candidate.created_at > best.created_at {
            candidate
        } else {
            best
        }
    })
}

/// Pick the release with the highest `version`
pub fn select_latest_release(releases: Vec<Release>) -> Option<Release> {
    releases.into_iter().reduce(|best, candidate| {
        if candidate.version > best.version {
            candidate
        } else {
            best
        }
    })
}
