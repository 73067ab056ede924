//! Platform API models
//!
//! Only the fields netbox-deploy reads are modelled; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by builds, releases and app setups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Succeeded,
    Failed,
    /// Any status string this client does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Region reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Minimal app reference embedded in other records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Location and version tag of a source tarball
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBlob {
    pub url: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Build of an app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: String,
    pub status: Status,
    #[serde(default)]
    pub source_blob: Option<SourceBlob>,
    #[serde(default)]
    pub output_stream_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Release of an app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    /// Monotonic per app
    pub version: u64,
    pub status: Status,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Custom or default domain of an app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    pub hostname: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub cname: Option<String>,
}

/// Asynchronous app creation, build and release workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSetup {
    pub id: String,
    pub status: Status,
    #[serde(default)]
    pub app: Option<AppRef>,
    #[serde(default)]
    pub build: Option<Build>,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub resolved_success_url: Option<String>,
}

/// App settings applied when a setup creates the app
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSetupApp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

/// Body of `POST /app-setups`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSetupRequest {
    pub source_blob: SourceBlob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppSetupApp>,
}
