//! Deployment state derived from polled app setup records
//!
//! The state is a pure function of the latest `AppSetup`. It is recomputed
//! from scratch on every poll and never patched from a previous record.

use platform_models::{AppSetup, Status};
use serde::{Deserialize, Serialize};

/// Message shown when the platform reports a failure without details
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Deployment state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum DeploymentState {
    /// No record fetched yet
    Loading,

    /// Setup pending, app being created, no build yet
    Initializing,

    /// Build running
    Building,

    /// Build succeeded, release not yet reflected in the setup
    Releasing,

    /// Setup succeeded
    Finished,

    /// Setup or build failed, with the user-facing message
    Failed(String),
}

impl DeploymentState {
    /// Whether polling should stop
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentState::Finished | DeploymentState::Failed(_))
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            DeploymentState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeploymentState::Loading => "loading",
            DeploymentState::Initializing => "initializing",
            DeploymentState::Building => "building",
            DeploymentState::Releasing => "releasing",
            DeploymentState::Finished => "finished",
            DeploymentState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentState::Failed(message) => write!(f, "failed: {}", message),
            other => f.write_str(other.label()),
        }
    }
}

/// Derive the deployment state from a freshly fetched setup record
pub fn derive_state(setup: &AppSetup) -> DeploymentState {
    match setup.status {
        Status::Failed => DeploymentState::Failed(failure_message(setup)),
        Status::Succeeded => DeploymentState::Finished,
        Status::Pending => match setup.build.as_ref().map(|build| build.status) {
            None => DeploymentState::Initializing,
            Some(Status::Failed) => DeploymentState::Failed(failure_message(setup)),
            Some(Status::Succeeded) => DeploymentState::Releasing,
            Some(Status::Pending) | Some(Status::Unknown) => DeploymentState::Building,
        },
        Status::Unknown => DeploymentState::Loading,
    }
}

fn failure_message(setup: &AppSetup) -> String {
    setup
        .failure_message
        .as_deref()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

/// One step of the progress display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepIndicator {
    pub started: bool,
    pub done: bool,
    pub error: bool,
}

impl StepIndicator {
    pub fn symbol(&self) -> &'static str {
        match (self.started, self.done, self.error) {
            (false, _, _) => "",
            (true, false, _) => "⏳",
            (true, true, false) => "✅",
            (true, true, true) => "❌",
        }
    }
}

/// Progress of the three phases of a setup: creating the app, building it
/// and starting the server process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetupProgress {
    pub create_app: StepIndicator,
    pub build: StepIndicator,
    pub release: StepIndicator,
}

impl SetupProgress {
    pub fn from_setup(setup: &AppSetup) -> Self {
        let setup_failed = setup.status == Status::Failed;
        let build_status = setup.build.as_ref().map(|build| build.status);

        let create_app = StepIndicator {
            started: true,
            done: build_status.is_some() || setup.status != Status::Pending,
            error: setup_failed,
        };

        let build = match build_status {
            Some(status) => StepIndicator {
                started: true,
                done: status != Status::Pending,
                error: status == Status::Failed,
            },
            None => StepIndicator::default(),
        };

        let release = StepIndicator {
            started: build_status == Some(Status::Succeeded),
            done: setup.status == Status::Succeeded,
            error: setup_failed,
        };

        Self {
            create_app,
            build,
            release,
        }
    }

    pub fn steps(&self) -> [(&'static str, StepIndicator); 3] {
        [
            ("Creating app", self.create_app),
            ("Building", self.build),
            ("Start server process", self.release),
        ]
    }
}

/// How an external log viewer should present the build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogView {
    pub url: String,

    /// Follow live output while the build is still running
    pub follow: bool,
}

impl LogView {
    pub fn from_setup(setup: &AppSetup) -> Option<Self> {
        let build = setup.build.as_ref()?;
        let url = build.output_stream_url.clone()?;
        Some(Self {
            url,
            follow: build.status == Status::Pending,
        })
    }
}
