//! App setup poller
//!
//! Tracks one app setup until the platform reports a terminal state. Every
//! tick fetches the setup record, derives the deployment state from it and
//! publishes a fresh snapshot. The poller stops on `Finished`, on `Failed`, or
//! when the record cannot be fetched any more.
//!
//! Fetch failures are kept apart from failures reported by the platform:
//! transient errors (transport, 5xx, 429) are retried with backoff and leave
//! the derived state untouched, anything else ends polling with
//! `PollOutcome::FetchFailed`.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use platform_models::AppSetup;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::deploy::fsm::{derive_state, DeploymentState, LogView, SetupProgress};
use crate::errors::DeployerError;
use crate::http::setups::SetupSource;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between two fetches
    pub interval: Duration,

    /// Delay before the first fetch
    pub initial_delay: Duration,

    /// Consecutive transient fetch failures tolerated before giving up
    pub max_fetch_errors: u32,

    /// Backoff applied after transient fetch failures
    pub cooldown: CooldownOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            initial_delay: Duration::ZERO,
            max_fetch_errors: 5,
            cooldown: CooldownOptions::default(),
        }
    }
}

/// How polling ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Setup succeeded
    Finished { success_url: Option<String> },

    /// The platform reported the setup or its build as failed
    Failed { message: String },

    /// The setup record could not be fetched
    FetchFailed { message: String },
}

/// Everything a consumer needs to render the current poll state
#[derive(Debug, Clone, Serialize)]
pub struct PollSnapshot {
    pub setup_id: String,
    pub state: DeploymentState,
    pub setup: Option<AppSetup>,

    /// User-visible error, set when the deployment failed
    pub error: Option<String>,

    /// Last transient fetch error, cleared by the next successful fetch
    pub fetch_error: Option<String>,

    pub outcome: Option<PollOutcome>,
}

impl PollSnapshot {
    fn loading(setup_id: &str) -> Self {
        Self {
            setup_id: setup_id.to_string(),
            state: DeploymentState::Loading,
            setup: None,
            error: None,
            fetch_error: None,
            outcome: None,
        }
    }

    /// Snapshot derived from a freshly fetched record; nothing is carried over
    /// from earlier records
    fn from_setup(setup_id: &str, setup: AppSetup) -> Self {
        let state = derive_state(&setup);
        let (error, outcome) = match &state {
            DeploymentState::Failed(message) => (
                Some(message.clone()),
                Some(PollOutcome::Failed {
                    message: message.clone(),
                }),
            ),
            DeploymentState::Finished => (
                None,
                Some(PollOutcome::Finished {
                    success_url: setup.resolved_success_url.clone(),
                }),
            ),
            _ => (None, None),
        };

        Self {
            setup_id: setup_id.to_string(),
            state,
            setup: Some(setup),
            error,
            fetch_error: None,
            outcome,
        }
    }

    pub fn progress(&self) -> Option<SetupProgress> {
        self.setup.as_ref().map(SetupProgress::from_setup)
    }

    pub fn log_view(&self) -> Option<LogView> {
        self.setup.as_ref().and_then(LogView::from_setup)
    }

    pub fn success_url(&self) -> Option<&str> {
        self.setup
            .as_ref()
            .and_then(|setup| setup.resolved_success_url.as_deref())
    }
}

/// Run the poll loop until a terminal outcome, shutdown, or loss of interest.
///
/// Returns `None` when polling was stopped before reaching an outcome.
pub async fn run<T, S, F>(
    options: &Options,
    source: &T,
    setup_id: &str,
    updates: &watch::Sender<PollSnapshot>,
    interest: &AtomicBool,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> Option<PollOutcome>
where
    T: SetupSource + ?Sized,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Polling app setup {}...", setup_id);

    let mut wait = options.initial_delay;
    let mut fetch_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller for setup {} shutting down...", setup_id);
                return None;
            }
            _ = sleep_fn(wait) => {}
        }

        let result = source.fetch_setup(setup_id).await;

        // A fetch that was in flight when the consumer went away must not
        // publish anything
        if !interest.load(Ordering::SeqCst) {
            debug!("Discarding setup {} response after detach", setup_id);
            return None;
        }

        let snapshot = match result {
            Ok(setup) => {
                fetch_errors = 0;
                wait = options.interval;
                let snapshot = PollSnapshot::from_setup(setup_id, setup);
                debug!("Setup {} is {}", setup_id, snapshot.state);
                snapshot
            }
            Err(e) if e.is_transient() && fetch_errors + 1 < options.max_fetch_errors => {
                wait = calc_exp_backoff(&options.cooldown, fetch_errors).max(options.interval);
                fetch_errors += 1;
                warn!(
                    "Fetching setup {} failed ({} in a row), retrying in {:?}: {}",
                    setup_id, fetch_errors, wait, e
                );
                let mut snapshot = updates.borrow().clone();
                snapshot.fetch_error = Some(e.to_string());
                snapshot
            }
            Err(e) => {
                warn!("Giving up on setup {}: {}", setup_id, e);
                let mut snapshot = updates.borrow().clone();
                snapshot.fetch_error = Some(e.to_string());
                snapshot.outcome = Some(PollOutcome::FetchFailed {
                    message: e.to_string(),
                });
                snapshot
            }
        };

        let outcome = snapshot.outcome.clone();
        updates.send_replace(snapshot);

        if let Some(outcome) = outcome {
            info!("Stopped polling setup {}: {:?}", setup_id, outcome);
            return Some(outcome);
        }
    }
}

/// Handle to a running poller.
///
/// Dropping or detaching the handle tears down the schedule. A fetch already
/// in flight may finish but its result is discarded.
pub struct PollerHandle {
    updates: watch::Receiver<PollSnapshot>,
    interest: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Option<PollOutcome>>>,
}

impl PollerHandle {
    /// Subscribe to snapshot updates
    pub fn updates(&self) -> watch::Receiver<PollSnapshot> {
        self.updates.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PollSnapshot {
        self.updates.borrow().clone()
    }

    /// Stop polling and ignore any late response
    pub fn detach(mut self) {
        self.teardown();
    }

    /// Wait for the terminal outcome
    pub async fn wait(mut self) -> Result<PollOutcome, DeployerError> {
        let task = self
            .task
            .take()
            .ok_or_else(|| DeployerError::Internal("poller already awaited".to_string()))?;
        match task.await {
            Ok(Some(outcome)) => Ok(outcome),
            Ok(None) => Err(DeployerError::ShutdownError(
                "poller stopped before the setup finished".to_string(),
            )),
            Err(e) => Err(DeployerError::Internal(format!("poller task failed: {}", e))),
        }
    }

    fn teardown(&mut self) {
        self.interest.store(false, Ordering::SeqCst);
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Start polling a setup on the tokio runtime
pub fn spawn_setup_poller<T>(source: Arc<T>, setup_id: String, options: Options) -> PollerHandle
where
    T: SetupSource + ?Sized + 'static,
{
    let (updates_tx, updates_rx) = watch::channel(PollSnapshot::loading(&setup_id));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let interest = Arc::new(AtomicBool::new(true));

    let task_interest = interest.clone();
    let task = tokio::spawn(async move {
        run(
            &options,
            source.as_ref(),
            &setup_id,
            &updates_tx,
            task_interest.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await
    });

    PollerHandle {
        updates: updates_rx,
        interest,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

/// Poll a setup to completion, calling `on_update` for every new snapshot
pub async fn watch_setup<T, U>(
    source: Arc<T>,
    setup_id: String,
    options: Options,
    mut on_update: U,
) -> Result<PollOutcome, DeployerError>
where
    T: SetupSource + ?Sized + 'static,
    U: FnMut(&PollSnapshot),
{
    let handle = spawn_setup_poller(source, setup_id, options);
    let mut updates = handle.updates();

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        on_update(&snapshot);
        if snapshot.outcome.is_some() {
            break;
        }
    }

    handle.wait().await
}
