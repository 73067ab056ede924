//! App setup poller tests

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use netbox_deploy::deploy::fsm::DeploymentState;
use netbox_deploy::errors::DeployerError;
use netbox_deploy::http::setups::SetupSource;
use netbox_deploy::workers::poller::{run, spawn_setup_poller, watch_setup, Options, PollOutcome, PollSnapshot};
use platform_models::{AppSetup, Status};
use tokio::sync::{watch, Notify};

use crate::fixtures::setup;

/// Replays scripted fetch results
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<AppSetup, DeployerError>>>,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<AppSetup, DeployerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SetupSource for ScriptedSource {
    async fn fetch_setup(&self, _setup_id: &str) -> Result<AppSetup, DeployerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DeployerError::Internal("script exhausted".to_string())))
    }
}

fn unavailable() -> DeployerError {
    DeployerError::HttpError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: String::new(),
    }
}

fn finished() -> AppSetup {
    let mut finished = setup(Status::Succeeded, Some(Status::Succeeded));
    finished.resolved_success_url = Some("https://my-netbox.herokuapp.com/".to_string());
    finished
}

fn initial() -> PollSnapshot {
    PollSnapshot {
        setup_id: "setup-1".to_string(),
        state: DeploymentState::Loading,
        setup: None,
        error: None,
        fetch_error: None,
        outcome: None,
    }
}

fn no_shutdown() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(std::future::pending())
}

async fn run_scripted(source: &ScriptedSource, options: Options) -> (Option<PollOutcome>, PollSnapshot) {
    let (updates, _rx) = watch::channel(initial());
    let interest = AtomicBool::new(true);
    let outcome = run(&options, source, "setup-1", &updates, &interest, |_| async {}, no_shutdown()).await;
    let last = updates.borrow().clone();
    (outcome, last)
}

#[tokio::test]
async fn test_polls_until_finished() {
    let source = ScriptedSource::new(vec![
        Ok(setup(Status::Pending, None)),
        Ok(setup(Status::Pending, Some(Status::Pending))),
        Ok(setup(Status::Pending, Some(Status::Succeeded))),
        Ok(finished()),
        Ok(setup(Status::Failed, None)),
    ]);

    let (outcome, last) = run_scripted(&source, Options::default()).await;
    assert_eq!(
        outcome,
        Some(PollOutcome::Finished {
            success_url: Some("https://my-netbox.herokuapp.com/".to_string())
        })
    );
    assert_eq!(last.state, DeploymentState::Finished);
    assert_eq!(last.success_url(), Some("https://my-netbox.herokuapp.com/"));
    // No fetch after the terminal state
    assert_eq!(source.fetches(), 4);
}

#[tokio::test]
async fn test_build_failure_stops_polling() {
    let mut failed = setup(Status::Pending, Some(Status::Failed));
    failed.failure_message = Some("Build failed: pip install exited 1".to_string());
    let source = ScriptedSource::new(vec![Ok(setup(Status::Pending, Some(Status::Pending))), Ok(failed)]);

    let (outcome, last) = run_scripted(&source, Options::default()).await;
    assert_eq!(
        outcome,
        Some(PollOutcome::Failed {
            message: "Build failed: pip install exited 1".to_string()
        })
    );
    assert_eq!(last.error.as_deref(), Some("Build failed: pip install exited 1"));
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn test_failure_without_message() {
    let source = ScriptedSource::new(vec![Ok(setup(Status::Failed, None))]);

    let (outcome, _) = run_scripted(&source, Options::default()).await;
    assert_eq!(
        outcome,
        Some(PollOutcome::Failed {
            message: "Unknown error".to_string()
        })
    );
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let source = ScriptedSource::new(vec![
        Ok(setup(Status::Pending, Some(Status::Pending))),
        Err(unavailable()),
        Err(unavailable()),
        Ok(finished()),
    ]);

    let (outcome, last) = run_scripted(&source, Options::default()).await;
    assert!(matches!(outcome, Some(PollOutcome::Finished { .. })));
    assert!(last.fetch_error.is_none());
    assert_eq!(source.fetches(), 4);
}

#[tokio::test]
async fn test_transient_errors_give_up() {
    let source = ScriptedSource::new(vec![
        Ok(setup(Status::Pending, Some(Status::Pending))),
        Err(unavailable()),
        Err(unavailable()),
        Ok(finished()),
    ]);
    let options = Options {
        max_fetch_errors: 2,
        ..Default::default()
    };

    let (outcome, last) = run_scripted(&source, options).await;
    assert!(matches!(outcome, Some(PollOutcome::FetchFailed { .. })));
    // The derived state is kept; a lost record is not a failed deployment
    assert_eq!(last.state, DeploymentState::Building);
    assert!(last.error.is_none());
    assert!(last.fetch_error.is_some());
    assert_eq!(source.fetches(), 3);
}

#[tokio::test]
async fn test_missing_setup_fails_fast() {
    let source = ScriptedSource::new(vec![Err(DeployerError::HttpError {
        status: StatusCode::NOT_FOUND,
        body: "{\"id\":\"not_found\"}".to_string(),
    })]);

    let (outcome, last) = run_scripted(&source, Options::default()).await;
    assert!(matches!(outcome, Some(PollOutcome::FetchFailed { .. })));
    assert_eq!(last.state, DeploymentState::Loading);
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_before_fetching() {
    let source = ScriptedSource::new(vec![Ok(finished())]);
    let (updates, _rx) = watch::channel(initial());
    let interest = AtomicBool::new(true);

    let outcome = run(
        &Options::default(),
        &source,
        "setup-1",
        &updates,
        &interest,
        |_| std::future::pending::<()>(),
        Box::pin(async {}),
    )
    .await;

    assert!(outcome.is_none());
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn test_late_result_after_loss_of_interest() {
    let source = ScriptedSource::new(vec![Ok(finished())]);
    let (updates, rx) = watch::channel(initial());
    let interest = AtomicBool::new(false);

    let outcome = run(&Options::default(), &source, "setup-1", &updates, &interest, |_| async {}, no_shutdown()).await;

    assert!(outcome.is_none());
    assert_eq!(source.fetches(), 1);
    assert!(!rx.has_changed().unwrap());
    assert_eq!(rx.borrow().state, DeploymentState::Loading);
}

/// Holds every fetch until released
struct GatedSource {
    gate: Notify,
    fetches: AtomicUsize,
}

#[async_trait]
impl SetupSource for GatedSource {
    async fn fetch_setup(&self, _setup_id: &str) -> Result<AppSetup, DeployerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(finished())
    }
}

#[tokio::test]
async fn test_detach_discards_in_flight_fetch() {
    let source = Arc::new(GatedSource {
        gate: Notify::new(),
        fetches: AtomicUsize::new(0),
    });

    let handle = spawn_setup_poller(source.clone(), "setup-1".to_string(), Options::default());
    let mut updates = handle.updates();
    while source.fetches.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    handle.detach();
    source.gate.notify_one();

    // The poller ends without publishing the late record
    assert!(updates.changed().await.is_err());
    assert_eq!(updates.borrow().state, DeploymentState::Loading);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_watch_reports_every_state() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(setup(Status::Pending, None)),
        Ok(setup(Status::Pending, Some(Status::Pending))),
        Ok(setup(Status::Pending, Some(Status::Succeeded))),
        Ok(finished()),
    ]));

    let mut states = Vec::new();
    let outcome = watch_setup(source.clone(), "setup-1".to_string(), Options::default(), |snapshot| {
        states.push(snapshot.state.clone());
    })
    .await
    .unwrap();

    assert!(matches!(outcome, PollOutcome::Finished { .. }));
    assert_eq!(
        states,
        vec![
            DeploymentState::Initializing,
            DeploymentState::Building,
            DeploymentState::Releasing,
            DeploymentState::Finished,
        ]
    );
    assert_eq!(source.fetches(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_watch_waits_for_interval() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(setup(Status::Pending, None)), Ok(finished())]));
    let options = Options {
        interval: Duration::from_secs(5),
        ..Default::default()
    };

    let started = tokio::time::Instant::now();
    watch_setup(source, "setup-1".to_string(), options, |_| {}).await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(5));
}
