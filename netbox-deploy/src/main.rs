//! netbox-deploy - Entry Point
//!
//! Deploys Netbox instances to Heroku from a rewritten source tarball and
//! tracks their app setups until they finish.

use std::collections::HashMap;
use std::env;

use colored::Colorize;
use netbox_deploy::app::options::{poller_options, AppOptions};
use netbox_deploy::app::run::run;
use netbox_deploy::app::state::AppState;
use netbox_deploy::apps::{list_apps, load_app_overview};
use netbox_deploy::deploy::fsm::DeploymentState;
use netbox_deploy::deploy::trigger::{deploy, DeployRequest};
use netbox_deploy::errors::DeployerError;
use netbox_deploy::logs::{init_logging, LogLevel, LogOptions};
use netbox_deploy::storage::settings::{load_settings, Settings};
use netbox_deploy::utils::version_info;
use netbox_deploy::workers::poller::{watch_setup, PollOutcome, PollSnapshot};

use tracing::{error, info};

const USAGE: &str = "\
Usage: netbox-deploy <command> [--key=value ...]

Commands:
  serve                     Serve rewritten source tarballs on /source_blob
  deploy [--version=vX.Y.Z] Create an app setup and follow it
         [--name=<app>] [--no-watch]
  watch --setup=<id>        Follow an existing app setup
  apps                      List apps and their managed versions
  app --id=<app>            Show a managed app

Options:
  --config=<path>           Settings file (default: <base dir>/settings.json)
  --log-level=<level>       Override the configured log level
  --json                    Print machine-readable output
  --version                 Print version information";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let mut command: Option<String> = None;
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        } else if command.is_none() {
            command = Some(arg);
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") && command.is_none() {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("{}", e),
        }
        return;
    }

    let Some(command) = command else {
        println!("{}", USAGE);
        return;
    };

    // Retrieve the settings file
    let settings = match load_settings(cli_args.get("config").map(String::as_str)).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|level| level.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        None => settings.log_level,
    };
    if let Err(e) = init_logging(LogOptions {
        log_level,
        json_format: settings.log_json,
    }) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = run_command(&command, &cli_args, settings).await {
        error!("{} failed: {}", command, e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_command(
    command: &str,
    cli_args: &HashMap<String, String>,
    settings: Settings,
) -> Result<(), DeployerError> {
    let json = cli_args.contains_key("json");

    match command {
        "serve" => {
            let options = AppOptions::from_settings(&settings);
            info!("Running source blob server with options: {:?}", options);
            run(options, await_shutdown_signal()).await
        }
        "deploy" => {
            let state = AppState::init(settings)?;
            let source = &state.settings.source_blob;
            let version = cli_args
                .get("version")
                .filter(|version| version.as_str() != "true")
                .unwrap_or(&source.target_version);

            let mut request = DeployRequest::new(&source.public_origin, version)?
                .with_region(state.settings.platform.region.clone());
            if let Some(name) = cli_args.get("name") {
                request = request.with_app_name(name.clone());
            }

            let setup_id = deploy(&state.platform, &request).await?;
            println!("Deploy ID: {}", setup_id.bold());

            if cli_args.contains_key("no-watch") {
                return Ok(());
            }
            follow_setup(&state, setup_id, json).await
        }
        "watch" => {
            let setup_id = cli_args
                .get("setup")
                .cloned()
                .ok_or_else(|| DeployerError::ValidationError("--setup=<id> is required".to_string()))?;
            let state = AppState::init(settings)?;
            follow_setup(&state, setup_id, json).await
        }
        "apps" => {
            let state = AppState::init(settings)?;
            let apps = list_apps(&state.platform).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&apps)?);
                return Ok(());
            }
            for summary in apps {
                let version = match (&summary.version, &summary.error) {
                    (Some(version), _) => format!("v{}", version).green(),
                    (None, Some(_)) => "unknown".yellow(),
                    (None, None) => "unmanaged".dimmed(),
                };
                println!("{:<32} {:<38} {}", summary.app.name, summary.app.id, version);
            }
            Ok(())
        }
        "app" => {
            let app_id = cli_args
                .get("id")
                .ok_or_else(|| DeployerError::ValidationError("--id=<app> is required".to_string()))?;
            let state = AppState::init(settings)?;
            let overview = load_app_overview(&state.platform, app_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
                return Ok(());
            }
            println!("Manage {}", overview.app.name.bold());
            println!("  Current Version: {}", overview.version);
            println!("  Release:         v{} ({})", overview.release.version, overview.release.status);
            println!("  Require Login:   {}", overview.login_required());
            for domain in &overview.domains {
                println!("  Domain:          {}", domain.hostname);
            }
            Ok(())
        }
        other => Err(DeployerError::ValidationError(format!(
            "unknown command `{}`\n\n{}",
            other, USAGE
        ))),
    }
}

async fn follow_setup(state: &AppState, setup_id: String, json: bool) -> Result<(), DeployerError> {
    let options = poller_options(&state.settings);
    let mut last_state: Option<DeploymentState> = None;

    let outcome = watch_setup(state.platform.clone(), setup_id, options, |snapshot| {
        if json {
            if let Ok(line) = serde_json::to_string(snapshot) {
                println!("{}", line);
            }
            return;
        }
        if last_state.as_ref() == Some(&snapshot.state) {
            return;
        }
        last_state = Some(snapshot.state.clone());
        print_snapshot(snapshot);
    })
    .await?;

    match outcome {
        PollOutcome::Finished { .. } => Ok(()),
        PollOutcome::Failed { message } => Err(DeployerError::ValidationError(format!(
            "deployment failed: {}",
            message
        ))),
        PollOutcome::FetchFailed { message } => Err(DeployerError::Internal(format!(
            "lost track of the setup: {}",
            message
        ))),
    }
}

fn print_snapshot(snapshot: &PollSnapshot) {
    println!("{} {}", "State:".bold(), snapshot.state.label());
    if let Some(progress) = snapshot.progress() {
        for (label, step) in progress.steps() {
            println!("  {:<22} {}", label, step.symbol());
        }
    }
    if let Some(log) = snapshot.log_view() {
        let mode = if log.follow { "live" } else { "finished" };
        println!("  Build log ({}): {}", mode, log.url);
    }
    if let Some(error) = &snapshot.error {
        println!("  {} {}", "Error:".red(), error);
    }
    if let Some(url) = snapshot.success_url() {
        println!("  Open App: {}", url.green());
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
