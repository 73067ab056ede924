//! Source blob server run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::errors::DeployerError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the source blob server until the shutdown signal fires
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployerError> {
    info!("Initializing source blob server...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.clone());

    if let Err(e) = init_socket_server(&options, &mut shutdown_manager, shutdown_tx.subscribe()).await {
        error!("Failed to start server: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

async fn init_socket_server(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeployerError> {
    info!(
        "Rewriting {} at {} on request",
        options.template_repo, options.template_ref
    );
    let state = ServerState::new(&options.template_repo, &options.template_ref)?;

    let server_handle = serve(&options.server, Arc::new(state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    options: AppOptions,
    socket_server_handle: Option<JoinHandle<Result<(), DeployerError>>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, options: AppOptions) -> Self {
        Self {
            shutdown_tx,
            options,
            socket_server_handle: None,
        }
    }

    fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DeployerError>>,
    ) -> Result<(), DeployerError> {
        if self.socket_server_handle.is_some() {
            return Err(DeployerError::ShutdownError(
                "socket server handle already set".to_string(),
            ));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DeployerError> {
        // Broadcast fails when nobody listens, which is fine here
        let _ = self.shutdown_tx.send(());

        let Some(handle) = self.socket_server_handle.take() else {
            info!("Shutdown complete");
            return Ok(());
        };

        match tokio::time::timeout(self.options.max_shutdown_delay, handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(DeployerError::ShutdownError(format!(
                    "socket server task panicked: {}",
                    e
                )))
            }
            Err(_) => {
                return Err(DeployerError::ShutdownError(format!(
                    "socket server did not stop within {:?}",
                    self.options.max_shutdown_delay
                )))
            }
        }

        info!("Shutdown complete");
        Ok(())
    }
}
