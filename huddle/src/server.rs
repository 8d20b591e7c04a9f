//! Server lifecycle management
//!
//! Starts the gRPC server and the HTTP gateway, waits for a shutdown signal
//! or an unexpected server exit, then stops both gracefully.

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use huddle_core::{bootstrap::Services, Config};

pub struct HuddleServer {
    config: Config,
    services: Services,
}

/// Resolves once `true` is sent on the shutdown channel
fn shutdown_requested(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send {
    async move {
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl HuddleServer {
    pub const fn new(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    /// Start all servers and wait for shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let grpc_addr: SocketAddr = self.config.grpc_address().parse()?;
        let grpc_handle = self.start_grpc_server(grpc_addr, shutdown_rx.clone());

        let http_handle = if self.config.server.enable_gateway {
            let http_addr: SocketAddr = self.config.http_address().parse()?;
            Some(self.start_http_server(http_addr, shutdown_rx).await?)
        } else {
            info!("HTTP gateway disabled");
            None
        };

        info!("All servers started successfully");

        let http_stopped = async {
            match http_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(grpc_handle);
        tokio::pin!(http_stopped);

        let (mut grpc_done, mut http_done) = (false, false);
        tokio::select! {
            _ = &mut grpc_handle => {
                grpc_done = true;
                error!("gRPC server stopped unexpectedly");
            }
            _ = &mut http_stopped => {
                http_done = true;
                error!("HTTP server stopped unexpectedly");
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);

        // Streams are long-lived; don't let one stuck client hold the process.
        let drain = async {
            if !grpc_done {
                let _ = (&mut grpc_handle).await;
            }
            if !http_done {
                let _ = (&mut http_stopped).await;
            }
        };
        if tokio::time::timeout(std::time::Duration::from_secs(10), drain).await.is_err() {
            error!("Servers did not stop within 10s, exiting anyway");
        }

        info!(
            open_streams = self.services.room_service.registry().connection_count(),
            "Huddle server shut down complete"
        );
        Ok(())
    }

    /// Start gRPC server
    fn start_grpc_server(&self, addr: SocketAddr, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let services = self.services.clone();

        tokio::spawn(async move {
            if let Err(e) = huddle_api::grpc::serve(addr, services, shutdown_requested(shutdown_rx)).await {
                error!("gRPC server error: {}", e);
            }
        })
    }

    /// Start HTTP gateway with graceful shutdown support
    async fn start_http_server(
        &self,
        addr: SocketAddr,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let router = huddle_api::http::create_router(&self.services);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP address {addr}: {e}"))?;
        info!("HTTP server listening on {}", addr);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_requested(shutdown_rx))
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
