use memecoin_payments::api;
use memecoin_payments::config::AppConfig;
use memecoin_payments::logging::init_tracing;
use memecoin_payments::payments::router::PaymentRouter;
use memecoin_payments::services::deployment::{
    ChannelDeploymentTrigger, DeploymentWorker, DeploymentWorkerConfig,
};
use memecoin_payments::services::{ConfirmationTracker, PaymentService};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const DEPLOYMENT_QUEUE_SIZE: usize = 256;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting memecoin payments service"
    );

    let router = PaymentRouter::from_config(&config.payments)?;
    let tracker = Arc::new(ConfirmationTracker::new(config.payments.tracker.clone()));
    let (trigger, deployments) = ChannelDeploymentTrigger::new(DEPLOYMENT_QUEUE_SIZE);
    let service = Arc::new(PaymentService::new(router, tracker, Arc::new(trigger)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = DeploymentWorker::new(deployments, DeploymentWorkerConfig::from_env());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = api::router(service);
    let addr: SocketAddr = config.server.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx))
        .await?;

    if let Err(e) = worker_handle.await {
        error!(error = %e, "deployment worker terminated abnormally");
    }
    info!("Server stopped");
    Ok(())
}
