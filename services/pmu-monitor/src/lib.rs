//! PMU Monitor - Operator console for phasor measurement unit telemetry
//!
//! Polls the grid backend for power snapshots, measurements and time series,
//! listens for live alerts over a WebSocket and serves the console views.

pub mod alert_channel;
pub mod alerts;
pub mod api;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod io;
pub mod model;
pub mod notifier;
pub mod phasor;
pub mod poller;
pub mod session;
pub mod shell;
pub mod store;
pub mod views;

#[cfg(test)]
mod test_support;

pub use config::{load_config, Config};
pub use error::{Result, PmuMonitorError};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::alert_channel::{AlertChannel, ChannelState, TungsteniteConnector};
use crate::io::ReqwestHttpClient;
use crate::shell::Shell;
use crate::store::LocalStore;

/// Run the console with the given configuration until ctrl-c
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for ctrl-c");
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    let store = Arc::new(LocalStore::open(&config.store.path).await?);
    let http: Arc<dyn io::HttpClient> =
        Arc::new(ReqwestHttpClient::with_timeout(config.backend.request_timeout)?);
    let hub = alerts::new_alert_hub(config.alerts.retention);

    // Live alerts
    let (channel_task, channel_state) = if config.alerts.enabled {
        let url = config.alerts_url();
        tracing::info!("Subscribing to alerts at {}", url);
        let channel = AlertChannel::new(
            url,
            Arc::new(TungsteniteConnector),
            Arc::clone(&hub),
            notifier::build_notifiers(&config.notifiers),
            config.alerts.reconnect.clone(),
        );
        let (task, state) = channel.spawn(cancel.clone());
        (Some(task), state)
    } else {
        tracing::info!("Live alerts disabled");
        let (_tx, rx) = watch::channel(ChannelState::Disabled);
        (None, rx)
    };

    let shell = Arc::new(
        Shell::new(
            &config,
            http,
            store,
            Arc::clone(&hub),
            channel_state,
            cancel.clone(),
        )
        .await,
    );

    if config.dashboard.enabled {
        let router = dashboard::build_router(Arc::clone(&shell));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.dashboard.port));
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            PmuMonitorError::Dashboard(format!(
                "Failed to bind console to port {}: {}",
                config.dashboard.port, e
            ))
        })?;
        tracing::info!("Console listening on http://{}", addr);

        let cancel_for_console = cancel.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_for_console.cancelled().await;
            })
            .await
            .map_err(|e| PmuMonitorError::Dashboard(e.to_string()))?;
        tracing::debug!("Console stopped");
    } else {
        tracing::info!("Console disabled, running headless");
        cancel.cancelled().await;
    }

    cancel.cancel();
    shell.teardown_active().await;
    if let Some(task) = channel_task {
        if let Err(e) = task.await {
            tracing::warn!("Alert channel task failed: {}", e);
        }
    }
    tracing::info!("PMU monitor stopped");

    Ok(())
}
