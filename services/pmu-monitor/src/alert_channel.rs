//! WebSocket subscription to the backend alert feed
//!
//! The channel owns one socket at a time. Each text frame is a JSON array of
//! alerts that goes into the [`AlertHub`](crate::alerts::AlertHub). When the
//! socket drops, the channel reconnects with exponential backoff until it is
//! cancelled or the retry cap is reached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::AlertHubHandle;
use crate::config::ReconnectConfig;
use crate::model::Alert;
use crate::notifier::{self, Notifier};
use crate::PmuMonitorError;

/// Lifecycle of the alert socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChannelState {
    Disabled,
    Connecting,
    Open,
    Closed,
    Error { message: String },
    Reconnecting { attempt: u32, delay_ms: u64 },
    GaveUp { retries: u32 },
    Stopped,
}

impl ChannelState {
    /// Whether live alerts are currently flowing
    pub fn is_live(&self) -> bool {
        matches!(self, ChannelState::Open)
    }

    pub fn describe(&self) -> String {
        match self {
            ChannelState::Disabled => "Live alerts are disabled".to_string(),
            ChannelState::Connecting => "Connecting to the alert feed".to_string(),
            ChannelState::Open => "Live".to_string(),
            ChannelState::Closed => "Alert feed closed".to_string(),
            ChannelState::Error { message } => format!("Alert feed error: {}", message),
            ChannelState::Reconnecting { attempt, delay_ms } => format!(
                "Alert feed lost, reconnecting in {} ms (attempt {})",
                delay_ms, attempt
            ),
            ChannelState::GaveUp { retries } => {
                format!("Alert feed unavailable after {} retries", retries)
            }
            ChannelState::Stopped => "Alert feed stopped".to_string(),
        }
    }
}

/// Exponential reconnect delays
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_retries: Option<u32>,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            initial: config.initial_delay,
            max: config.max_delay,
            multiplier: config.multiplier.max(1.0),
            max_retries: config.max_retries,
            attempt: 0,
        }
    }

    /// Delay before the next retry, or `None` once the cap is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_retries {
            if self.attempt >= max {
                return None;
            }
        }
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        self.attempt = self.attempt.saturating_add(1);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        Some(Duration::from_secs_f64(secs.min(self.max.as_secs_f64())))
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// An open alert socket
#[async_trait]
pub trait AlertStream: Send {
    /// Next text frame; `Ok(None)` once the server closes the socket
    async fn next_text(&mut self) -> crate::Result<Option<String>>;

    async fn close(&mut self);
}

/// Opens alert sockets
#[async_trait]
pub trait AlertConnector: Send + Sync {
    async fn connect(&self, url: &str) -> crate::Result<Box<dyn AlertStream>>;
}

/// Production connector using tokio-tungstenite
#[derive(Debug, Default)]
pub struct TungsteniteConnector;

struct TungsteniteStream {
    inner: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

#[async_trait]
impl AlertConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> crate::Result<Box<dyn AlertStream>> {
        debug!("Connecting to alert feed at {}", url);
        let (inner, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| PmuMonitorError::WebSocket(format!("connect to {} failed: {}", url, e)))?;
        Ok(Box::new(TungsteniteStream { inner }))
    }
}

#[async_trait]
impl AlertStream for TungsteniteStream {
    async fn next_text(&mut self) -> crate::Result<Option<String>> {
        use tokio_tungstenite::tungstenite::Message;

        loop {
            match self.inner.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(PmuMonitorError::WebSocket(format!("read error: {}", e))),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Pings are answered by tungstenite; binary frames are not part of the feed
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!("Error closing alert socket: {}", e);
        }
    }
}

enum SessionEnd {
    Cancelled,
    Closed,
    Failed(PmuMonitorError),
}

/// The alert subscription task
pub struct AlertChannel {
    url: String,
    connector: Arc<dyn AlertConnector>,
    hub: AlertHubHandle,
    notifiers: Vec<Arc<dyn Notifier>>,
    reconnect: ReconnectConfig,
    state_tx: watch::Sender<ChannelState>,
}

impl std::fmt::Debug for AlertChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertChannel")
            .field("url", &self.url)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

impl AlertChannel {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn AlertConnector>,
        hub: AlertHubHandle,
        notifiers: Vec<Arc<dyn Notifier>>,
        reconnect: ReconnectConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        Self {
            url: url.into(),
            connector,
            hub,
            notifiers,
            reconnect,
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ChannelState) {
        debug!("Alert channel state: {:?}", state);
        self.state_tx.send_replace(state);
    }

    /// Spawn the channel, returning its task handle and a state receiver
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (tokio::task::JoinHandle<()>, watch::Receiver<ChannelState>) {
        let state = self.state();
        let handle = tokio::spawn(self.run(cancel));
        (handle, state)
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(&self.reconnect);
        let mut opened_before = false;

        loop {
            self.set_state(ChannelState::Connecting);
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };

            match connected {
                Ok(mut stream) => {
                    info!("Alert channel open at {}", self.url);
                    self.set_state(ChannelState::Open);
                    backoff.reset();
                    if opened_before {
                        self.hub.mark_reconnect().await;
                    }
                    opened_before = true;

                    match self.pump(stream.as_mut(), &cancel).await {
                        SessionEnd::Cancelled => {
                            stream.close().await;
                            break;
                        }
                        SessionEnd::Closed => {
                            info!("Alert channel closed by server");
                            self.set_state(ChannelState::Closed);
                        }
                        SessionEnd::Failed(e) => {
                            warn!("Alert channel failed: {}", e);
                            self.set_state(ChannelState::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                }
                Err(e) => {
                    warn!("Alert channel connect failed: {}", e);
                    self.set_state(ChannelState::Error {
                        message: e.to_string(),
                    });
                }
            }

            let Some(delay) = backoff.next_delay() else {
                let retries = backoff.attempt();
                warn!("Alert channel giving up after {} retries", retries);
                self.set_state(ChannelState::GaveUp { retries });
                return;
            };
            self.set_state(ChannelState::Reconnecting {
                attempt: backoff.attempt(),
                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            });
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Alert channel stopped");
        self.set_state(ChannelState::Stopped);
    }

    async fn pump(&self, stream: &mut dyn AlertStream, cancel: &CancellationToken) -> SessionEnd {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = stream.next_text() => next,
            };
            match next {
                Ok(Some(text)) => self.handle_message(&text).await,
                Ok(None) => return SessionEnd::Closed,
                Err(e) => return SessionEnd::Failed(e),
            }
        }
    }

    async fn handle_message(&self, text: &str) {
        let batch: Vec<Alert> = match serde_json::from_str(text) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Skipping unparseable alert message: {}", e);
                return;
            }
        };
        let accepted = self.hub.append(batch).await;
        notifier::dispatch(&self.notifiers, &accepted).await;
    }
}
