//! Configuration types for the PMU monitoring console

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default = "default_notifiers")]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            polling: PollingConfig::default(),
            alerts: AlertsConfig::default(),
            notifiers: default_notifiers(),
            session: SessionConfig::default(),
            store: StoreConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Where the PMU backend lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Polling cadence per view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_dashboard_interval", with = "humantime_serde")]
    pub dashboard_interval: Duration,
    #[serde(default = "default_graphs_interval", with = "humantime_serde")]
    pub graphs_interval: Duration,
    /// Events fetch once per mount or selection change unless this is set
    #[serde(default, with = "humantime_serde")]
    pub events_interval: Option<Duration>,
    #[serde(default = "default_graphs_start")]
    pub graphs_start: String,
    #[serde(default = "default_graphs_window")]
    pub graphs_window: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dashboard_interval: default_dashboard_interval(),
            graphs_interval: default_graphs_interval(),
            events_interval: None,
            graphs_start: default_graphs_start(),
            graphs_window: default_graphs_window(),
        }
    }
}

/// Alert channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the socket URL derived from `backend.base_url`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_retention")]
    pub retention: usize,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            retention: default_retention(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Backoff policy for the alert socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Maximum number of consecutive failed attempts (None for unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            max_retries: None,
        }
    }
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "bell")]
    Bell,
    #[serde(rename = "command")]
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Bell => "bell",
            NotifierConfig::Command { .. } => "command",
        }
    }
}

/// Login credentials for the session gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
        }
    }
}

/// Local key-value store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Web front configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_dashboard_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_graphs_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_graphs_start() -> String {
    "-1h".to_string()
}

fn default_graphs_window() -> String {
    "10s".to_string()
}

fn default_retention() -> usize {
    500
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_notifiers() -> Vec<NotifierConfig> {
    vec![NotifierConfig::Bell]
}

fn default_username() -> String {
    "inelec".to_string()
}

fn default_password() -> String {
    "inelec123".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pmu-monitor-state.json")
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

impl Config {
    /// WebSocket URL of the alert feed
    pub fn alerts_url(&self) -> String {
        if let Some(url) = &self.alerts.url {
            return url.clone();
        }
        let base = self.backend.base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/ws/alerts", ws_base)
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::PmuMonitorError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    if config.alerts.retention == 0 {
        return Err(crate::PmuMonitorError::Config(
            "alerts.retention must be at least 1".to_string(),
        ));
    }
    if config.alerts.reconnect.multiplier < 1.0 {
        return Err(crate::PmuMonitorError::Config(
            "alerts.reconnect.multiplier must be >= 1.0".to_string(),
        ));
    }
    Ok(config)
}
