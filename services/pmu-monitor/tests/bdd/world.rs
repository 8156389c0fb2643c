//! BDD test world for the PMU monitor

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use cucumber::World;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use pmu_monitor::alert_channel::ChannelState;
use pmu_monitor::alerts::{new_alert_hub, AlertHubHandle};
use pmu_monitor::config::Config;
use pmu_monitor::io::{HttpClient, HttpResponse};
use pmu_monitor::shell::{Route, Shell, ShellHandle};
use pmu_monitor::store::LocalStore;

/// Backend double that answers by path and records every URL with its arrival time
#[derive(Debug, Default)]
pub struct RecordingHttpClient {
    pmus: Vec<String>,
    requests: Mutex<Vec<(Instant, String)>>,
}

impl RecordingHttpClient {
    pub fn new(pmus: &[&str]) -> Self {
        Self {
            pmus: pmus.iter().map(|p| p.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(Instant, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|(_, url)| url).collect()
    }

    fn respond(&self, url: &str) -> pmu_monitor::Result<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), url.to_string()));
        let body = if url.contains("/api/getpmus") {
            serde_json::json!({ "pmus": self.pmus }).to_string()
        } else if url.contains("/api/power_a") {
            r#"{"P": 900.0, "Q": 120.0, "S": 908.0, "PF": 0.99, "V": 231.0,
                "v_a_ang": 0.0, "v_b_ang": -120.0, "v_c_ang": 120.0}"#
                .to_string()
        } else if url.contains("/api/changeprotocol") {
            r#"{"message": "protocol changed"}"#.to_string()
        } else {
            "[]".to_string()
        };
        Ok(HttpResponse { status: 200, body })
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn get(&self, url: &str) -> pmu_monitor::Result<HttpResponse> {
        self.respond(url)
    }

    async fn post(&self, url: &str) -> pmu_monitor::Result<HttpResponse> {
        self.respond(url)
    }
}

#[derive(Debug, Default, World)]
pub struct PmuMonitorWorld {
    // Console under test
    pub http: Option<Arc<RecordingHttpClient>>,
    pub shell: Option<ShellHandle>,
    pub store_dir: Option<TempDir>,
    pub cancel: Option<CancellationToken>,
    pub last_route: Option<Route>,

    // Selection changes
    pub request_mark: usize,
    pub selected_at: Option<Instant>,

    // Alert feed
    pub alert_payload: Option<String>,
    pub hub: Option<AlertHubHandle>,
    pub alerts_before: usize,
}

impl PmuMonitorWorld {
    pub async fn start_console(&mut self, config: Config, store: LocalStore, pmus: &[&str]) {
        let http = Arc::new(RecordingHttpClient::new(pmus));
        let cancel = CancellationToken::new();
        let (_tx, rx) = watch::channel(ChannelState::Disabled);
        let shell = Shell::new(
            &config,
            http.clone(),
            Arc::new(store),
            new_alert_hub(config.alerts.retention),
            rx,
            cancel.clone(),
        )
        .await;
        self.http = Some(http);
        self.shell = Some(Arc::new(shell));
        self.cancel = Some(cancel);
    }

    pub fn shell(&self) -> &ShellHandle {
        self.shell.as_ref().expect("console not started")
    }

    pub fn http(&self) -> &RecordingHttpClient {
        self.http.as_ref().expect("console not started")
    }
}

impl Drop for PmuMonitorWorld {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}
