//! BDD step definitions for the live alert feed

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use pmu_monitor::alert_channel::{AlertChannel, AlertConnector, AlertStream};
use pmu_monitor::alerts::new_alert_hub;
use pmu_monitor::config::ReconnectConfig;
use pmu_monitor::notifier::Notifier;
use pmu_monitor::PmuMonitorError;

use crate::world::PmuMonitorWorld;

/// Socket that delivers one frame and then stays open
struct OneFrameStream {
    frame: Option<String>,
}

#[async_trait]
impl AlertStream for OneFrameStream {
    async fn next_text(&mut self) -> pmu_monitor::Result<Option<String>> {
        match self.frame.take() {
            Some(frame) => Ok(Some(frame)),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

/// Connects once; later attempts are refused
struct SingleShotConnector {
    payload: String,
    connects: AtomicUsize,
}

#[async_trait]
impl AlertConnector for SingleShotConnector {
    async fn connect(&self, url: &str) -> pmu_monitor::Result<Box<dyn AlertStream>> {
        if self.connects.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(PmuMonitorError::WebSocket(format!("{} refused", url)));
        }
        Ok(Box::new(OneFrameStream {
            frame: Some(self.payload.clone()),
        }))
    }
}

#[given(expr = "an alert feed that sends {string}")]
fn alert_feed_sends(world: &mut PmuMonitorWorld, payload: String) {
    world.alert_payload = Some(payload);
}

#[when("the console receives the feed")]
async fn console_receives_feed(world: &mut PmuMonitorWorld) {
    let hub = new_alert_hub(500);
    world.alerts_before = hub.count().await;

    let connector = Arc::new(SingleShotConnector {
        payload: world.alert_payload.clone().unwrap_or_default(),
        connects: AtomicUsize::new(0),
    });
    let notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    let channel = AlertChannel::new(
        "ws://localhost:8000/ws/alerts",
        connector,
        hub.clone(),
        notifiers,
        ReconnectConfig::default(),
    );
    let cancel = CancellationToken::new();
    let (task, _state) = channel.spawn(cancel.clone());

    for _ in 0..100 {
        if hub.total_received().await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    task.await.unwrap();
    world.hub = Some(hub);
}

#[then(expr = "the alert list grows by exactly {int}")]
async fn alert_list_grows(world: &mut PmuMonitorWorld, by: usize) {
    let hub = world.hub.as_ref().unwrap();
    assert_eq!(hub.count().await, world.alerts_before + by);
}

#[then(expr = "the newest alert is PMU {string} with abnormal {string} at {float}")]
async fn newest_alert_matches(world: &mut PmuMonitorWorld, pmu: String, kind: String, value: f64) {
    let alerts = world.hub.as_ref().unwrap().snapshot().await;
    let newest = alerts.last().expect("no alerts received");
    assert_eq!(newest.pmu, pmu);
    assert_eq!(newest.kind, kind);
    assert!((newest.value - value).abs() < 1e-9);
}
