//! Bounded alert log shared between the alert channel and the views

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::model::{Alert, AlertKey};

const BROADCAST_CAPACITY: usize = 64;

/// Retained alerts, oldest first
#[derive(Debug)]
pub struct AlertLog {
    entries: VecDeque<Alert>,
    max_size: usize,
    last_batch: HashSet<AlertKey>,
    replay_pending: bool,
    total_received: u64,
}

impl AlertLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(1024)),
            max_size: max_size.max(1),
            last_batch: HashSet::new(),
            replay_pending: false,
            total_received: 0,
        }
    }

    /// The next non-empty batch may repeat what was seen before the disconnect
    pub fn mark_reconnect(&mut self) {
        self.replay_pending = true;
    }

    /// Append a batch, returning the alerts actually accepted
    pub fn append_batch(&mut self, batch: Vec<Alert>) -> Vec<Alert> {
        if batch.is_empty() {
            return batch;
        }

        let keys: HashSet<AlertKey> = batch.iter().map(Alert::key).collect();
        let accepted: Vec<Alert> = if self.replay_pending {
            self.replay_pending = false;
            batch
                .into_iter()
                .filter(|a| !self.last_batch.contains(&a.key()))
                .collect()
        } else {
            batch
        };
        self.last_batch = keys;

        for alert in &accepted {
            if self.entries.len() >= self.max_size {
                self.entries.pop_front();
            }
            self.entries.push_back(alert.clone());
        }
        self.total_received += accepted.len() as u64;
        accepted
    }

    pub fn entries(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Alerts accepted since startup, including evicted ones
    pub fn total_received(&self) -> u64 {
        self.total_received
    }
}

/// The alert log plus a broadcast of every accepted batch
#[derive(Debug)]
pub struct AlertHub {
    log: RwLock<AlertLog>,
    tx: broadcast::Sender<Vec<Alert>>,
}

impl AlertHub {
    pub fn new(retention: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            log: RwLock::new(AlertLog::new(retention)),
            tx,
        }
    }

    pub async fn append(&self, batch: Vec<Alert>) -> Vec<Alert> {
        let accepted = self.log.write().await.append_batch(batch);
        if !accepted.is_empty() {
            tracing::debug!("Accepted {} alert(s)", accepted.len());
            // No receivers is fine
            let _ = self.tx.send(accepted.clone());
        }
        accepted
    }

    pub async fn mark_reconnect(&self) {
        self.log.write().await.mark_reconnect();
    }

    pub async fn snapshot(&self) -> Vec<Alert> {
        self.log.read().await.entries().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn total_received(&self) -> u64 {
        self.log.read().await.total_received()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Alert>> {
        self.tx.subscribe()
    }
}

/// Thread-safe alert hub handle
pub type AlertHubHandle = Arc<AlertHub>;

pub fn new_alert_hub(retention: usize) -> AlertHubHandle {
    Arc::new(AlertHub::new(retention))
}
