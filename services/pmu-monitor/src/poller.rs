//! Per-view polling loops
//!
//! Every data view owns a [`ViewPoller`]. Mounting it loads the PMU list,
//! picks the first PMU when nothing is selected, then fetches the view's data
//! slice on a fixed timer. A selection change cancels the running loop and
//! starts a new one under a fresh generation, so late responses for the old
//! selection are dropped instead of overwriting newer data.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::BackendClient;
use crate::config::PollingConfig;
use crate::error::ErrorKind;
use crate::model::{MeasurementRow, PowerPoint, PowerSnapshot, Selection};

const PMU_LIST_RETRY: Duration = Duration::from_secs(5);

/// The data slice a view polls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Dashboard,
    Events,
    Graphs,
}

impl Feed {
    /// Polling period; `None` fetches once per mount or selection
    pub fn interval(&self, polling: &PollingConfig) -> Option<Duration> {
        match self {
            Feed::Dashboard => Some(polling.dashboard_interval),
            Feed::Events => polling.events_interval,
            Feed::Graphs => Some(polling.graphs_interval),
        }
    }

    async fn fetch(
        &self,
        backend: &BackendClient,
        polling: &PollingConfig,
        pmu: &str,
        selection: &Selection,
    ) -> crate::Result<ViewData> {
        match self {
            Feed::Dashboard => backend
                .power_snapshot(pmu, selection.timeline.value(), selection.phase)
                .await
                .map(ViewData::Dashboard),
            Feed::Events => backend
                .measurements(pmu, selection.timeline.value())
                .await
                .map(ViewData::Events),
            Feed::Graphs => backend
                .power_timeseries(pmu, &polling.graphs_start, &polling.graphs_window)
                .await
                .map(ViewData::Graphs),
        }
    }
}

/// Last successful response of a feed
#[derive(Debug, Clone, PartialEq)]
pub enum ViewData {
    Dashboard(PowerSnapshot),
    Events(Vec<MeasurementRow>),
    Graphs(Vec<PowerPoint>),
}

/// What a view renders from
#[derive(Debug, Clone, Default)]
pub struct ViewSlot {
    pub pmus: Vec<String>,
    pub pmus_loaded: bool,
    pub selection: Selection,
    pub data: Option<ViewData>,
    pub last_error: Option<ErrorKind>,
    pub consecutive_errors: u32,
    pub generation: u64,
    pub applied_seq: u64,
}

impl ViewSlot {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }

    /// Apply a response, returning false when it is stale.
    /// Failures keep the previous data and only record the error kind.
    pub fn apply(&mut self, generation: u64, seq: u64, result: crate::Result<ViewData>) -> bool {
        if generation != self.generation || seq <= self.applied_seq {
            debug!(
                "Discarding stale response (generation {} seq {}, current {} / {})",
                generation, seq, self.generation, self.applied_seq
            );
            return false;
        }
        self.applied_seq = seq;

        match result {
            Ok(data) => {
                self.data = Some(data);
                self.last_error = None;
                self.consecutive_errors = 0;
            }
            Err(e) => {
                if self.consecutive_errors == 0 {
                    warn!("Fetch failed: {}", e);
                } else {
                    debug!("Fetch still failing ({}): {}", self.consecutive_errors + 1, e);
                }
                self.consecutive_errors += 1;
                self.last_error = Some(e.kind());
            }
        }
        true
    }

    pub fn snapshot(&self) -> Option<&PowerSnapshot> {
        match &self.data {
            Some(ViewData::Dashboard(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    pub fn rows(&self) -> &[MeasurementRow] {
        match &self.data {
            Some(ViewData::Events(rows)) => rows,
            _ => &[],
        }
    }

    pub fn points(&self) -> &[PowerPoint] {
        match &self.data {
            Some(ViewData::Graphs(points)) => points,
            _ => &[],
        }
    }
}

/// Thread-safe view slot handle
pub type SlotHandle = Arc<RwLock<ViewSlot>>;

struct PollerInner {
    feed: Feed,
    backend: BackendClient,
    polling: PollingConfig,
    slot: SlotHandle,
    seq: AtomicU64,
}

/// Timed fetch loop for one mounted view
pub struct ViewPoller {
    inner: Arc<PollerInner>,
    view_token: CancellationToken,
    loop_token: CancellationToken,
}

impl std::fmt::Debug for ViewPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewPoller")
            .field("feed", &self.inner.feed)
            .field("stopped", &self.view_token.is_cancelled())
            .finish()
    }
}

impl ViewPoller {
    pub fn new(
        feed: Feed,
        backend: BackendClient,
        polling: PollingConfig,
        selection: Selection,
        parent: &CancellationToken,
    ) -> Self {
        let view_token = parent.child_token();
        let loop_token = view_token.child_token();
        Self {
            inner: Arc::new(PollerInner {
                feed,
                backend,
                polling,
                slot: Arc::new(RwLock::new(ViewSlot::new(selection))),
                seq: AtomicU64::new(0),
            }),
            view_token,
            loop_token,
        }
    }

    pub fn feed(&self) -> Feed {
        self.inner.feed
    }

    pub fn slot(&self) -> SlotHandle {
        self.inner.slot.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.view_token.is_cancelled()
    }

    /// Start polling: load the PMU list, then run the timed loop
    pub async fn mount(&mut self) {
        debug!("Mounting {:?} poller", self.inner.feed);
        self.inner.slot.write().await.pmus_loaded = false;
        self.restart().await;
    }

    /// Replace the selection and restart the fetch cycle from scratch
    pub async fn select(&mut self, selection: Selection) {
        {
            let mut slot = self.inner.slot.write().await;
            if slot.selection == selection {
                return;
            }
            debug!(
                "{:?} selection changed: {:?} -> {:?}",
                self.inner.feed, slot.selection, selection
            );
            slot.selection = selection;
            slot.data = None;
            slot.last_error = None;
            slot.consecutive_errors = 0;
        }
        self.restart().await;
    }

    /// Stop all polling for this view
    pub fn teardown(&self) {
        debug!("Tearing down {:?} poller", self.inner.feed);
        self.view_token.cancel();
    }

    async fn restart(&mut self) {
        self.loop_token.cancel();
        if self.view_token.is_cancelled() {
            return;
        }
        let generation = {
            let mut slot = self.inner.slot.write().await;
            slot.generation += 1;
            slot.generation
        };
        self.loop_token = self.view_token.child_token();
        tokio::spawn(run_loop(
            self.inner.clone(),
            generation,
            self.loop_token.clone(),
        ));
    }
}

impl Drop for ViewPoller {
    fn drop(&mut self) {
        self.view_token.cancel();
    }
}

/// Resolve the PMU to poll, loading the list when needed.
/// Returns `None` when cancelled or when the backend knows no PMUs.
async fn resolve_pmu(
    inner: &PollerInner,
    generation: u64,
    token: &CancellationToken,
) -> Option<(String, Selection)> {
    loop {
        {
            let slot = inner.slot.read().await;
            if slot.generation != generation {
                return None;
            }
            if slot.pmus_loaded {
                if let Some(pmu) = slot.selection.pmu.clone() {
                    return Some((pmu, slot.selection.clone()));
                }
            }
        }

        let listed = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            listed = inner.backend.list_pmus() => listed,
        };

        match listed {
            Ok(pmus) => {
                let mut slot = inner.slot.write().await;
                if slot.generation != generation {
                    return None;
                }
                debug!("{:?} loaded {} PMU(s)", inner.feed, pmus.len());
                slot.pmus = pmus;
                slot.pmus_loaded = true;
                slot.last_error = None;
                if slot.selection.pmu.is_none() {
                    slot.selection.pmu = slot.pmus.first().cloned();
                }
                let Some(pmu) = slot.selection.pmu.clone() else {
                    debug!("{:?}: no PMUs available, not polling", inner.feed);
                    return None;
                };
                return Some((pmu, slot.selection.clone()));
            }
            Err(e) => {
                warn!("Loading PMU list failed: {}", e);
                {
                    let mut slot = inner.slot.write().await;
                    if slot.generation != generation {
                        return None;
                    }
                    slot.last_error = Some(e.kind());
                }
                let retry = inner.feed.interval(&inner.polling).unwrap_or(PMU_LIST_RETRY);
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return None,
                    _ = tokio::time::sleep(retry) => {}
                }
            }
        }
    }
}

async fn run_loop(inner: Arc<PollerInner>, generation: u64, token: CancellationToken) {
    let Some((pmu, selection)) = resolve_pmu(&inner, generation, &token).await else {
        return;
    };

    let mut ticker = inner.feed.interval(&inner.polling).map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        if let Some(ticker) = ticker.as_mut() {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        let seq = inner.seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("{:?} poll #{} for {}", inner.feed, seq, pmu);
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = inner.feed.fetch(&inner.backend, &inner.polling, &pmu, &selection) => result,
        };
        inner.slot.write().await.apply(generation, seq, result);

        if ticker.is_none() {
            break;
        }
    }
    debug!("{:?} poll loop for generation {} finished", inner.feed, generation);
}
