//! Session-gated navigation: which view is mounted and what it is looking at

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alert_channel::ChannelState;
use crate::alerts::AlertHubHandle;
use crate::api::BackendClient;
use crate::chart;
use crate::config::{Config, PollingConfig};
use crate::io::HttpClient;
use crate::model::{Phase, Protocol, Selection};
use crate::poller::{Feed, ViewPoller, ViewSlot};
use crate::session::SessionGate;
use crate::store::{LocalStore, SELECTED_PROTOCOL};

/// A page of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Login,
    Dashboard,
    Events,
    Graphs,
    Notifications,
}

impl View {
    pub const PROTECTED: [View; 4] = [
        View::Dashboard,
        View::Events,
        View::Graphs,
        View::Notifications,
    ];

    pub fn from_path(path: &str) -> Option<View> {
        match path.trim_end_matches('/') {
            "/login" => Some(View::Login),
            "/dashboard" => Some(View::Dashboard),
            "/events" => Some(View::Events),
            "/graphs" => Some(View::Graphs),
            "/notifications" => Some(View::Notifications),
            _ => None,
        }
    }

    /// Parse the `{view}` segment of a view-scoped route
    pub fn from_segment(segment: &str) -> Option<View> {
        View::from_path(&format!("/{}", segment)).filter(|v| v.feed().is_some())
    }

    pub fn path(&self) -> &'static str {
        match self {
            View::Login => "/login",
            View::Dashboard => "/dashboard",
            View::Events => "/events",
            View::Graphs => "/graphs",
            View::Notifications => "/notifications",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            View::Login => "Login",
            View::Dashboard => "Dashboard",
            View::Events => "Events",
            View::Graphs => "Graphs",
            View::Notifications => "Notifications",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, View::Login)
    }

    pub fn feed(&self) -> Option<Feed> {
        match self {
            View::Dashboard => Some(Feed::Dashboard),
            View::Events => Some(Feed::Events),
            View::Graphs => Some(Feed::Graphs),
            View::Login | View::Notifications => None,
        }
    }

    /// How often the rendered page reloads itself
    pub fn refresh_interval(&self, polling: &PollingConfig) -> Option<Duration> {
        match self {
            View::Login => None,
            View::Notifications => Some(polling.graphs_interval),
            _ => self.feed().and_then(|feed| feed.interval(polling)),
        }
    }
}

/// Outcome of resolving a path against the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Render(View),
    Redirect(&'static str),
    NotFound,
}

/// Pure routing decision; mounting happens in [`Shell::navigate`]
pub fn resolve(path: &str, logged_in: bool) -> Route {
    if path.is_empty() || path == "/" {
        return Route::Redirect(View::Dashboard.path());
    }
    match View::from_path(path) {
        Some(View::Login) if logged_in => Route::Redirect(View::Dashboard.path()),
        Some(view) if view.is_protected() && !logged_in => Route::Redirect(View::Login.path()),
        Some(view) => Route::Render(view),
        None => Route::NotFound,
    }
}

#[derive(Debug)]
struct ShellState {
    active: Option<View>,
    poller: Option<ViewPoller>,
    selections: HashMap<View, Selection>,
    graph_phases: BTreeSet<Phase>,
    protocol: Protocol,
}

/// Snapshot served by `/api/status`
#[derive(Debug, Clone, Serialize)]
pub struct ShellStatus {
    pub active_view: Option<View>,
    pub protocol: Protocol,
    pub alert_channel: ChannelState,
    pub alerts_retained: usize,
    pub selections: HashMap<View, Selection>,
    pub graph_phases: Vec<Phase>,
}

/// Owns the session gate, the mounted view and the alert hub
pub struct Shell {
    backend: BackendClient,
    polling: PollingConfig,
    session: SessionGate,
    store: Arc<LocalStore>,
    alerts: AlertHubHandle,
    channel_state: watch::Receiver<ChannelState>,
    root: CancellationToken,
    state: RwLock<ShellState>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Thread-safe shell handle
pub type ShellHandle = Arc<Shell>;

impl Shell {
    pub async fn new(
        config: &Config,
        http: Arc<dyn HttpClient>,
        store: Arc<LocalStore>,
        alerts: AlertHubHandle,
        channel_state: watch::Receiver<ChannelState>,
        root: CancellationToken,
    ) -> Self {
        let protocol = store.protocol().await;
        debug!("Restored protocol {}", protocol);
        Self {
            backend: BackendClient::new(config.backend.base_url.clone(), http),
            polling: config.polling.clone(),
            session: SessionGate::new(&config.session, store.clone()),
            store,
            alerts,
            channel_state,
            root,
            state: RwLock::new(ShellState {
                active: None,
                poller: None,
                selections: HashMap::new(),
                graph_phases: Phase::ALL.into_iter().collect(),
                protocol,
            }),
        }
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    pub fn alerts(&self) -> &AlertHubHandle {
        &self.alerts
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel_state.borrow().clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.is_logged_in().await
    }

    /// Resolve a path and mount the view it renders
    pub async fn navigate(&self, path: &str) -> Route {
        let route = resolve(path, self.is_logged_in().await);
        match route {
            Route::Render(view) if view.is_protected() => self.mount(view).await,
            Route::Render(_) => {}
            Route::Redirect(to) => debug!("{} redirects to {}", path, to),
            Route::NotFound => debug!("No route for {}", path),
        }
        route
    }

    /// Mount `view`, dismissing whatever was mounted before
    pub async fn mount(&self, view: View) {
        let mut state = self.state.write().await;
        if state.active == Some(view) && state.poller.as_ref().is_none_or(|p| !p.is_stopped()) {
            return;
        }
        Self::dismiss(&mut state).await;

        info!("Mounting {} view", view.title());
        state.active = Some(view);
        if let Some(feed) = view.feed() {
            let selection = state.selections.get(&view).cloned().unwrap_or_default();
            let mut poller = ViewPoller::new(
                feed,
                self.backend.clone(),
                self.polling.clone(),
                selection,
                &self.root,
            );
            poller.mount().await;
            state.poller = Some(poller);
        }
    }

    /// Tear down the mounted view, keeping its selection for the next mount
    async fn dismiss(state: &mut ShellState) {
        if let Some(poller) = state.poller.take() {
            let selection = poller.slot().read().await.selection.clone();
            poller.teardown();
            if let Some(view) = state.active {
                state.selections.insert(view, selection);
            }
        }
        if let Some(view) = state.active.take() {
            debug!("Dismissed {} view", view.title());
        }
    }

    pub async fn teardown_active(&self) {
        let mut state = self.state.write().await;
        Self::dismiss(&mut state).await;
    }

    pub async fn login(&self, username: &str, password: &str) -> crate::Result<bool> {
        self.session.login(username, password).await
    }

    /// Tear down the active view, then clear the session flag
    pub async fn logout(&self) -> crate::Result<()> {
        self.teardown_active().await;
        self.session.logout().await
    }

    pub async fn active_view(&self) -> Option<View> {
        self.state.read().await.active
    }

    /// Current selection of a view, live if it is mounted
    pub async fn selection(&self, view: View) -> Selection {
        let state = self.state.read().await;
        if let (Some(poller), Some(active)) = (&state.poller, state.active) {
            if active == view {
                return poller.slot().read().await.selection.clone();
            }
        }
        state.selections.get(&view).cloned().unwrap_or_default()
    }

    /// Change what a view looks at; a mounted view restarts its polling
    pub async fn select(&self, view: View, selection: Selection) {
        let mut state = self.state.write().await;
        state.selections.insert(view, selection.clone());
        if state.active == Some(view) {
            if let Some(poller) = state.poller.as_mut() {
                poller.select(selection).await;
            }
        }
    }

    /// Copy of a mounted view's slot
    pub async fn view_slot(&self, view: View) -> Option<ViewSlot> {
        let state = self.state.read().await;
        if state.active != Some(view) {
            return None;
        }
        let poller = state.poller.as_ref()?;
        let slot = poller.slot().read().await.clone();
        Some(slot)
    }

    pub async fn protocol(&self) -> Protocol {
        self.state.read().await.protocol
    }

    /// Persist the protocol locally and tell the backend once.
    /// A failed backend call is logged and the local choice is kept.
    pub async fn set_protocol(&self, protocol: Protocol) -> crate::Result<()> {
        self.store.set(SELECTED_PROTOCOL, protocol.as_str()).await?;
        self.state.write().await.protocol = protocol;
        if let Err(e) = self.backend.change_protocol(protocol).await {
            warn!("Changing backend protocol to {} failed: {}", protocol, e);
        }
        Ok(())
    }

    pub async fn graph_phases(&self) -> BTreeSet<Phase> {
        self.state.read().await.graph_phases.clone()
    }

    /// Toggle a displayed graph phase; the last one cannot be removed
    pub async fn toggle_graph_phase(&self, phase: Phase) -> bool {
        let mut state = self.state.write().await;
        chart::toggle_phase(&mut state.graph_phases, phase)
    }

    pub async fn status(&self) -> ShellStatus {
        let alerts_retained = self.alerts.count().await;
        let state = self.state.read().await;
        let mut selections = state.selections.clone();
        if let (Some(view), Some(poller)) = (state.active, &state.poller) {
            selections.insert(view, poller.slot().read().await.selection.clone());
        }
        ShellStatus {
            active_view: state.active,
            protocol: state.protocol,
            alert_channel: self.channel_state(),
            alerts_retained,
            selections,
            graph_phases: state.graph_phases.iter().copied().collect(),
        }
    }
}
