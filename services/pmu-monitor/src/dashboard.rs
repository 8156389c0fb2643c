//! Web console: server-rendered views plus a small JSON API

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tracing::{debug, error};

use crate::model::{Phase, Protocol, Selection};
use crate::shell::{Route, ShellHandle, View};
use crate::views::{self, PageContext};
use crate::PmuMonitorError;

/// Console application state
#[derive(Clone)]
pub struct DashboardState {
    pub shell: ShellHandle,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct SelectForm {
    pmu: Option<String>,
    timeline: Option<String>,
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhaseForm {
    phase: String,
}

#[derive(Debug, Deserialize)]
struct ProtocolForm {
    protocol: String,
}

/// Build the console axum router
pub fn build_router(shell: ShellHandle) -> Router {
    Router::new()
        .route("/login", get(page_handler).post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/{view}/select", post(select_handler))
        .route("/graphs/phases", post(phases_handler))
        .route("/protocol", post(protocol_handler))
        .route("/api/alerts", get(alerts_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .fallback(page_handler)
        .with_state(DashboardState { shell })
}

fn internal_error(e: PmuMonitorError) -> Response {
    error!("Request failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

fn bad_request(e: PmuMonitorError) -> Response {
    debug!("Rejected form: {}", e);
    (StatusCode::BAD_REQUEST, e.to_string()).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
}

async fn page_handler(State(dashboard): State<DashboardState>, uri: Uri) -> Response {
    let shell = &dashboard.shell;
    match shell.navigate(uri.path()).await {
        Route::Redirect(to) => Redirect::to(to).into_response(),
        Route::NotFound => not_found(),
        Route::Render(View::Login) => Html(views::login_page(None)).into_response(),
        Route::Render(view) => Html(render_view(&dashboard, view).await).into_response(),
    }
}

async fn render_view(dashboard: &DashboardState, view: View) -> String {
    let shell = &dashboard.shell;
    let ctx = PageContext {
        view,
        refresh: view.refresh_interval(shell.polling()),
        channel: shell.channel_state(),
        protocol: shell.protocol().await,
    };
    match view {
        View::Notifications => views::notifications_page(&ctx, &shell.alerts().snapshot().await),
        View::Login => views::login_page(None),
        View::Dashboard | View::Events | View::Graphs => {
            let slot = shell.view_slot(view).await.unwrap_or_default();
            match view {
                View::Dashboard => views::dashboard_page(&ctx, &slot),
                View::Events => views::events_page(&ctx, &slot),
                _ => views::graphs_page(&ctx, &slot, &shell.graph_phases().await),
            }
        }
    }
}

async fn login_handler(
    State(dashboard): State<DashboardState>,
    Form(form): Form<LoginForm>,
) -> Response {
    match dashboard.shell.login(&form.username, &form.password).await {
        Ok(true) => Redirect::to(View::Dashboard.path()).into_response(),
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Html(views::login_page(Some("Invalid credentials"))),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn logout_handler(State(dashboard): State<DashboardState>) -> Response {
    match dashboard.shell.logout().await {
        Ok(()) => Redirect::to(View::Login.path()).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn select_handler(
    State(dashboard): State<DashboardState>,
    Path(segment): Path<String>,
    Form(form): Form<SelectForm>,
) -> Response {
    let shell = &dashboard.shell;
    if !shell.is_logged_in().await {
        return Redirect::to(View::Login.path()).into_response();
    }
    let Some(view) = View::from_segment(&segment) else {
        return not_found();
    };

    let mut selection: Selection = shell.selection(view).await;
    if let Some(pmu) = form.pmu.filter(|p| !p.is_empty()) {
        selection.pmu = Some(pmu);
    }
    if let Some(timeline) = form.timeline {
        match timeline.parse() {
            Ok(t) => selection.timeline = t,
            Err(e) => return bad_request(e),
        }
    }
    if let Some(phase) = form.phase {
        match phase.parse() {
            Ok(p) => selection.phase = p,
            Err(e) => return bad_request(e),
        }
    }
    shell.select(view, selection).await;
    Redirect::to(view.path()).into_response()
}

async fn phases_handler(
    State(dashboard): State<DashboardState>,
    Form(form): Form<PhaseForm>,
) -> Response {
    let shell = &dashboard.shell;
    if !shell.is_logged_in().await {
        return Redirect::to(View::Login.path()).into_response();
    }
    let phase: Phase = match form.phase.parse() {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };
    if !shell.toggle_graph_phase(phase).await {
        debug!("Kept {} displayed, at least one phase is required", phase);
    }
    Redirect::to(View::Graphs.path()).into_response()
}

async fn protocol_handler(
    State(dashboard): State<DashboardState>,
    Form(form): Form<ProtocolForm>,
) -> Response {
    let shell = &dashboard.shell;
    if !shell.is_logged_in().await {
        return Redirect::to(View::Login.path()).into_response();
    }
    let protocol: Protocol = match form.protocol.parse() {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };
    if let Err(e) = shell.set_protocol(protocol).await {
        return internal_error(e);
    }
    let back = shell.active_view().await.unwrap_or(View::Dashboard);
    Redirect::to(back.path()).into_response()
}

async fn alerts_handler(State(dashboard): State<DashboardState>) -> Response {
    if !dashboard.shell.is_logged_in().await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(dashboard.shell.alerts().snapshot().await).into_response()
}

async fn status_handler(State(dashboard): State<DashboardState>) -> Response {
    if !dashboard.shell.is_logged_in().await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(dashboard.shell.status().await).into_response()
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
