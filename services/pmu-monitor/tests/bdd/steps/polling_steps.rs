//! BDD step definitions for view polling and selection changes

use std::time::{Duration, Instant};

use cucumber::{given, then, when};

use pmu_monitor::config::Config;
use pmu_monitor::shell::View;
use pmu_monitor::store::LocalStore;

use crate::world::PmuMonitorWorld;

const INTERVAL: Duration = Duration::from_millis(100);

#[given(expr = "a logged-in console polling PMUs {string}")]
async fn console_with_pmus(world: &mut PmuMonitorWorld, pmus: String) {
    let pmus: Vec<&str> = pmus.split(',').map(str::trim).collect();
    let mut config = Config::default();
    config.polling.dashboard_interval = INTERVAL;
    world
        .start_console(config, LocalStore::in_memory(), &pmus)
        .await;
    assert!(world.shell().login("inelec", "inelec123").await.unwrap());
}

#[given("the dashboard is open")]
async fn dashboard_open(world: &mut PmuMonitorWorld) {
    world.shell().navigate("/dashboard").await;
    tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
}

#[when(expr = "the operator selects PMU {string} on the dashboard")]
async fn select_pmu(world: &mut PmuMonitorWorld, pmu: String) {
    let shell = world.shell().clone();
    let mut selection = shell.selection(View::Dashboard).await;
    selection.pmu = Some(pmu);
    world.request_mark = world.http().requests().len();
    world.selected_at = Some(Instant::now());
    shell.select(View::Dashboard, selection).await;
}

#[when(expr = "{int} polling intervals pass")]
async fn intervals_pass(_world: &mut PmuMonitorWorld, count: u32) {
    tokio::time::sleep(INTERVAL * count + INTERVAL / 2).await;
}

#[then(expr = "the dashboard had been polling PMU {string}")]
fn had_been_polling(world: &mut PmuMonitorWorld, pmu: String) {
    let needle = format!("pmu={}", pmu);
    let before = &world.http().urls()[..world.request_mark];
    assert!(
        before
            .iter()
            .any(|url| url.contains("/api/power_a") && url.contains(&needle)),
        "requests: {:?}",
        before
    );
}

#[then(expr = "no further requests ask for PMU {string}")]
fn no_requests_for(world: &mut PmuMonitorWorld, pmu: String) {
    let needle = format!("pmu={}&", pmu);
    let after: Vec<String> = world.http().urls()[world.request_mark..].to_vec();
    assert!(
        after.iter().all(|url| !format!("{}&", url).contains(&needle)),
        "requests after selection change: {:?}",
        after
    );
}

#[then(expr = "requests for PMU {string} begin within one polling interval")]
fn requests_begin_within_interval(world: &mut PmuMonitorWorld, pmu: String) {
    let needle = format!("pmu={}", pmu);
    let selected_at = world.selected_at.unwrap();
    let first = world.http().requests()[world.request_mark..]
        .iter()
        .find(|(_, url)| url.contains("/api/power_a") && url.contains(&needle))
        .map(|(at, _)| *at)
        .expect("no request for the new PMU");
    assert!(first.duration_since(selected_at) <= INTERVAL);
}
