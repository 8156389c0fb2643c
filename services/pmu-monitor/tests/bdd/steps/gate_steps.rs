//! BDD step definitions for the session gate

use std::time::Duration;

use cucumber::{given, then, when};

use pmu_monitor::config::Config;
use pmu_monitor::shell::Route;
use pmu_monitor::store::LocalStore;

use crate::world::PmuMonitorWorld;

#[given("a console with no active session")]
async fn console_without_session(world: &mut PmuMonitorWorld) {
    world
        .start_console(Config::default(), LocalStore::in_memory(), &["pmu1", "pmu2"])
        .await;
    assert!(!world.shell().is_logged_in().await);
}

#[when(expr = "the operator visits {string}")]
async fn operator_visits(world: &mut PmuMonitorWorld, path: String) {
    world.last_route = Some(world.shell().navigate(&path).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[then(expr = "they are redirected to {string}")]
fn redirected_to(world: &mut PmuMonitorWorld, target: String) {
    match world.last_route {
        Some(Route::Redirect(to)) => assert_eq!(to, target),
        other => panic!("expected a redirect to {}, got {:?}", target, other),
    }
}

#[then("no data request was issued")]
fn no_data_request(world: &mut PmuMonitorWorld) {
    assert!(world.http().urls().is_empty(), "{:?}", world.http().urls());
}

#[then("no view is mounted")]
async fn no_view_mounted(world: &mut PmuMonitorWorld) {
    assert!(world.shell().active_view().await.is_none());
}
