//! BDD step definitions for the protocol toggle

use cucumber::{given, then, when};

use pmu_monitor::config::Config;
use pmu_monitor::model::Protocol;
use pmu_monitor::store::LocalStore;

use crate::world::PmuMonitorWorld;

fn store_path(world: &PmuMonitorWorld) -> std::path::PathBuf {
    world.store_dir.as_ref().unwrap().path().join("state.json")
}

#[given("a logged-in console with its store on disk")]
async fn console_with_store(world: &mut PmuMonitorWorld) {
    world.store_dir = Some(tempfile::tempdir().unwrap());
    let store = LocalStore::open(store_path(world)).await.unwrap();
    world.start_console(Config::default(), store, &["pmu1"]).await;
    assert!(world.shell().login("inelec", "inelec123").await.unwrap());
}

#[when(expr = "the operator switches the protocol to {string}")]
async fn switch_protocol(world: &mut PmuMonitorWorld, protocol: String) {
    let protocol: Protocol = protocol.parse().unwrap();
    world.shell().set_protocol(protocol).await.unwrap();
}

#[then(expr = "the stored protocol is {string}")]
async fn stored_protocol(world: &mut PmuMonitorWorld, expected: String) {
    let reopened = LocalStore::open(store_path(world)).await.unwrap();
    assert_eq!(reopened.protocol().await.as_str(), expected);
    assert_eq!(world.shell().protocol().await.as_str(), expected);
}

#[then(expr = "exactly {int} request(s) contain(s) {string}")]
fn requests_containing(world: &mut PmuMonitorWorld, expected: usize, needle: String) {
    let matching = world
        .http()
        .urls()
        .iter()
        .filter(|url| url.contains(&needle))
        .count();
    assert_eq!(matching, expected, "requests: {:?}", world.http().urls());
}
