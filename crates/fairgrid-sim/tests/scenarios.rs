//! Replays the bundled scenario files.

use std::path::PathBuf;

use fairgrid_core::{LocalityMode, Resource, SchedulerConfig};
use fairgrid_sim::{OfferOutcome, Scenario, run_scenario};

fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

#[test]
fn delay_scheduling_waits_for_the_local_node() {
    let scenario = Scenario::from_file(&scenario_path("delay-scheduling.toml")).unwrap();
    let report = run_scenario(&scenario).unwrap();

    let first_round: Vec<_> = report.offers.iter().filter(|o| o.round == 0).collect();
    assert_eq!(first_round[0].outcome, OfferOutcome::None);
    assert_eq!(first_round[1].outcome, OfferOutcome::None);
    assert_eq!(first_round[2].outcome, OfferOutcome::Allocated);
    assert_eq!(first_round[3].outcome, OfferOutcome::Allocated);

    assert_eq!(report.containers.len(), 2);
    assert_eq!(report.containers[0].node, "n3");
    assert_eq!(report.outstanding_containers, 0);
    assert_eq!(report.consumption, Resource::new(2048, 2));
}

#[test]
fn oversized_ask_is_held_on_the_node() {
    let scenario = Scenario::from_file(&scenario_path("reservation.toml")).unwrap();
    let report = run_scenario(&scenario).unwrap();

    assert_eq!(report.count(OfferOutcome::Allocated), 2);
    assert_eq!(report.count(OfferOutcome::Reserved), 1);
    assert!(report.offers[3].from_reservation);
    assert_eq!(report.offers[3].outcome, OfferOutcome::None);
    assert_eq!(report.reserved, Resource::new(2048, 1));
    assert_eq!(report.outstanding_containers, 1);
}

#[test]
fn report_renders_as_json_and_text() {
    let scenario = Scenario::from_file(&scenario_path("reservation.toml")).unwrap();
    let report = run_scenario(&scenario).unwrap();

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["offers"][2]["outcome"], "reserved");
    assert_eq!(json["reserved"]["memory_mb"], 2048);

    let text = report.to_string();
    assert!(text.contains("reserved:    <memory:2048, vCores:1>"));
}

#[test]
fn standalone_scheduler_config_loads() {
    let config = SchedulerConfig::from_file(&scenario_path("scheduler.toml")).unwrap();
    assert_eq!(config.locality_mode(), LocalityMode::ElapsedTime);
    assert_eq!(config.rack_locality_delay_ms, 4_000);
    assert!(config.delay_scheduling_enabled());
}
