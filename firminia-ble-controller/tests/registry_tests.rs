//! Device Registry behaviour against the simulated transport

use std::sync::Arc;

use firminia_ble_controller::{
    ClientConfig, DeviceRegistry, Error, SimulatedTransport, TransportKind,
};

fn registry(sim: &SimulatedTransport) -> DeviceRegistry<SimulatedTransport> {
    let config = ClientConfig::new(std::env::temp_dir()).with_transport(TransportKind::Simulated);
    DeviceRegistry::new(Arc::new(sim.clone()), config.filter)
}

#[tokio::test]
async fn accepts_marker_case_insensitively() {
    let sim = SimulatedTransport::new()
        .with_device("AA:01", "FIRMINIA-42")
        .with_device("AA:02", "OtherGadget");
    let mut registry = registry(&sim);

    let devices = registry.scan().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "AA:01");
    assert_eq!(devices[0].name, "FIRMINIA-42");
    assert_eq!(registry.find("AA:01"), Some(&devices[0]));
    assert!(registry.find("AA:02").is_none());
}

#[tokio::test]
async fn no_matching_device_is_an_error() {
    let sim = SimulatedTransport::new()
        .with_device("AA:02", "OtherGadget")
        .with_unnamed_device("AA:03");
    let mut registry = registry(&sim);

    assert!(matches!(registry.scan().await, Err(Error::NoMatchingDevice)));
    assert!(registry.devices().is_empty());
}

#[tokio::test]
async fn new_scan_replaces_previous_results() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut registry = registry(&sim);
    registry.scan().await.unwrap();
    assert_eq!(registry.devices().len(), 1);

    sim.cancel_next_discovery();
    assert!(matches!(registry.scan().await, Err(Error::UserCancelled)));
    assert!(registry.devices().is_empty());
}

#[tokio::test]
async fn unavailable_transport_fails_before_discovery() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    sim.set_available(false);
    let mut registry = registry(&sim);

    assert!(matches!(
        registry.scan().await,
        Err(Error::TransportUnavailable(_))
    ));
    assert_eq!(sim.discover_calls(), 0);
}

#[tokio::test]
async fn clear_drops_results() {
    let sim = SimulatedTransport::new().with_device("AA:01", "firminia");
    let mut registry = registry(&sim);
    registry.scan().await.unwrap();
    registry.clear();
    assert!(registry.devices().is_empty());
}
