//! Screen flow walk-throughs against the simulated transport

use std::sync::Arc;
use std::time::Duration;

use firminia_ble_controller::{
    ClientConfig, ConnectionState, Error, Locale, MemoryPreferences, Screen, ScreenFlow, Session,
    SimulatedTransport,
};

fn flow(sim: &SimulatedTransport) -> ScreenFlow<SimulatedTransport> {
    let config = ClientConfig::new(std::env::temp_dir());
    let session = Session::load(Box::new(MemoryPreferences::with_locale(Locale::Spanish))).unwrap();
    ScreenFlow::new(Arc::new(sim.clone()), &config, session)
}

async fn ready(flow: &mut ScreenFlow<SimulatedTransport>) -> Screen {
    assert_eq!(flow.current(), Screen::Splash);
    assert_eq!(flow.complete_splash(), Screen::Introduction);
    assert_eq!(flow.acknowledge_introduction(), Screen::Checking);
    flow.check_transport().await.unwrap()
}

#[tokio::test]
async fn full_happy_path() {
    let sim = SimulatedTransport::new()
        .with_device("AA:01", "FirminIA V3")
        .with_device("AA:02", "OtherGadget");
    let mut flow = flow(&sim);

    assert_eq!(ready(&mut flow).await, Screen::Pairing);
    // no automatic scan when bluetooth was on from the start
    assert_eq!(sim.discover_calls(), 0);

    let devices = flow.scan().await.unwrap();
    assert_eq!(devices.len(), 1);

    flow.connect("AA:01").await.unwrap();
    assert_eq!(flow.current(), Screen::MainApp);
    assert_eq!(flow.connected_device().unwrap().name, "FirminIA V3");

    assert_eq!(flow.open_configuration().unwrap(), Screen::Configuration);

    let mut payload = flow.session().blank_payload();
    payload.ssid = "Home".to_string();
    payload.server = "sign.example.com".to_string();
    flow.submit_configuration(&payload).await.unwrap();
    assert_eq!(flow.current(), Screen::MainApp);

    let writes = sim.writes();
    assert_eq!(writes.len(), 1);
    let body = std::str::from_utf8(&writes[0]).unwrap();
    assert!(body.contains(r#""language":"2""#));
    assert!(body.contains(r#""interval":"180000""#));

    assert_eq!(flow.disconnect().await, Screen::Pairing);
    assert!(flow.devices().is_empty());
    assert_eq!(flow.manager().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn transport_off_then_on_scans_once() {
    let sim = SimulatedTransport::new().with_device("AA:01", "firminia-7");
    sim.set_available(false);
    let mut flow = flow(&sim);

    assert_eq!(ready(&mut flow).await, Screen::TransportOff);
    assert!(!flow.open_settings().is_empty());

    // still off: recheck stays put and does not scan
    assert_eq!(flow.check_transport().await.unwrap(), Screen::TransportOff);
    assert_eq!(sim.discover_calls(), 0);

    sim.set_available(true);
    assert_eq!(flow.check_transport().await.unwrap(), Screen::Pairing);
    assert_eq!(sim.discover_calls(), 1);
    assert_eq!(flow.devices().len(), 1);

    // further rechecks while on do not scan again
    assert_eq!(flow.check_transport().await.unwrap(), Screen::Pairing);
    assert_eq!(sim.discover_calls(), 1);
}

#[tokio::test]
async fn failed_scan_keeps_pairing_with_message() {
    let sim = SimulatedTransport::new().with_device("AA:02", "OtherGadget");
    let mut flow = flow(&sim);
    ready(&mut flow).await;

    assert!(matches!(flow.scan().await, Err(Error::NoMatchingDevice)));
    assert_eq!(flow.current(), Screen::Pairing);
    assert!(flow.last_error().is_some());

    assert!(matches!(
        flow.connect("AA:02").await,
        Err(Error::UnknownDevice(_))
    ));
    assert_eq!(flow.current(), Screen::Pairing);
}

#[tokio::test]
async fn failed_connect_stays_on_pairing_and_retry_works() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;
    flow.scan().await.unwrap();

    sim.fail_connect(Some("timeout"));
    assert!(flow.connect("AA:01").await.is_err());
    assert_eq!(flow.current(), Screen::Pairing);
    assert!(flow.last_error().unwrap().contains("timeout"));

    sim.fail_connect(None);
    flow.connect("AA:01").await.unwrap();
    assert_eq!(flow.current(), Screen::MainApp);
    assert!(flow.last_error().is_none());
}

#[tokio::test]
async fn configuration_requires_connection() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;

    assert!(matches!(flow.open_configuration(), Err(Error::NotConnected)));
    assert_eq!(flow.current(), Screen::Pairing);
}

#[tokio::test]
async fn invalid_form_keeps_configuration_screen() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;
    flow.scan().await.unwrap();
    flow.connect("AA:01").await.unwrap();
    flow.open_configuration().unwrap();

    let payload = flow.session().blank_payload();
    assert!(matches!(
        flow.submit_configuration(&payload).await,
        Err(Error::ValidationFailed(_))
    ));
    assert_eq!(flow.current(), Screen::Configuration);
    assert!(sim.writes().is_empty());

    assert_eq!(flow.close_configuration(), Screen::MainApp);
}

#[tokio::test]
async fn link_loss_returns_to_pairing() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;
    flow.scan().await.unwrap();
    flow.connect("AA:01").await.unwrap();
    flow.open_configuration().unwrap();

    let mut states = flow.manager().subscribe();
    sim.trigger_link_loss();
    tokio::time::timeout(
        Duration::from_secs(1),
        states.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(flow.current(), Screen::Pairing);

    // reconnecting lands on the main screen, not back in the form
    flow.connect("AA:01").await.unwrap();
    assert_eq!(flow.current(), Screen::MainApp);
}

#[tokio::test]
async fn scan_on_missing_radio_moves_to_transport_off() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;

    sim.set_available(false);
    assert!(matches!(
        flow.scan().await,
        Err(Error::TransportUnavailable(_))
    ));
    assert_eq!(flow.current(), Screen::TransportOff);
}

#[tokio::test]
async fn rejected_form_is_offered_again() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;
    flow.scan().await.unwrap();
    flow.connect("AA:01").await.unwrap();
    flow.open_configuration().unwrap();
    assert_eq!(flow.configuration_draft(), flow.session().blank_payload());

    let mut payload = flow.configuration_draft();
    payload.ssid = "Home".to_string();
    payload.server = "sign.example.com".to_string();
    payload.port = "not-a-port".to_string();
    assert!(flow.submit_configuration(&payload).await.is_err());
    assert_eq!(flow.current(), Screen::Configuration);
    assert_eq!(flow.configuration_draft(), payload);

    payload.port = "8443".to_string();
    flow.submit_configuration(&payload).await.unwrap();
    assert_eq!(flow.current(), Screen::MainApp);
    assert_eq!(flow.configuration_draft(), flow.session().blank_payload());
}

#[tokio::test]
async fn discarding_the_form_drops_the_draft() {
    let sim = SimulatedTransport::new().with_device("AA:01", "FirminIA V3");
    let mut flow = flow(&sim);
    ready(&mut flow).await;
    flow.scan().await.unwrap();
    flow.connect("AA:01").await.unwrap();
    flow.open_configuration().unwrap();

    let mut payload = flow.configuration_draft();
    payload.ssid = "Home".to_string();
    assert!(flow.submit_configuration(&payload).await.is_err());
    assert_eq!(flow.close_configuration(), Screen::MainApp);
    assert_eq!(flow.configuration_draft(), flow.session().blank_payload());
}
