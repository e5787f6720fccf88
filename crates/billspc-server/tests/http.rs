//! HTTP surface tests against a driver running on the in-memory peripheral.

use axum::http::StatusCode;
use axum_test::TestServer;
use billspc_core::codec::{encode, Record};
use billspc_core::{
    CentralId, DisplaySnapshot, DisplayView, EventSender, MemoryPeripheral, PcConfig,
    PeripheralEvent, RadioState, Session, SessionDriver, SessionStatus, WatchDisplay, WriteStatus,
};
use billspc_server::api::create_router;
use billspc_server::api::health::HealthResponse;
use billspc_server::state::AppState;
use serde_json::json;
use tokio_test::assert_ok;

fn server() -> (TestServer, EventSender, MemoryPeripheral) {
    let config = PcConfig::default();
    let peripheral = MemoryPeripheral::default();
    let (display, display_rx) = WatchDisplay::new();
    let session = Session::new(config.advertisement());
    let (driver, status_rx) = SessionDriver::new(session, peripheral.clone(), display);
    let (events, rx) = EventSender::channel();
    tokio::spawn(driver.run(rx));

    let state = AppState::new(config, display_rx, status_rx, events.clone());
    let server = TestServer::new(create_router(state)).unwrap();
    (server, events, peripheral)
}

async fn power_on_and_subscribe(events: &EventSender) {
    assert_ok!(
        events
            .send(PeripheralEvent::RadioStateChanged(RadioState::PoweredOn))
            .await
    );
    assert_ok!(
        events
            .send(PeripheralEvent::Subscribed(CentralId::new("phone")))
            .await
    );
}

#[tokio::test]
async fn health_reports_phase() {
    let (server, _events, _) = server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.phase, "idle");
}

#[tokio::test]
async fn records_start_in_waiting_view() {
    let (server, _events, _) = server();

    let snapshot: DisplaySnapshot = server.get("/api/records").await.json();
    assert_eq!(snapshot.view, DisplayView::Waiting);
    assert!(snapshot.records.is_empty());
}

#[tokio::test]
async fn accepted_write_shows_up_in_records_and_session() {
    let (server, events, peripheral) = server();
    power_on_and_subscribe(&events).await;

    let payload = encode(&[
        Record::new(2, 149),
        Record::new(0, 1),
        Record::new(2, 145),
        Record::new(0, 1),
        Record::new(0, 1),
        Record::new(0, 1),
    ])
    .unwrap()
    .to_string();
    let status = assert_ok!(
        events
            .write(CentralId::new("phone"), payload.into_bytes())
            .await
    );
    assert_eq!(status, WriteStatus::Success);
    // The writer is answered first; a read queues behind the echo and refresh.
    assert_ok!(events.read().await);

    let snapshot: DisplaySnapshot = server.get("/api/records").await.json();
    assert_eq!(snapshot.view, DisplayView::Data);
    let names: Vec<_> = snapshot.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["DRAGONITE", "ZAPDOS"]);

    let session: SessionStatus = server.get("/api/session").await.json();
    assert_eq!(session.phase, "subscribed");
    assert_eq!(session.subscribers, 1);
    assert_eq!(session.last_batch_len, Some(6));
    assert_eq!(session.last_write_status, Some(WriteStatus::Success));
    assert_eq!(peripheral.notifications().len(), 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (server, _events, _) = server();

    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let doc: serde_json::Value = response.json();
    assert_eq!(doc["info"]["title"], json!("billspc API"));
    assert!(doc["paths"]["/api/records"].is_object());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (server, _events, _) = server();

    let response = server.get("/api/pokedex").expect_failure().await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
mod mock_routes {
    use super::*;
    use billspc_server::api::mock::WriteResponse;

    #[tokio::test]
    async fn radio_and_subscribe_drive_the_phase() {
        let (server, _events, peripheral) = server();

        let status: SessionStatus = server
            .post("/api/mock/radio")
            .json(&json!({ "state": "powered_on" }))
            .await
            .json();
        assert_eq!(status.phase, "advertising");
        assert_eq!(peripheral.advertisements().len(), 1);

        let status: SessionStatus = server
            .post("/api/mock/subscribe")
            .json(&json!({ "central": "phone" }))
            .await
            .json();
        assert_eq!(status.phase, "subscribed");

        let status: SessionStatus = server
            .post("/api/mock/unsubscribe")
            .json(&json!({ "central": "phone" }))
            .await
            .json();
        assert_eq!(status.phase, "advertising");
    }

    #[tokio::test]
    async fn write_from_records_is_packed_and_accepted() {
        let (server, events, _) = server();
        power_on_and_subscribe(&events).await;

        let response: WriteResponse = server
            .post("/api/mock/write")
            .json(&json!({
                "records": [
                    { "operation": 2, "index": 151 },
                    { "operation": 2, "index": 150 },
                    { "operation": 0, "index": 5 },
                    { "operation": 0, "index": 5 },
                    { "operation": 0, "index": 5 },
                    { "operation": 0, "index": 5 }
                ]
            }))
            .await
            .json();
        assert_eq!(response.status, WriteStatus::Success);
        assert_eq!(response.payload, "5635002466982551");

        let snapshot: DisplaySnapshot = server.get("/api/records").await.json();
        let names: Vec<_> = snapshot.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["MEW", "MEWTWO"]);
    }

    #[tokio::test]
    async fn short_and_invalid_payloads_report_their_status() {
        let (server, events, _) = server();
        power_on_and_subscribe(&events).await;

        let response: WriteResponse = server
            .post("/api/mock/write")
            .json(&json!({ "payload": "200" }))
            .await
            .json();
        assert_eq!(response.status, WriteStatus::RequestNotSupported);

        let response: WriteResponse = server
            .post("/api/mock/write")
            .json(&json!({ "payload": "abc" }))
            .await
            .json();
        assert_eq!(response.status, WriteStatus::InvalidRequest);
    }

    #[tokio::test]
    async fn write_needs_exactly_one_source() {
        let (server, _events, _) = server();

        let response = server
            .post("/api/mock/write")
            .json(&json!({}))
            .expect_failure()
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/mock/write")
            .json(&json!({ "records": [
                { "operation": 0, "index": 1 }, { "operation": 0, "index": 1 },
                { "operation": 0, "index": 1 }, { "operation": 0, "index": 1 },
                { "operation": 0, "index": 1 }, { "operation": 0, "index": 1 },
                { "operation": 0, "index": 1 }
            ]}))
            .expect_failure()
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], json!("too_many_records"));
    }
}
