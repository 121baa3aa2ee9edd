//! Integration tests for the API server.

use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    shutdown: watch::Sender<bool>,
}

fn setup_with_workers() -> TestApp {
    let (state, bus) = api::create_default_state();
    let (shutdown, rx) = watch::channel(false);
    api::spawn_workers(&state, bus, Duration::from_millis(5), rx);
    let app = api::create_app(state, get_metrics_handle());
    TestApp { app, shutdown }
}

fn setup() -> axum::Router {
    let (state, _bus) = api::create_default_state();
    api::create_app(state, get_metrics_handle())
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_issue_ticket() {
    let app = setup();
    let passenger_id = uuid::Uuid::new_v4().to_string();

    let (status, json) = request(
        &app,
        "POST",
        "/tickets",
        Some(serde_json::json!({
            "passenger_id": passenger_id,
            "kind": "single-ride",
            "route": "Line 4"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "Created");
    assert_eq!(json["kind"], "single-ride");
    assert_eq!(json["amount_cents"], 1500);
    assert_eq!(json["passenger_id"], passenger_id);
}

#[tokio::test]
async fn test_issue_ticket_unknown_kind_is_bad_request() {
    let app = setup();
    let (status, json) = request(
        &app,
        "POST",
        "/tickets",
        Some(serde_json::json!({
            "passenger_id": uuid::Uuid::new_v4().to_string(),
            "kind": "teleport"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("teleport"));
}

#[tokio::test]
async fn test_get_ticket_not_found() {
    let app = setup();
    let (status, _) = request(
        &app,
        "GET",
        &format!("/tickets/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_ticket_bad_id_is_bad_request() {
    let app = setup();
    let (status, _) = request(&app, "GET", "/tickets/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_flow_over_http() {
    let app = setup();
    let passenger_id = uuid::Uuid::new_v4().to_string();

    let (_, ticket) = request(
        &app,
        "POST",
        "/tickets",
        Some(serde_json::json!({
            "passenger_id": passenger_id,
            "kind": "single-ride"
        })),
    )
    .await;
    let ticket_id = ticket["id"].as_str().unwrap().to_string();

    let (status, payment) = request(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "ticket_id": ticket_id,
            "passenger_id": passenger_id,
            "amount_cents": 1500,
            "method": "card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "Confirmed");
    assert_eq!(payment["ticket_synced"], true);

    // The ticket is Paid now; a second charge conflicts.
    let (status, ticket) = request(&app, "GET", &format!("/tickets/{ticket_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["status"], "Paid");

    let (status, _) = request(
        &app,
        "POST",
        "/payments",
        Some(serde_json::json!({
            "ticket_id": ticket_id,
            "passenger_id": passenger_id,
            "amount_cents": 1500,
            "method": "card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Refund, then the payment list shows one refunded payment.
    let payment_id = payment["id"].as_str().unwrap();
    let (status, refunded) = request(
        &app,
        "POST",
        &format!("/payments/{payment_id}/refund"),
        Some(serde_json::json!({"reason": "passenger request"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "Refunded");

    let (_, list) = request(
        &app,
        "GET",
        &format!("/tickets/{ticket_id}/payments"),
        None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["status"], "Refunded");
}

#[tokio::test]
async fn test_validate_ticket() {
    let app = setup();
    let (_, ticket) = request(
        &app,
        "POST",
        "/tickets",
        Some(serde_json::json!({
            "passenger_id": uuid::Uuid::new_v4().to_string(),
            "kind": "multi-ride",
            "rides": 2
        })),
    )
    .await;
    let ticket_id = ticket["id"].as_str().unwrap().to_string();

    let (status, validated) = request(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/validate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(validated["remaining_rides"], 1);
    assert_eq!(validated["status"], "Paid");

    let (_, validated) = request(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/validate"),
        None,
    )
    .await;
    assert_eq!(validated["remaining_rides"], 0);
    assert_eq!(validated["status"], "Validated");

    let (status, _) = request(
        &app,
        "POST",
        &format!("/tickets/{ticket_id}/validate"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_notification_send_read_and_inbox() {
    let app = setup();
    let passenger_id = uuid::Uuid::new_v4().to_string();

    let (status, notification) = request(
        &app,
        "POST",
        "/notifications",
        Some(serde_json::json!({
            "recipient": passenger_id,
            "category": "schedule-update",
            "title": "Platform change",
            "body": "Line 4 departs from platform 2 today."
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(notification["status"], "Sent");

    let id = notification["id"].as_str().unwrap();
    let (status, read) = request(
        &app,
        "POST",
        &format!("/notifications/{id}/read"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["status"], "Read");

    let (_, inbox) = request(
        &app,
        "GET",
        &format!("/passengers/{passenger_id}/notifications"),
        None,
    )
    .await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);

    // Broadcasts show up in any passenger's inbox.
    request(
        &app,
        "POST",
        "/notifications",
        Some(serde_json::json!({
            "recipient": "all",
            "category": "service-disruption",
            "title": "Network alert",
            "body": "Severe weather delays across the network."
        })),
    )
    .await;
    let (_, inbox) = request(
        &app,
        "GET",
        &format!("/passengers/{}/notifications", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["recipient"], "all");
}

#[tokio::test]
async fn test_trip_seats_decrement_through_the_choreography() {
    let test_app = setup_with_workers();
    let app = &test_app.app;

    let (status, trip) = request(
        app,
        "POST",
        "/trips",
        Some(serde_json::json!({"total_seats": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let trip_id = trip["trip_id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, _) = request(
            app,
            "POST",
            "/tickets",
            Some(serde_json::json!({
                "passenger_id": uuid::Uuid::new_v4().to_string(),
                "kind": "single-ride",
                "trip_id": trip_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    tokio::time::sleep(Duration::from_millis(80)).await;

    let (status, seats) = request(app, "GET", &format!("/trips/{trip_id}/seats"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seats["available_seats"], 4);

    let _ = test_app.shutdown.send(true);
}

#[tokio::test]
async fn test_trip_zero_seats_rejected() {
    let app = setup();
    let (status, _) = request(
        &app,
        "POST",
        "/trips",
        Some(serde_json::json!({"total_seats": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_trip_seats_not_found() {
    let app = setup();
    let (status, _) = request(
        &app,
        "GET",
        &format!("/trips/{}/seats", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
