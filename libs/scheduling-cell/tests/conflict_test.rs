use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::services::conflict::ConflictDetectionService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn conflict_service_for(mock_server: &MockServer) -> ConflictDetectionService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    ConflictDetectionService::new(Arc::new(SupabaseClient::new(&config)))
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).unwrap()
}

async fn mount_appointments(mock_server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mount_blocked(mock_server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_intervals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mount_services(mock_server: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn empty_day_has_no_conflict() {
    let mock_server = MockServer::start().await;
    mount_appointments(&mock_server, json!([])).await;
    mount_blocked(&mock_server, json!([])).await;

    let service = conflict_service_for(&mock_server);
    let conflict = service
        .has_conflict(date("2026-09-14"), time(14, 0), 30, None, "test-token")
        .await
        .unwrap();

    assert!(!conflict);
}

#[tokio::test]
async fn overlapping_booking_conflicts() {
    let mock_server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let sid = service_id.to_string();

    // Existing confirmed appointment 14:00-14:30.
    mount_appointments(
        &mock_server,
        json!([MockSupabaseResponses::appointment_response(
            &Uuid::new_v4().to_string(),
            None,
            Some(sid.as_str()),
            "2026-09-14",
            "14:00:00",
            "confirmed",
        )]),
    )
    .await;
    mount_services(
        &mock_server,
        json!([MockSupabaseResponses::service_response(
            &service_id.to_string(),
            "Cleaning",
            30
        )]),
    )
    .await;
    mount_blocked(&mock_server, json!([])).await;

    let service = conflict_service_for(&mock_server);

    // 14:15-14:45 straddles the existing booking.
    let conflict = service
        .has_conflict(date("2026-09-14"), time(14, 15), 30, None, "test-token")
        .await
        .unwrap();

    assert!(conflict);
}

#[tokio::test]
async fn back_to_back_bookings_are_legal() {
    let mock_server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let sid = service_id.to_string();

    mount_appointments(
        &mock_server,
        json!([MockSupabaseResponses::appointment_response(
            &Uuid::new_v4().to_string(),
            None,
            Some(sid.as_str()),
            "2026-09-14",
            "14:00:00",
            "confirmed",
        )]),
    )
    .await;
    mount_services(
        &mock_server,
        json!([MockSupabaseResponses::service_response(
            &service_id.to_string(),
            "Cleaning",
            30
        )]),
    )
    .await;
    mount_blocked(&mock_server, json!([])).await;

    let service = conflict_service_for(&mock_server);

    // Starts exactly when the other ends.
    let trailing = service
        .has_conflict(date("2026-09-14"), time(14, 30), 30, None, "test-token")
        .await
        .unwrap();
    // Ends exactly when the other starts.
    let leading = service
        .has_conflict(date("2026-09-14"), time(13, 30), 30, None, "test-token")
        .await
        .unwrap();

    assert!(!trailing);
    assert!(!leading);
}

#[tokio::test]
async fn unassigned_service_falls_back_to_default_duration() {
    let mock_server = MockServer::start().await;

    // Existing appointment with no service row: assumed to run 30 minutes.
    mount_appointments(
        &mock_server,
        json!([MockSupabaseResponses::appointment_response(
            &Uuid::new_v4().to_string(),
            None,
            None,
            "2026-09-14",
            "14:00:00",
            "pending",
        )]),
    )
    .await;
    mount_blocked(&mock_server, json!([])).await;

    let service = conflict_service_for(&mock_server);

    let inside_window = service
        .has_conflict(date("2026-09-14"), time(14, 25), 30, None, "test-token")
        .await
        .unwrap();
    let after_window = service
        .has_conflict(date("2026-09-14"), time(14, 30), 30, None, "test-token")
        .await
        .unwrap();

    assert!(inside_window);
    assert!(!after_window);
}

#[tokio::test]
async fn blocked_intervals_conflict_for_everyone() {
    let mock_server = MockServer::start().await;

    mount_appointments(&mock_server, json!([])).await;
    mount_blocked(
        &mock_server,
        json!([MockSupabaseResponses::blocked_interval_response(
            "2026-09-14",
            "12:00:00",
            "13:00:00",
            "Staff meeting",
        )]),
    )
    .await;

    let service = conflict_service_for(&mock_server);

    let overlapping = service
        .has_conflict(date("2026-09-14"), time(12, 30), 30, None, "test-token")
        .await
        .unwrap();
    let adjacent = service
        .has_conflict(date("2026-09-14"), time(13, 0), 30, None, "test-token")
        .await
        .unwrap();

    assert!(overlapping);
    assert!(!adjacent);
}
