use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dentist_cell::models::DentistError;
use dentist_cell::services::availability::AvailabilityService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn availability_service_for(mock_server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    AvailabilityService::new(&config)
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[tokio::test]
async fn missing_window_means_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = availability_service_for(&mock_server);
    let available = service
        .is_dentist_available(Uuid::new_v4(), date("2025-12-25"), "test-token")
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn explicitly_closed_window_means_unavailable() {
    let mock_server = MockServer::start().await;
    let dentist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_window_response(
                &dentist_id.to_string(),
                "2026-09-14",
                false,
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = availability_service_for(&mock_server);
    let available = service
        .is_dentist_available(dentist_id, date("2026-09-14"), "test-token")
        .await
        .unwrap();

    assert!(!available);
}

#[tokio::test]
async fn open_window_means_available() {
    let mock_server = MockServer::start().await;
    let dentist_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("dentist_id", format!("eq.{}", dentist_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_window_response(
                &dentist_id.to_string(),
                "2026-09-14",
                true,
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = availability_service_for(&mock_server);
    let available = service
        .is_dentist_available(dentist_id, date("2026-09-14"), "test-token")
        .await
        .unwrap();

    assert!(available);
}

#[tokio::test]
async fn available_dates_stay_inside_the_horizon() {
    let mock_server = MockServer::start().await;
    let dentist_id = Uuid::new_v4();
    let today = chrono::Local::now().date_naive();

    let near = today + Duration::days(10);
    let beyond = today + Duration::days(120);

    // The store hands back a row past the horizon; it must not be offered.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_windows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_window_response(
                &dentist_id.to_string(),
                &near.to_string(),
                true,
            ),
            MockSupabaseResponses::availability_window_response(
                &dentist_id.to_string(),
                &beyond.to_string(),
                true,
            ),
        ])))
        .mount(&mock_server)
        .await;

    let service = availability_service_for(&mock_server);
    let dates = service
        .available_dates(
            dentist_id,
            today - Duration::days(5),
            today + Duration::days(200),
            today,
            "test-token",
        )
        .await
        .unwrap();

    assert!(dates.contains(&near));
    assert!(!dates.contains(&beyond));
}

#[tokio::test]
async fn ranges_entirely_in_the_past_are_empty() {
    let mock_server = MockServer::start().await;
    let today = chrono::Local::now().date_naive();

    // No mock mounted: an empty clamp must not hit the store at all.
    let service = availability_service_for(&mock_server);
    let dates = service
        .available_dates(
            Uuid::new_v4(),
            today - Duration::days(30),
            today - Duration::days(1),
            today,
            "test-token",
        )
        .await
        .unwrap();

    assert!(dates.is_empty());
}

#[tokio::test]
async fn unknown_dentist_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/dentists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = availability_service_for(&mock_server);
    let result = service.get_dentist(Uuid::new_v4(), "test-token").await;

    assert_matches!(result, Err(DentistError::NotFound));
}
