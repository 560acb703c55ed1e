use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Local, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::scheduling_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn test_app(config: &TestConfig) -> Router {
    scheduling_routes(config.to_arc())
}

fn future_date(days: i64) -> NaiveDate {
    Local::now().date_naive() + Duration::days(days)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_booking_mocks(mock_server: &MockServer, patient_id: &str, date: &str) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::scheduling_lock_response(&format!("date_{}", date), 30)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/scheduling_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_intervals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                patient_id,
                None,
                None,
                date,
                "10:00:00",
                "confirmed",
            )
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let config = TestConfig::default();
    let app = test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/slots?date={}", future_date(7)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn slot_listing_returns_the_service_grid() {
    let config = TestConfig::default();
    let app = test_app(&config);
    let staff = TestUser::staff("frontdesk@pearldental.example");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/slots?date={}", future_date(7)))
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&staff, &config.jwt_secret),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 20);
    assert_eq!(slots[0]["value"], "10:00:00");
    assert_eq!(slots[0]["display_label"], "10:00 AM");
}

#[tokio::test]
async fn staff_can_book_through_the_api() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let app = test_app(&config);

    let staff = TestUser::staff("frontdesk@pearldental.example");
    let patient_id = Uuid::new_v4();
    let date = future_date(7);

    mount_booking_mocks(&mock_server, &patient_id.to_string(), &date.to_string()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&staff, &config.jwt_secret),
                )
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "patient_id": patient_id,
                        "dentist_id": null,
                        "service_id": null,
                        "date": date.to_string(),
                        "time": "10:00:00",
                        "notes": "first visit"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["appointment"]["status"], "confirmed");
}

#[tokio::test]
async fn patients_cannot_book_for_someone_else() {
    let config = TestConfig::default();
    let app = test_app(&config);

    let patient = TestUser::patient("patient@example.com");
    let other_patient = Uuid::new_v4();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&patient, &config.jwt_secret),
                )
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "patient_id": other_patient,
                        "dentist_id": null,
                        "service_id": null,
                        "date": future_date(7).to_string(),
                        "time": "10:00:00",
                        "notes": null
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn off_grid_bookings_are_rejected_with_bad_request() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let app = test_app(&config);

    let staff = TestUser::staff("frontdesk@pearldental.example");
    let patient_id = Uuid::new_v4();
    let date = future_date(7);

    mount_booking_mocks(&mock_server, &patient_id.to_string(), &date.to_string()).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&staff, &config.jwt_secret),
                )
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "patient_id": patient_id,
                        "dentist_id": null,
                        "service_id": null,
                        "date": date.to_string(),
                        "time": "10:17:00",
                        "notes": null
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_transitions_are_rejected_with_bad_request() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let app = test_app(&config);

    let staff = TestUser::staff("frontdesk@pearldental.example");
    let appointment_id = Uuid::new_v4();

    let mut completed = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        None,
        None,
        &future_date(0).to_string(),
        "10:00:00",
        "completed",
    );
    completed["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&mock_server)
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/{}/transition", appointment_id))
                .header(
                    "Authorization",
                    JwtTestUtils::auth_header(&staff, &config.jwt_secret),
                )
                .header("content-type", "application/json")
                .body(Body::from(json!({"action": "approve"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
