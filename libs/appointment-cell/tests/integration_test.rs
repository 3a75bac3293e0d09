use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockDirectoryResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    appointment_routes(Arc::new(config))
}

fn bearer(user: &TestUser, config: &TestConfig) -> String {
    format!(
        "Bearer {}",
        JwtTestUtils::create_test_token(user, &config.jwt_secret, None)
    )
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    let request = match body {
        Some(value) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Mounts directory lookups for an eligible doctor/clinic pair.
async fn mount_eligible_pair(mock_server: &MockServer, doctor_id: Uuid, clinic_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(query_param("role", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::user_row(&doctor_id.to_string(), "Dr. Test", "doctor")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::clinic_row(&clinic_id.to_string(), "Fune")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_clinic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::membership_row(&doctor_id.to_string(), &clinic_id.to_string())
        ])))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// CREATION
// ==============================================================================

#[tokio::test]
async fn create_appointment_starts_pending() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_eligible_pair(&mock_server, doctor_id, clinic_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockDirectoryResponses::appointment_row(
                &patient.id,
                &doctor_id.to_string(),
                &clinic_id.to_string(),
                "2030-01-11T08:45:26Z",
                "pending",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "reason": "dental issue",
            "appointment_time": "2030-01-11 08:45:26",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["code"], 201);
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn create_appointment_rejects_past_time_with_specific_code() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    // Validation fails before any store call; nothing may be persisted.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({
            "doctor_id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "appointment_time": "2020-01-11 08:45:26",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["errors"],
        json!([{"code": "E003", "field": "appointment_time"}])
    );
}

#[tokio::test]
async fn create_appointment_enumerates_every_violated_field() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = body["errors"].as_array().unwrap();
    let fields: Vec<&str> = errors.iter().map(|e| e["field"].as_str().unwrap()).collect();
    assert!(fields.contains(&"appointment_time"));
    assert!(fields.contains(&"doctor_id"));
    assert!(fields.contains(&"clinic_id"));
}

#[tokio::test]
async fn create_appointment_rejects_doctor_outside_clinic() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::user_row(&doctor_id.to_string(), "Dr. Test", "doctor")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::clinic_row(&clinic_id.to_string(), "Fune")
        ])))
        .mount(&mock_server)
        .await;
    // No membership row links the two.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_clinic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "appointment_time": "2030-01-11 08:45:26",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["errors"][0]["field"], "doctor_id");
}

#[tokio::test]
async fn permissive_mode_reports_missing_doctor_as_field_error() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::permissive(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({
            "doctor_id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "appointment_time": "2030-01-11 08:45:26",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["errors"],
        json!([{"code": "E004", "field": "doctor_id"}])
    );
}

#[tokio::test]
async fn patient_cannot_book_for_someone_else() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, _) = send(
        app,
        "POST",
        "/",
        Some(&bearer(&patient, &config)),
        Some(json!({
            "patient_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "clinic_id": Uuid::new_v4(),
            "appointment_time": "2030-01-11 08:45:26",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ==============================================================================
// STATUS UPDATES
// ==============================================================================

async fn mount_status_update(mock_server: &MockServer, current: &str, updated: &str) -> Uuid {
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let clinic_id = Uuid::new_v4().to_string();

    let mut current_row = MockDirectoryResponses::appointment_row(
        &patient_id,
        &doctor_id,
        &clinic_id,
        "2030-01-11T08:45:26Z",
        current,
    );
    current_row["id"] = json!(appointment_id);
    let mut updated_row = current_row.clone();
    updated_row["status"] = json!(updated);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([current_row])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated_row])))
        .mount(mock_server)
        .await;

    appointment_id
}

#[tokio::test]
async fn admin_confirms_pending_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");

    let appointment_id = mount_status_update(&mock_server, "pending", "confirmed").await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "PATCH",
        &format!("/{}/status", appointment_id),
        Some(&bearer(&admin, &config)),
        Some(json!({"status": "confirmed"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
}

#[tokio::test]
async fn confirmed_appointment_can_still_be_cancelled() {
    // Transitions are unconditional: the current status is never checked,
    // so a terminal appointment is re-stamped without complaint. This pins
    // the inherited permissive behavior.
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");

    let appointment_id = mount_status_update(&mock_server, "confirmed", "cancelled").await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "PATCH",
        &format!("/{}/status", appointment_id),
        Some(&bearer(&admin, &config)),
        Some(json!({"status": "cancelled"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
}

#[tokio::test]
async fn update_status_rejects_unknown_value() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "PATCH",
        &format!("/{}/status", Uuid::new_v4()),
        Some(&bearer(&admin, &config)),
        Some(json!({"status": "no_show"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "status");
}

#[tokio::test]
async fn update_status_rejects_pending_as_target() {
    // "pending" parses but is not an allowed update target.
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, _) = send(
        app,
        "PATCH",
        &format!("/{}/status", Uuid::new_v4()),
        Some(&bearer(&admin, &config)),
        Some(json!({"status": "pending"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn update_status_on_missing_appointment_is_404() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "PATCH",
        &format!("/{}/status", Uuid::new_v4()),
        Some(&bearer(&admin, &config)),
        Some(json!({"status": "confirmed"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn patient_cannot_update_status() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, _) = send(
        app,
        "PATCH",
        &format!("/{}/status", Uuid::new_v4()),
        Some(&bearer(&patient, &config)),
        Some(json!({"status": "confirmed"})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ==============================================================================
// LISTINGS & STATISTICS
// ==============================================================================

#[tokio::test]
async fn list_appointments_defaults_to_page_size_ten() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "0"))
        .and(query_param("order", "appointment_time.asc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .append_header("Content-Range", "*/0"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(app, "GET", "/", Some(&bearer(&patient, &config)), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meta"]["per_page"], 10);
    assert_eq!(body["data"]["meta"]["total"], 0);
    assert_eq!(body["data"]["meta"]["last_page"], 1);
}

#[tokio::test]
async fn last_page_of_twenty_five_rows_has_five_items() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    let rows: Vec<Value> = (0..5)
        .map(|_| {
            MockDirectoryResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "2030-01-11T08:45:26Z",
                "pending",
            )
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", "20"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(rows))
                .append_header("Content-Range", "20-24/25"),
        )
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        "/?page=3",
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["meta"]["total"], 25);
    assert_eq!(body["data"]["meta"]["last_page"], 3);
    assert_eq!(body["data"]["meta"]["current_page"], 3);
}

#[tokio::test]
async fn extreme_page_number_still_gets_an_envelope() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("limit", "10"))
        .and(query_param("offset", &((u32::MAX as u64 - 1) * 10).to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .append_header("Content-Range", "*/0"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        &format!("/?page={}", u32::MAX),
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["meta"]["current_page"], u32::MAX);
}

#[tokio::test]
async fn appointments_by_doctor_404_for_non_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    // Role-filtered lookup finds nothing for this id.
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        &format!("/doctor/{}", Uuid::new_v4()),
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Doctor not found");
}

#[tokio::test]
async fn appointments_by_doctor_returns_full_set() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .and(query_param("role", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::user_row(&doctor_id.to_string(), "Dr. Test", "doctor")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("order", "appointment_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDirectoryResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2030-01-11T08:45:26Z",
                "pending",
            ),
            MockDirectoryResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                "2030-02-11T08:45:26Z",
                "confirmed",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        &format!("/doctor/{}", doctor_id),
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn statistics_zero_fill_all_twelve_months() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "appointment_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        "/statistics?year=2025",
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let months = body["data"].as_array().unwrap();
    assert_eq!(months.len(), 12);
    for (i, entry) in months.iter().enumerate() {
        assert_eq!(entry["month"], (i + 1) as u64);
        assert_eq!(entry["count"], 0);
    }
}

#[tokio::test]
async fn statistics_count_by_calendar_month() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "appointment_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"appointment_time": "2025-03-01T09:00:00Z"},
            {"appointment_time": "2025-03-14T09:00:00Z"},
            {"appointment_time": "2025-03-30T09:00:00Z"},
            {"appointment_time": "2025-12-24T09:00:00Z"},
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        "/statistics?year=2025",
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let months = body["data"].as_array().unwrap();
    assert_eq!(months[2], json!({"month": 3, "count": 3}));
    assert_eq!(months[11], json!({"month": 12, "count": 1}));
    let total: u64 = months.iter().map(|e| e["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 4);
}

#[tokio::test]
async fn show_returns_404_when_absent() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        &format!("/{}", Uuid::new_v4()),
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Appointment not found");
}

// ==============================================================================
// AUTHENTICATION
// ==============================================================================

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let config = TestConfig::default();
    let app = create_test_app(config.to_app_config());

    let (status, _) = send(app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ==============================================================================
// MALFORMED INPUT
// ==============================================================================

#[tokio::test]
async fn malformed_json_body_gets_an_error_envelope() {
    let config = TestConfig::default();
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", bearer(&patient, &config))
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn non_uuid_path_id_gets_an_error_envelope() {
    let config = TestConfig::default();
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        "/not-a-uuid",
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn unknown_status_filter_gets_an_error_envelope() {
    let config = TestConfig::default();
    let patient = TestUser::patient("patient@example.com");

    let app = create_test_app(config.to_app_config());
    let (status, body) = send(
        app,
        "GET",
        "/?status=bogus",
        Some(&bearer(&patient, &config)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn requests_with_bad_signature_are_rejected() {
    let config = TestConfig::default();
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_invalid_signature_token(&patient);

    let app = create_test_app(config.to_app_config());
    let (status, _) = send(
        app,
        "GET",
        "/",
        Some(&format!("Bearer {}", token)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
