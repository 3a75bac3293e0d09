use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::Value;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::{codes, AppError, FieldError};
use shared_models::response;

use crate::models::{
    AppointmentError, CreateAppointmentRequest, DoctorListQuery, ListQueryParams, StatisticsQuery,
    UpdateStatusRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::query::AppointmentQueryService;

// ==============================================================================
// QUERY & REPORTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    WithRejection(Query(params), _): WithRejection<Query<ListQueryParams>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let query_service = AppointmentQueryService::new(&state);

    let page = query_service
        .list(&params, auth.token())
        .await
        .map_err(map_query_error)?;

    Ok(response::ok(page))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, AppError>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .get(appointment_id, auth.token())
        .await
        .map_err(map_query_error)?;

    Ok(response::ok(appointment))
}

#[axum::debug_handler]
pub async fn appointments_by_doctor(
    State(state): State<Arc<AppConfig>>,
    WithRejection(Path(doctor_id), _): WithRejection<Path<Uuid>, AppError>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    WithRejection(Query(filters), _): WithRejection<Query<DoctorListQuery>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let query_service = AppointmentQueryService::new(&state);

    let appointments = query_service
        .by_doctor(doctor_id, &filters, auth.token())
        .await
        .map_err(map_query_error)?;

    Ok(response::ok(appointments))
}

#[axum::debug_handler]
pub async fn monthly_statistics(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    WithRejection(Query(query), _): WithRejection<Query<StatisticsQuery>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let query_service = AppointmentQueryService::new(&state);

    let histogram = query_service
        .monthly_statistics(query.year, auth.token())
        .await
        .map_err(map_query_error)?;

    Ok(response::ok(histogram))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): WithRejection<Json<CreateAppointmentRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor_id = parse_actor_id(&user)?;

    // Booking for someone else requires a privileged role.
    if let Some(patient_id) = request.patient_id {
        let is_self = patient_id == actor_id;
        if !is_self && !user.is_admin() && !user.is_doctor() {
            return Err(AppError::Forbidden(
                "Not authorized to book an appointment for this patient".to_string(),
            ));
        }
    }

    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .create(actor_id, request, auth.token())
        .await
        .map_err(map_create_error)?;

    Ok(response::created(
        "Appointment created successfully",
        appointment,
    ))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, AppError>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateStatusRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Approving or rejecting is reserved for privileged roles.
    if !user.is_admin() && !user.is_doctor() {
        return Err(AppError::Forbidden(
            "Not authorized to update appointment status".to_string(),
        ));
    }

    let lifecycle = AppointmentLifecycleService::new(&state);

    let appointment = lifecycle
        .update_status(appointment_id, request.status.as_deref(), auth.token())
        .await
        .map_err(map_status_error)?;

    Ok(response::success(
        StatusCode::OK,
        "Appointment status updated successfully",
        appointment,
    ))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn parse_actor_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Authenticated subject is not a valid user id".to_string()))
}

fn map_create_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Validation(errors) => AppError::validation("Validation error", errors),
        AppointmentError::DoctorNotFound => AppError::eligibility(
            "Doctor not found",
            vec![FieldError::coded(codes::REFERENCE_NOT_FOUND, "doctor_id")],
        ),
        AppointmentError::ClinicNotFound => AppError::eligibility(
            "Clinic not found",
            vec![FieldError::coded(codes::REFERENCE_NOT_FOUND, "clinic_id")],
        ),
        AppointmentError::DoctorNotAtClinic => AppError::eligibility(
            "Doctor does not practice at this clinic",
            vec![FieldError::with_message(
                codes::UNSPECIFIED,
                "doctor_id",
                "The doctor is not a member of the requested clinic.",
            )],
        ),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        other => AppError::Internal(other.to_string()),
    }
}

fn map_status_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Validation(errors) => AppError::validation("Validation error", errors),
        AppointmentError::InvalidStatus(value) => AppError::validation(
            "Validation error",
            vec![FieldError::with_message(
                codes::UNSPECIFIED,
                "status",
                format!("'{}' is not an allowed status value", value),
            )],
        ),
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        other => AppError::Internal(other.to_string()),
    }
}

fn map_query_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::Validation(errors) => AppError::validation("Validation error", errors),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        other => AppError::Internal(other.to_string()),
    }
}
