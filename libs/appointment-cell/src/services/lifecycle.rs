use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use directory_cell::DirectoryService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::error::{codes, FieldError};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookingPolicy, CreateAppointmentRequest,
};
use crate::services::eligibility::EligibilityService;
use crate::services::query::expanded_select;

/// The appointment state machine: creates appointments in `pending` and
/// stamps them `confirmed` or `cancelled` on request. Stateless between
/// calls; every operation re-reads from the store.
pub struct AppointmentLifecycleService {
    supabase: SupabaseClient,
    directory: DirectoryService,
    eligibility: EligibilityService,
    policy: BookingPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            directory: DirectoryService::new(config),
            eligibility: EligibilityService::new(config),
            policy: BookingPolicy::from_config(config),
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Book a new appointment on behalf of `actor_id` (the authenticated
    /// caller). Field violations are collected into a single validation
    /// error; eligibility failures surface separately so the handler can
    /// map them to their own status class. Nothing is persisted on any
    /// failure path.
    pub async fn create(
        &self,
        actor_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let mut errors: Vec<FieldError> = Vec::new();

        let appointment_time = match request.appointment_time.as_deref() {
            None => {
                errors.push(FieldError::with_message(
                    codes::UNSPECIFIED,
                    "appointment_time",
                    "The appointment time field is required.",
                ));
                None
            }
            Some(raw) => match parse_appointment_time(raw) {
                None => {
                    errors.push(FieldError::with_message(
                        codes::UNSPECIFIED,
                        "appointment_time",
                        "The appointment time must be a valid date.",
                    ));
                    None
                }
                // Strictly in the future; "now" itself is rejected.
                Some(time) if time <= now => {
                    errors.push(FieldError::coded(
                        codes::FUTURE_DATE_REQUIRED,
                        "appointment_time",
                    ));
                    None
                }
                Some(time) => Some(time),
            },
        };

        let doctor_id = request.doctor_id;
        if doctor_id.is_none() {
            errors.push(FieldError::with_message(
                codes::UNSPECIFIED,
                "doctor_id",
                "The doctor id field is required.",
            ));
        }

        let clinic_id = request.clinic_id;
        if clinic_id.is_none() {
            errors.push(FieldError::with_message(
                codes::UNSPECIFIED,
                "clinic_id",
                "The clinic id field is required.",
            ));
        }

        let patient_id = self
            .resolve_patient(actor_id, request.patient_id, auth_token, &mut errors)
            .await?;

        if !errors.is_empty() {
            return Err(AppointmentError::Validation(errors));
        }

        // All three are present once validation passed.
        let (doctor_id, clinic_id, appointment_time) = (
            doctor_id.unwrap_or_default(),
            clinic_id.unwrap_or_default(),
            appointment_time.unwrap_or(now),
        );

        if let Err(e) = self
            .eligibility
            .check(doctor_id, clinic_id, auth_token)
            .await
        {
            // In permissive mode a missing reference is plain field
            // validation, not an eligibility violation.
            let e = if !self.policy.enforce_doctor_clinic_membership {
                match e {
                    AppointmentError::DoctorNotFound => AppointmentError::Validation(vec![
                        FieldError::coded(codes::REFERENCE_NOT_FOUND, "doctor_id"),
                    ]),
                    AppointmentError::ClinicNotFound => AppointmentError::Validation(vec![
                        FieldError::coded(codes::REFERENCE_NOT_FOUND, "clinic_id"),
                    ]),
                    other => other,
                }
            } else {
                e
            };
            return Err(e);
        }

        let body = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "clinic_id": clinic_id,
            "reason": request.reason,
            "appointment_time": appointment_time.to_rfc3339(),
            "status": AppointmentStatus::Pending,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let created: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = created
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Insert returned no row".to_string()))?;

        info!(
            "Appointment {} created for patient {} with doctor {} at clinic {}",
            appointment.id, patient_id, doctor_id, clinic_id
        );
        Ok(appointment)
    }

    /// Stamp an appointment with one of the allowed terminal statuses.
    ///
    /// The transition is unconditional: the current status is not
    /// consulted, so a confirmed appointment can be re-stamped cancelled.
    /// Inherited permissive behavior, pinned by tests.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        raw_status: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let raw = raw_status.ok_or_else(|| {
            AppointmentError::Validation(vec![FieldError::with_message(
                codes::UNSPECIFIED,
                "status",
                "The status field is required.",
            )])
        })?;

        let status = AppointmentStatus::parse(raw)
            .filter(|s| self.policy.allowed_status_updates.contains(s))
            .ok_or_else(|| AppointmentError::InvalidStatus(raw.to_string()))?;

        // Existence check; the subsequent PATCH only touches status and
        // updated_at. No revalidation of time or eligibility.
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);
        let existing: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let current = existing.into_iter().next().ok_or(AppointmentError::NotFound)?;

        debug!(
            "Updating appointment {} status {} -> {}",
            appointment_id, current.status, status
        );

        let body = json!({
            "status": status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let patch_path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let updated: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &patch_path,
                Some(auth_token),
                Some(body),
                Some(headers),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        updated.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Single appointment with its patient (incl. dependents), doctor, and
    /// clinic summaries embedded.
    pub async fn get(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&{}&limit=1",
            appointment_id,
            expanded_select(false, false, false)
        );

        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn resolve_patient(
        &self,
        actor_id: Uuid,
        explicit: Option<Uuid>,
        auth_token: &str,
        errors: &mut Vec<FieldError>,
    ) -> Result<Uuid, AppointmentError> {
        match explicit {
            Some(patient_id) if self.policy.allow_explicit_patient_id => {
                if patient_id == actor_id {
                    return Ok(patient_id);
                }
                let user = self
                    .directory
                    .find_user(patient_id, auth_token)
                    .await
                    .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
                if user.is_none() {
                    warn!("Booking references unknown patient {}", patient_id);
                    errors.push(FieldError::coded(codes::REFERENCE_NOT_FOUND, "patient_id"));
                }
                Ok(patient_id)
            }
            // Explicit id ignored when the policy disallows it; the
            // requester books for themselves.
            _ => Ok(actor_id),
        }
    }
}

/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM:SS` form the original
/// API documented.
pub fn parse_appointment_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Some(time.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
