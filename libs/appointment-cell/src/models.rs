use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::FieldError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// Lifecycle states of an appointment. `pending` on creation; `confirmed`
/// and `cancelled` are the two terminal states. Older rows stored the
/// terminal confirmation as `completed`; that spelling deserializes to
/// `Confirmed` and is never written back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    #[serde(alias = "completed")]
    Confirmed,
    Cancelled,
}

impl AppointmentStatus {
    /// Parse a caller-supplied status value, accepting the legacy
    /// `completed` spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" | "completed" => Some(AppointmentStatus::Confirmed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    #[serde(default, alias = "dental_issue")]
    pub reason: Option<String>,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Related summaries, embedded by the store in expanded reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic: Option<ClinicSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

/// Patient summary carries the registered dependents as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub children: Vec<ChildSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSummary {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking request body. All reference fields are optional at the type level
/// so that a single response can enumerate every violated field; the
/// lifecycle service enforces required-ness. `appointment_time` stays a raw
/// string until validated (unparseable input is a field error, not a
/// deserialization failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
    pub reason: Option<String>,
    pub appointment_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    AppointmentTime,
    Status,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::AppointmentTime => "appointment_time",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filters for the appointment listing. All optional, AND-combined.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQueryParams {
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub clinic_name: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Filters for the per-doctor listing. Unpaginated, always sorted by
/// appointment time ascending.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    pub status: Option<AppointmentStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatisticsQuery {
    pub year: Option<i32>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl PageMeta {
    pub fn new(current_page: u32, per_page: u32, total: u64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            total.div_ceil(per_page as u64) as u32
        };
        Self {
            current_page,
            per_page,
            total,
            last_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: u32,
    pub count: u64,
}

// ==============================================================================
// BOOKING POLICY
// ==============================================================================

/// The workflow knobs that diverged across revisions of the original
/// controller, folded into one explicit configuration. Defaults to the
/// maximally strict variant.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub enforce_doctor_clinic_membership: bool,
    pub allow_explicit_patient_id: bool,
    pub allowed_status_updates: Vec<AppointmentStatus>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            enforce_doctor_clinic_membership: true,
            allow_explicit_patient_id: true,
            allowed_status_updates: vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
        }
    }
}

impl BookingPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enforce_doctor_clinic_membership: config.strict_eligibility,
            allow_explicit_patient_id: config.allow_explicit_patient_id,
            ..Self::default()
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Doctor does not practice at this clinic")]
    DoctorNotAtClinic,

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    #[error("Validation error")]
    Validation(Vec<FieldError>),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
