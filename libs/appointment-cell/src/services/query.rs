use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use directory_cell::{DirectoryService, Role};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, DoctorListQuery, ListQueryParams, MonthlyCount, Page, PageMeta,
    SortField, SortOrder, DEFAULT_PAGE_SIZE,
};

/// Builds filtered, sorted, paginated views over the appointment store,
/// plus the per-doctor listing and the monthly histogram.
pub struct AppointmentQueryService {
    supabase: SupabaseClient,
    directory: DirectoryService,
}

impl AppointmentQueryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            directory: DirectoryService::new(config),
        }
    }

    pub async fn list(
        &self,
        params: &ListQueryParams,
        auth_token: &str,
    ) -> Result<Page<Appointment>, AppointmentError> {
        let query = build_list_query(params);
        let path = format!("/rest/v1/appointments?{}", query);
        debug!("Listing appointments: {}", path);

        let (rows, total): (Vec<Appointment>, u64) = self
            .supabase
            .request_paged(&path, Some(auth_token))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let page = params.page.unwrap_or(1).max(1);
        let per_page = params.per_page.unwrap_or(DEFAULT_PAGE_SIZE).max(1);

        Ok(Page {
            data: rows,
            meta: PageMeta::new(page, per_page, total),
        })
    }

    /// Full (unpaginated) listing for one doctor, appointment time
    /// ascending. Fails with DoctorNotFound unless the id resolves to a
    /// doctor-classified user.
    pub async fn by_doctor(
        &self,
        doctor_id: Uuid,
        filters: &DoctorListQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor = self
            .directory
            .find_user_by_role(doctor_id, Role::Doctor, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if doctor.is_none() {
            return Err(AppointmentError::DoctorNotFound);
        }

        let query = build_doctor_query(doctor_id, filters);
        let path = format!("/rest/v1/appointments?{}", query);
        debug!("Listing appointments for doctor {}: {}", doctor_id, path);

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }

    /// Appointment counts per calendar month of the given year (defaults
    /// to the current year). Always exactly 12 entries, zero-filled.
    pub async fn monthly_statistics(
        &self,
        year: Option<i32>,
        auth_token: &str,
    ) -> Result<Vec<MonthlyCount>, AppointmentError> {
        let year = year.unwrap_or_else(|| Utc::now().year());

        let path = format!(
            "/rest/v1/appointments?select=appointment_time\
             &appointment_time=gte.{}-01-01T00:00:00Z\
             &appointment_time=lt.{}-01-01T00:00:00Z",
            year,
            year + 1
        );
        debug!("Computing monthly statistics for {}", year);

        #[derive(Deserialize)]
        struct TimeRow {
            appointment_time: DateTime<Utc>,
        }

        let rows: Vec<TimeRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let times: Vec<DateTime<Utc>> = rows.into_iter().map(|r| r.appointment_time).collect();
        Ok(monthly_histogram(&times, year))
    }
}

/// PostgREST select clause embedding patient (with dependents), doctor, and
/// clinic summaries in the same request. `!inner` is added per embed when a
/// filter applies to it, so the filter narrows the parent rows.
pub(crate) fn expanded_select(
    patient_inner: bool,
    doctor_inner: bool,
    clinic_inner: bool,
) -> String {
    let inner = |flag: bool| if flag { "!inner" } else { "" };
    format!(
        "select=*,\
         patient:users!appointments_patient_id_fkey{}(id,name,role,children(id,user_id,name,dob,gender)),\
         doctor:users!appointments_doctor_id_fkey{}(id,name,role),\
         clinic:clinics{}(id,name,address)",
        inner(patient_inner),
        inner(doctor_inner),
        inner(clinic_inner)
    )
}

fn format_utc(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Translate listing filters into a PostgREST query string. Pure; unit
/// tested separately from the HTTP layer.
pub fn build_list_query(params: &ListQueryParams) -> String {
    let mut parts = vec![expanded_select(
        params.patient_name.is_some(),
        params.doctor_name.is_some(),
        params.clinic_name.is_some(),
    )];

    if let Some(patient_id) = params.patient_id {
        parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(name) = &params.patient_name {
        parts.push(format!("patient.name=ilike.*{}*", urlencoding::encode(name)));
    }
    if let Some(name) = &params.doctor_name {
        parts.push(format!("doctor.name=ilike.*{}*", urlencoding::encode(name)));
    }
    if let Some(clinic_id) = params.clinic_id {
        parts.push(format!("clinic_id=eq.{}", clinic_id));
    }
    if let Some(name) = &params.clinic_name {
        parts.push(format!("clinic.name=ilike.*{}*", urlencoding::encode(name)));
    }
    if let Some(status) = params.status {
        parts.push(format!("status=eq.{}", status));
    }
    if let Some(start) = params.start_time {
        parts.push(format!("appointment_time=gte.{}", format_utc(start)));
    }
    if let Some(end) = params.end_time {
        parts.push(format!("appointment_time=lte.{}", format_utc(end)));
    }
    // Creation-date range: open ends snap to calendar day boundaries. The
    // upper bound is exclusive on the next day; stored timestamps carry
    // microseconds, so 23:59:59 would drop the final second of the day.
    if let Some(from) = params.created_from {
        parts.push(format!("created_at=gte.{}T00:00:00Z", from));
    }
    if let Some(next) = params.created_to.and_then(|to| to.succ_opt()) {
        parts.push(format!("created_at=lt.{}T00:00:00Z", next));
    }

    let sort_field = params.sort_by.unwrap_or(SortField::AppointmentTime);
    let sort_order = params.sort_order.unwrap_or(SortOrder::Asc);
    parts.push(format!("order={}.{}", sort_field.column(), sort_order.as_str()));

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    parts.push(format!("limit={}", per_page));
    // Widen before multiplying; page and per_page are caller-supplied and
    // their u32 product can overflow.
    parts.push(format!(
        "offset={}",
        (page as u64 - 1) * per_page as u64
    ));

    parts.join("&")
}

fn build_doctor_query(doctor_id: Uuid, filters: &DoctorListQuery) -> String {
    let mut parts = vec![
        expanded_select(false, false, false),
        format!("doctor_id=eq.{}", doctor_id),
    ];

    if let Some(status) = filters.status {
        parts.push(format!("status=eq.{}", status));
    }
    if let Some(start) = filters.start_time {
        parts.push(format!("appointment_time=gte.{}", format_utc(start)));
    }
    if let Some(end) = filters.end_time {
        parts.push(format!("appointment_time=lte.{}", format_utc(end)));
    }

    parts.push("order=appointment_time.asc".to_string());
    parts.join("&")
}

/// Group scheduled times of one calendar year into 12 month buckets.
/// Months without appointments are present with a zero count.
pub fn monthly_histogram(times: &[DateTime<Utc>], year: i32) -> Vec<MonthlyCount> {
    let mut counts = [0u64; 12];
    for time in times {
        if time.year() == year {
            counts[time.month0() as usize] += 1;
        }
    }

    (1..=12)
        .map(|month| MonthlyCount {
            month,
            count: counts[(month - 1) as usize],
        })
        .collect()
}
