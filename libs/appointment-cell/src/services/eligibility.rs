use tracing::{debug, warn};
use uuid::Uuid;

use directory_cell::{DirectoryService, Role};
use shared_config::AppConfig;

use crate::models::AppointmentError;

/// Validates that a booking's doctor and clinic references are usable.
///
/// Strict mode (the default): the doctor must exist with the doctor role,
/// the clinic must exist, and a doctor_clinic membership row must link
/// them. Permissive mode only checks that both rows exist.
pub struct EligibilityService {
    directory: DirectoryService,
    enforce_membership: bool,
}

impl EligibilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            directory: DirectoryService::new(config),
            enforce_membership: config.strict_eligibility,
        }
    }

    pub fn with_directory(directory: DirectoryService, enforce_membership: bool) -> Self {
        Self {
            directory,
            enforce_membership,
        }
    }

    /// Read-only check; no side effects on any store.
    pub async fn check(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Checking eligibility of doctor {} at clinic {} (strict: {})",
            doctor_id, clinic_id, self.enforce_membership
        );

        let doctor = if self.enforce_membership {
            self.directory
                .find_user_by_role(doctor_id, Role::Doctor, auth_token)
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        } else {
            // Permissive mode mirrors plain referential validation: any
            // existing user satisfies the doctor reference.
            self.directory
                .find_user(doctor_id, auth_token)
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        };

        if doctor.is_none() {
            warn!("Doctor {} not found or not doctor-classified", doctor_id);
            return Err(AppointmentError::DoctorNotFound);
        }

        let clinic = self
            .directory
            .find_clinic(clinic_id, auth_token)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if clinic.is_none() {
            warn!("Clinic {} not found", clinic_id);
            return Err(AppointmentError::ClinicNotFound);
        }

        if self.enforce_membership {
            let is_member = self
                .directory
                .is_doctor_at_clinic(doctor_id, clinic_id, auth_token)
                .await
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

            if !is_member {
                warn!("Doctor {} is not a member of clinic {}", doctor_id, clinic_id);
                return Err(AppointmentError::DoctorNotAtClinic);
            }
        }

        Ok(())
    }
}
