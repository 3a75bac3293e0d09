use anyhow::Result;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Child, Clinic, DirectoryUser, Role};

/// Read-only interface over the Identity Directory: users with their role
/// classification, clinics, and doctor-clinic membership.
pub struct DirectoryService {
    supabase: SupabaseClient,
}

impl DirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn find_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<DirectoryUser>> {
        debug!("Looking up user {}", user_id);

        let path = format!("/rest/v1/users?id=eq.{}&limit=1", user_id);
        let result: Vec<DirectoryUser> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(result.into_iter().next())
    }

    pub async fn find_user_by_role(
        &self,
        user_id: Uuid,
        role: Role,
        auth_token: &str,
    ) -> Result<Option<DirectoryUser>> {
        debug!("Looking up user {} with role {}", user_id, role);

        let path = format!("/rest/v1/users?id=eq.{}&role=eq.{}&limit=1", user_id, role);
        let result: Vec<DirectoryUser> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(result.into_iter().next())
    }

    pub async fn find_clinic(&self, clinic_id: Uuid, auth_token: &str) -> Result<Option<Clinic>> {
        debug!("Looking up clinic {}", clinic_id);

        let path = format!("/rest/v1/clinics?id=eq.{}&limit=1", clinic_id);
        let result: Vec<Clinic> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(result.into_iter().next())
    }

    /// Membership predicate: is there a doctor_clinic row linking the two?
    pub async fn is_doctor_at_clinic(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        auth_token: &str,
    ) -> Result<bool> {
        debug!("Checking membership of doctor {} at clinic {}", doctor_id, clinic_id);

        let path = format!(
            "/rest/v1/doctor_clinic?doctor_id=eq.{}&clinic_id=eq.{}&limit=1",
            doctor_id, clinic_id
        );
        let result: Vec<serde_json::Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(!result.is_empty())
    }

    pub async fn children_of(&self, user_id: Uuid, auth_token: &str) -> Result<Vec<Child>> {
        let path = format!("/rest/v1/children?user_id=eq.{}", user_id);
        let children: Vec<Child> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(children)
    }
}
