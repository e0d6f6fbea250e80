//! Verification application endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{ApplicantType, PortalStore, Sector, SessionStore};
use crate::verification::{self, ApplicationPayload, VerificationStatus};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationRequest {
    pub user_id: Option<Uuid>,
    pub applicant_type: Option<ApplicantType>,
    pub sector: Option<String>,
    pub project_title: Option<String>,
    pub project_description: Option<String>,
    pub github_username: Option<String>,
    #[serde(default)]
    pub team_members: Vec<String>,
    pub duration: Option<String>,
}

#[derive(Serialize)]
pub struct SubmitApplicationResponse {
    pub message: String,
}

/// POST /verification
pub async fn submit_application<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    Json(req): Json<SubmitApplicationRequest>,
) -> Result<Json<SubmitApplicationResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user_id = req
        .user_id
        .ok_or_else(|| PortalError::ValidationError("userId is required".to_string()))?;
    let sector = req
        .sector
        .ok_or_else(|| PortalError::ValidationError("sector is required".to_string()))?;
    let sector = Sector::from_str(&sector).ok_or(PortalError::InvalidSector(sector))?;
    let project_title = req
        .project_title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| PortalError::ValidationError("projectTitle is required".to_string()))?;
    let project_description = req.project_description.ok_or_else(|| {
        PortalError::ValidationError("projectDescription is required".to_string())
    })?;

    let payload = ApplicationPayload {
        applicant_type: req.applicant_type.unwrap_or(ApplicantType::Individual),
        sector,
        project_title,
        project_description,
        github_username: req.github_username,
        team_members: req.team_members,
        duration: req.duration,
    };

    verification::submit_application(state.store.as_ref(), user_id, payload)?;

    Ok(Json(SubmitApplicationResponse {
        message: "Application submitted and under review".to_string(),
    }))
}

/// GET /verification/check/:user_id
pub async fn check_status<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<VerificationStatus>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let status = verification::check_status(state.store.as_ref(), user_id)?;
    Ok(Json(status))
}
