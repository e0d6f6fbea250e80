//! Admin moderation endpoints: application review and request status

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::error::PortalError;
use crate::requests;
use crate::state::AppState;
use crate::store::{
    ApplicantType, ApplicationStatus, PortalStore, Sector, SessionStore, TrackedStatus,
    VerificationApplication,
};
use crate::verification;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub applicant_type: ApplicantType,
    pub sector: Sector,
    pub project_title: String,
    pub project_description: String,
    pub github_username: Option<String>,
    pub team_members: Vec<String>,
    pub duration: Option<String>,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
}

impl From<VerificationApplication> for ApplicationView {
    fn from(app: VerificationApplication) -> Self {
        Self {
            id: app.id,
            user_id: app.user_id,
            applicant_type: app.applicant_type,
            sector: app.sector,
            project_title: app.project_title,
            project_description: app.project_description,
            github_username: app.github_username,
            team_members: app.team_members,
            duration: app.duration,
            status: app.status,
            submitted_at: app.submitted_at,
            reviewed_at: app.reviewed_at,
            reviewed_by: app.reviewed_by,
            rejection_reason: app.rejection_reason,
        }
    }
}

#[derive(Deserialize)]
pub struct ApplicationsQuery {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ApplicationsResponse {
    pub applications: Vec<ApplicationView>,
}

/// GET /admin/applications?status=
pub async fn list_applications<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<ApplicationsResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    super::session::require_moderator(&cookies, &state)?;

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            ApplicationStatus::from_str(s)
                .ok_or_else(|| PortalError::ValidationError(format!("invalid status: {s}")))?,
        ),
    };

    let applications = state
        .store
        .list_applications(status)?
        .into_iter()
        .map(ApplicationView::from)
        .collect();

    Ok(Json(ApplicationsResponse { applications }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /admin/applications/:id/approve
pub async fn approve_application<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(application_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let admin = super::session::require_moderator(&cookies, &state)?;
    verification::approve_application(state.store.as_ref(), application_id, admin.id)?;

    Ok(Json(MessageResponse {
        message: "Application approved".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct RejectApplicationRequest {
    pub reason: Option<String>,
}

/// POST /admin/applications/:id/reject
pub async fn reject_application<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(application_id): Path<Uuid>,
    Json(req): Json<RejectApplicationRequest>,
) -> Result<Json<MessageResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let admin = super::session::require_moderator(&cookies, &state)?;

    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| PortalError::ValidationError("reason is required".to_string()))?;

    verification::reject_application(state.store.as_ref(), application_id, admin.id, &reason)?;

    Ok(Json(MessageResponse {
        message: "Application rejected".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct UpdateRequestStatusRequest {
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateRequestStatusResponse {
    pub message: String,
    pub status: TrackedStatus,
}

/// PUT /admin/requests/:id/status
pub async fn update_request_status<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdateRequestStatusRequest>,
) -> Result<Json<UpdateRequestStatusResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let admin = super::session::require_moderator(&cookies, &state)?;

    let status = req
        .status
        .as_deref()
        .and_then(TrackedStatus::from_str)
        .ok_or_else(|| PortalError::ValidationError("invalid status".to_string()))?;

    let status = requests::update_status(state.store.as_ref(), request_id, status, admin.role)?;

    Ok(Json(UpdateRequestStatusResponse {
        message: "Request status updated".to_string(),
        status,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSubmitRequest {
    #[serde(default)]
    pub request_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BulkSubmitResponse {
    pub message: String,
    pub updated: u64,
}

/// POST /admin/requests/bulk-submit
pub async fn bulk_submit_requests<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Json(req): Json<BulkSubmitRequest>,
) -> Result<Json<BulkSubmitResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let admin = super::session::require_moderator(&cookies, &state)?;
    let updated = requests::bulk_submit(state.store.as_ref(), &req.request_ids, admin.role)?;

    Ok(Json(BulkSubmitResponse {
        message: format!("{updated} requests submitted"),
        updated,
    }))
}
