//! Project comment and collaboration endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::collaboration::{self, is_collab_marker, CollabRequestView, CollabStanding};
use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{CollabStatus, Comment, PortalStore, SessionStore};

#[derive(Deserialize)]
pub struct AddCommentRequest {
    pub content: Option<String>,
}

#[derive(Serialize)]
pub struct AddCommentResponse {
    pub message: String,
    pub comment: Comment,
}

/// POST /projects/:id/comments
///
/// A comment whose content carries the legacy collaboration marker is
/// routed into the collaboration workflow instead of being stored as an
/// ordinary comment.
pub async fn add_comment<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<AddCommentResponse>), PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;

    let content = req
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| PortalError::ValidationError("content is required".to_string()))?;

    let comment = if is_collab_marker(&content) {
        let (comment, _request) =
            collaboration::request_collaboration(state.store.as_ref(), project_id, user.id, &content)?;
        comment
    } else {
        let comment = Comment {
            comment_id: Uuid::new_v4(),
            user_id: user.id,
            user_name: user.name.clone(),
            content,
            created_at: Utc::now(),
        };
        state.store.append_comment(project_id, comment.clone())?;
        comment
    };

    Ok((
        StatusCode::CREATED,
        Json(AddCommentResponse {
            message: "Comment added".to_string(),
            comment,
        }),
    ))
}

/// GET /projects/:id/collaboration/status
pub async fn collaboration_status<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(project_id): Path<Uuid>,
) -> Result<Json<CollabStanding>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    let standing =
        collaboration::collaboration_status(state.store.as_ref(), project_id, user.id)?;
    Ok(Json(standing))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptCollabResponse {
    pub message: String,
    pub collaborator_count: u32,
    pub status: CollabStatus,
}

/// POST /projects/:id/collaboration/:comment_id/accept
pub async fn accept_collaboration<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path((project_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AcceptCollabResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    let count = collaboration::accept_collaboration(
        state.store.as_ref(),
        project_id,
        comment_id,
        user.id,
    )?;

    Ok(Json(AcceptCollabResponse {
        message: "Collaboration request accepted".to_string(),
        collaborator_count: count,
        status: CollabStatus::Accepted,
    }))
}

#[derive(Serialize)]
pub struct RejectCollabResponse {
    pub message: String,
    pub status: CollabStatus,
}

/// POST /projects/:id/collaboration/:comment_id/reject
pub async fn reject_collaboration<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path((project_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RejectCollabResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    collaboration::reject_collaboration(state.store.as_ref(), project_id, comment_id, user.id)?;

    Ok(Json(RejectCollabResponse {
        message: "Collaboration request rejected".to_string(),
        status: CollabStatus::Rejected,
    }))
}

#[derive(Serialize)]
pub struct ListCollabRequestsResponse {
    pub requests: Vec<CollabRequestView>,
}

/// GET /projects/collaboration/requests
pub async fn list_collaboration_requests<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
) -> Result<Json<ListCollabRequestsResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    let requests = collaboration::list_requests_for_owner(state.store.as_ref(), user.id)?;
    Ok(Json(ListCollabRequestsResponse { requests }))
}
