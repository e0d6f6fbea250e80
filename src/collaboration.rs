//! Project collaboration workflow
//!
//! A collaboration request is historically a specially-marked project
//! comment; a structured record in the requests collection is now the
//! authoritative representation. Both are written on creation so older
//! readers keep seeing the request inline with comments, and legacy
//! comment-only requests are lazily migrated into structured records the
//! first time an owner lists their requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::PortalError;
use crate::notify::{self, NotificationKind};
use crate::store::{
    CollabStatus, CollaborationRequest, Comment, PortalStore, Project, StoreResult,
};

/// Legacy marker prefix denoting a collaboration request inside a comment
pub const COLLAB_MARKER: &str = "[COLLAB REQUEST";

/// Whether a comment body is a legacy-encoded collaboration request
pub fn is_collab_marker(content: &str) -> bool {
    content.trim_start().starts_with(COLLAB_MARKER)
}

/// Owner-facing view of a collaboration request, enriched with the
/// requester's profile summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabRequestView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_title: String,
    pub comment_id: Uuid,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub requester_avatar: Option<String>,
    pub github_username: Option<String>,
    pub follower_count: u32,
    pub project_count: u64,
    pub collaboration_count: u64,
    pub message: String,
    pub status: CollabStatus,
    /// Human-readable age, e.g. "2 hours ago"
    pub requested: String,
    pub created_at: DateTime<Utc>,
}

/// Current collaboration standing of a requester on a project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabStanding {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CollabStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
}

/// File a collaboration request against a project.
///
/// Dual-writes the comment-shaped record and the structured request under
/// one correlating comment id, then notifies the project owner. Duplicate
/// requests (structured or legacy-embedded) conflict with the existing
/// status and project title attached.
pub fn request_collaboration<P: PortalStore>(
    store: &P,
    project_id: Uuid,
    requester_id: Uuid,
    content: &str,
) -> StoreResult<(Comment, CollaborationRequest)> {
    let project = store
        .get_project(project_id)?
        .ok_or(PortalError::ProjectNotFound)?;

    if project.author_id == requester_id {
        return Err(PortalError::OwnerCollabRequest);
    }

    let requester = store
        .get_user(requester_id)?
        .ok_or(PortalError::UserNotFound)?;

    if let Some(existing) = store.get_collab_request(project_id, requester_id)? {
        return Err(PortalError::DuplicateRequest {
            status: existing.status,
            project_title: project.title,
        });
    }
    if legacy_marker_from(&project, requester_id).is_some() {
        // Comment-only request from before the structured collection;
        // never migrated, so it is still pending.
        return Err(PortalError::DuplicateRequest {
            status: CollabStatus::Pending,
            project_title: project.title,
        });
    }

    let now = Utc::now();
    let comment = Comment {
        comment_id: Uuid::new_v4(),
        user_id: requester_id,
        user_name: requester.name.clone(),
        content: content.to_string(),
        created_at: now,
    };
    store.append_comment(project_id, comment.clone())?;

    let request = CollaborationRequest {
        id: Uuid::new_v4(),
        project_id,
        owner_id: project.author_id,
        requester_id,
        comment_id: comment.comment_id,
        message: content.to_string(),
        status: CollabStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    store.insert_collab_request(request.clone())?;

    tracing::info!(
        project = %project_id,
        requester = %requester_id,
        request = %request.id,
        "Collaboration request filed"
    );

    notify::emit(
        store,
        project.author_id,
        NotificationKind::CollabRequest,
        "New Collaboration Request",
        &format!("{} wants to collaborate on {}", requester.name, project.title),
        json!({
            "projectId": project_id,
            "commentId": comment.comment_id,
            "requesterId": requester_id,
        }),
    );

    Ok((comment, request))
}

/// Accept a pending collaboration request.
///
/// Adds the requester to the project's collaborator set, recounts, flips
/// the request to accepted, and notifies the requester. Returns the new
/// collaborator count.
pub fn accept_collaboration<P: PortalStore>(
    store: &P,
    project_id: Uuid,
    comment_id: Uuid,
    owner_id: Uuid,
) -> StoreResult<u32> {
    let (project, request) = pending_request(store, project_id, comment_id, owner_id)?;

    let count = store.add_collaborator(project_id, request.requester_id)?;
    store.set_collab_request_status(request.id, CollabStatus::Accepted, Utc::now())?;

    tracing::info!(
        project = %project_id,
        requester = %request.requester_id,
        collaborators = count,
        "Collaboration request accepted"
    );

    notify::emit(
        store,
        request.requester_id,
        NotificationKind::CollabResponse,
        "Collaboration Accepted",
        &format!(
            "Your collaboration request for {} was accepted.",
            project.title
        ),
        json!({ "projectId": project_id, "status": "accepted" }),
    );

    Ok(count)
}

/// Reject a pending collaboration request.
///
/// Same pending-status guard as accept; the collaborator set is never
/// touched.
pub fn reject_collaboration<P: PortalStore>(
    store: &P,
    project_id: Uuid,
    comment_id: Uuid,
    owner_id: Uuid,
) -> StoreResult<()> {
    let (project, request) = pending_request(store, project_id, comment_id, owner_id)?;

    store.set_collab_request_status(request.id, CollabStatus::Rejected, Utc::now())?;

    tracing::info!(
        project = %project_id,
        requester = %request.requester_id,
        "Collaboration request rejected"
    );

    notify::emit(
        store,
        request.requester_id,
        NotificationKind::CollabResponse,
        "Collaboration Declined",
        &format!(
            "Your collaboration request for {} was declined.",
            project.title
        ),
        json!({ "projectId": project_id, "status": "rejected" }),
    );

    Ok(())
}

/// Current standing of a requester's collaboration request on a project,
/// covering both the structured record and the legacy encoding
pub fn collaboration_status<P: PortalStore>(
    store: &P,
    project_id: Uuid,
    requester_id: Uuid,
) -> StoreResult<CollabStanding> {
    let project = store
        .get_project(project_id)?
        .ok_or(PortalError::ProjectNotFound)?;

    if let Some(request) = store.get_collab_request(project_id, requester_id)? {
        return Ok(CollabStanding {
            exists: true,
            status: Some(request.status),
            project_title: Some(project.title),
        });
    }
    if legacy_marker_from(&project, requester_id).is_some() {
        return Ok(CollabStanding {
            exists: true,
            status: Some(CollabStatus::Pending),
            project_title: Some(project.title),
        });
    }

    Ok(CollabStanding {
        exists: false,
        status: None,
        project_title: None,
    })
}

/// Enriched listing of every collaboration request owned by a user.
///
/// When no structured records exist, legacy comment-embedded requests on
/// the owner's projects are migrated first (upsert keyed on project +
/// requester, so running this twice cannot duplicate).
pub fn list_requests_for_owner<P: PortalStore>(
    store: &P,
    owner_id: Uuid,
) -> StoreResult<Vec<CollabRequestView>> {
    let mut requests = store.list_collab_requests_for_owner(owner_id)?;

    if requests.is_empty() {
        migrate_legacy_requests(store, owner_id)?;
        requests = store.list_collab_requests_for_owner(owner_id)?;
    }

    let now = Utc::now();
    let mut views = Vec::with_capacity(requests.len());
    for request in requests {
        let project_title = store
            .get_project(request.project_id)?
            .map(|p| p.title)
            .unwrap_or_default();
        let requester = store.get_user(request.requester_id)?;

        let (requester_name, requester_avatar, github_username, follower_count) = match &requester {
            Some(user) => (
                user.name.clone(),
                user.avatar_url.clone(),
                user.github_username.clone(),
                user.follower_count,
            ),
            None => ("Unknown innovator".to_string(), None, None, 0),
        };

        views.push(CollabRequestView {
            id: request.id,
            project_id: request.project_id,
            project_title,
            comment_id: request.comment_id,
            requester_id: request.requester_id,
            requester_name,
            requester_avatar,
            github_username,
            follower_count,
            project_count: store.count_projects_by_author(request.requester_id)?,
            collaboration_count: store.count_collaborations(request.requester_id)?,
            message: request.message,
            status: request.status,
            requested: relative_time(request.created_at, now),
            created_at: request.created_at,
        });
    }

    Ok(views)
}

/// Materialize structured records for legacy comment-embedded requests
fn migrate_legacy_requests<P: PortalStore>(store: &P, owner_id: Uuid) -> StoreResult<()> {
    for project in store.list_projects_by_author(owner_id)? {
        for comment in &project.comments {
            if comment.user_id == owner_id || !is_collab_marker(&comment.content) {
                continue;
            }
            let migrated = CollaborationRequest {
                id: Uuid::new_v4(),
                project_id: project.id,
                owner_id,
                requester_id: comment.user_id,
                comment_id: comment.comment_id,
                message: comment.content.clone(),
                status: CollabStatus::Pending,
                created_at: comment.created_at,
                updated_at: comment.created_at,
            };
            store.upsert_collab_request(migrated)?;
        }
    }
    Ok(())
}

/// Resolve a request by (project, comment) and verify ownership and
/// pending status
fn pending_request<P: PortalStore>(
    store: &P,
    project_id: Uuid,
    comment_id: Uuid,
    owner_id: Uuid,
) -> StoreResult<(Project, CollaborationRequest)> {
    let project = store
        .get_project(project_id)?
        .ok_or(PortalError::ProjectNotFound)?;

    if project.author_id != owner_id {
        return Err(PortalError::NotProjectOwner);
    }

    let request = store
        .get_collab_request_by_comment(project_id, comment_id)?
        .ok_or(PortalError::RequestNotFound)?;

    if request.status != CollabStatus::Pending {
        return Err(PortalError::AlreadyProcessed {
            status: request.status,
        });
    }

    Ok((project, request))
}

fn legacy_marker_from(project: &Project, requester_id: Uuid) -> Option<&Comment> {
    project
        .comments
        .iter()
        .find(|c| c.user_id == requester_id && is_collab_marker(&c.content))
}

/// Human-readable age of a timestamp
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);

    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if delta.num_seconds() < 60 {
        "just now".to_string()
    } else if delta.num_minutes() < 60 {
        plural(delta.num_minutes(), "minute")
    } else if delta.num_hours() < 24 {
        plural(delta.num_hours(), "hour")
    } else if delta.num_days() < 30 {
        plural(delta.num_days(), "day")
    } else if delta.num_days() < 365 {
        plural(delta.num_days() / 30, "month")
    } else {
        plural(delta.num_days() / 365, "year")
    }
}
