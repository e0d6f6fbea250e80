//! Funding/certificate request status workflow
//!
//! Status is monotonic: pending -> submitted only. Submitted requests
//! never return to pending and cannot be resubmitted.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::PortalError;
use crate::notify::{self, NotificationKind};
use crate::store::{PortalStore, Role, StoreResult, TrackedStatus};

/// Move one request to a new status under the transition table.
///
/// pending -> submitted persists and notifies; pending -> pending is an
/// idempotent no-op; submitted -> anything conflicts.
pub fn update_status<P: PortalStore>(
    store: &P,
    request_id: Uuid,
    new_status: TrackedStatus,
    actor_role: Role,
) -> StoreResult<TrackedStatus> {
    if !actor_role.can_moderate() {
        return Err(PortalError::ModeratorRequired);
    }

    let request = store
        .get_tracked_request(request_id)?
        .ok_or(PortalError::RequestNotFound)?;

    match (request.status, new_status) {
        (TrackedStatus::Pending, TrackedStatus::Pending) => return Ok(TrackedStatus::Pending),
        (TrackedStatus::Submitted, TrackedStatus::Pending) => {
            return Err(PortalError::IrreversibleTransition)
        }
        (TrackedStatus::Submitted, TrackedStatus::Submitted) => {
            return Err(PortalError::AlreadySubmitted)
        }
        (TrackedStatus::Pending, TrackedStatus::Submitted) => {}
    }

    store.set_tracked_request_status(request_id, TrackedStatus::Submitted, Utc::now())?;

    tracing::info!(
        request = %request_id,
        kind = request.kind.as_str(),
        "Request marked submitted"
    );

    notify::emit(
        store,
        request.user_id,
        NotificationKind::RequestStatus,
        "Request Status Updated",
        &format!(
            "Your {} request status changed to submitted.",
            request.kind.as_str()
        ),
        json!({ "requestId": request_id, "status": "submitted" }),
    );

    Ok(TrackedStatus::Submitted)
}

/// Mark a batch of requests submitted in one store call.
///
/// Already-submitted and unknown ids are silently skipped; each affected
/// user gets one notification. Returns the updated count.
pub fn bulk_submit<P: PortalStore>(
    store: &P,
    request_ids: &[Uuid],
    actor_role: Role,
) -> StoreResult<u64> {
    if !actor_role.can_moderate() {
        return Err(PortalError::ModeratorRequired);
    }
    if request_ids.is_empty() {
        return Err(PortalError::ValidationError(
            "no request ids provided".to_string(),
        ));
    }

    let affected = store.mark_requests_submitted(request_ids)?;
    if affected.is_empty() {
        return Err(PortalError::ValidationError(
            "no requests eligible for submission".to_string(),
        ));
    }

    tracing::info!(
        requested = request_ids.len(),
        updated = affected.len(),
        "Bulk request submission"
    );

    for request in &affected {
        notify::emit(
            store,
            request.user_id,
            NotificationKind::RequestStatus,
            "Request Submitted",
            &format!("Your {} request has been submitted.", request.kind.as_str()),
            json!({ "requestId": request.id, "status": "submitted" }),
        );
    }

    Ok(affected.len() as u64)
}
