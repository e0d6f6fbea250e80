//! Innovator verification workflow
//!
//! Application lifecycle: submit (pending) -> approve or reject by a
//! moderator. Approval flips the user's `verified` flag; rejection revokes
//! it and leaves the user free to submit again.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::PortalError;
use crate::notify::{self, NotificationKind};
use crate::store::{
    ApplicantType, ApplicationStatus, PortalStore, Sector, StoreResult, VerificationApplication,
};

/// Domain payload for a new application (wire parsing happens in the
/// route layer)
#[derive(Debug, Clone)]
pub struct ApplicationPayload {
    pub applicant_type: ApplicantType,
    pub sector: Sector,
    pub project_title: String,
    pub project_description: String,
    pub github_username: Option<String>,
    pub team_members: Vec<String>,
    pub duration: Option<String>,
}

/// Verification standing for one user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub is_verified: bool,
    pub has_pending: bool,
    pub can_apply: bool,
}

/// Submit a new verification application.
///
/// Fails with `DuplicateApplication` when the user is already verified or
/// has a pending/approved application. The application write completes
/// before any notification; notification failures are swallowed.
pub fn submit_application<P: PortalStore>(
    store: &P,
    user_id: Uuid,
    payload: ApplicationPayload,
) -> StoreResult<VerificationApplication> {
    let user = store.get_user(user_id)?.ok_or(PortalError::UserNotFound)?;

    if user.verified {
        return Err(PortalError::DuplicateApplication);
    }
    if store.active_application(user_id)?.is_some() {
        return Err(PortalError::DuplicateApplication);
    }

    let application = VerificationApplication {
        id: Uuid::new_v4(),
        user_id,
        applicant_type: payload.applicant_type,
        sector: payload.sector,
        project_title: payload.project_title,
        project_description: payload.project_description,
        // Snapshot: prefer the self-reported handle, fall back to the
        // handle already on the profile (OAuth-linked)
        github_username: payload.github_username.or(user.github_username.clone()),
        team_members: payload.team_members,
        duration: payload.duration,
        status: ApplicationStatus::Pending,
        submitted_at: Utc::now(),
        reviewed_at: None,
        reviewed_by: None,
        rejection_reason: None,
    };

    // The store re-checks uniqueness under its own lock; this is the
    // authoritative guard against concurrent submissions.
    store.insert_application(application.clone())?;

    tracing::info!(
        user = %user_id,
        application = %application.id,
        sector = application.sector.as_str(),
        "Verification application submitted"
    );

    notify::emit(
        store,
        user_id,
        NotificationKind::ApplicationUpdate,
        "Application Received",
        "Your innovator verification application is under review.",
        json!({ "applicationId": application.id }),
    );

    match store.list_moderators() {
        Ok(moderators) => {
            let recipients: Vec<Uuid> = moderators.iter().map(|m| m.id).collect();
            notify::emit_to_all(
                store,
                &recipients,
                NotificationKind::ApplicationUpdate,
                "New Verification Application",
                &format!("New application from {}", user.name),
                json!({ "applicationId": application.id, "userId": user_id }),
            );
        }
        Err(err) => {
            tracing::warn!("Failed to list moderators for fan-out: {}", err);
        }
    }

    Ok(application)
}

/// Report verification standing for one user
pub fn check_status<P: PortalStore>(store: &P, user_id: Uuid) -> StoreResult<VerificationStatus> {
    let user = store.get_user(user_id)?.ok_or(PortalError::UserNotFound)?;
    let active = store.active_application(user_id)?;

    let has_pending = active
        .as_ref()
        .map(|a| a.status == ApplicationStatus::Pending)
        .unwrap_or(false);

    Ok(VerificationStatus {
        is_verified: user.verified,
        has_pending,
        can_apply: !user.verified && active.is_none(),
    })
}

/// Approve an application and mark its owner verified.
///
/// Re-approving an already-approved application is an idempotent success
/// and does not re-send the notification.
pub fn approve_application<P: PortalStore>(
    store: &P,
    application_id: Uuid,
    admin_id: Uuid,
) -> StoreResult<()> {
    let mut application = store
        .get_application(application_id)?
        .ok_or(PortalError::ApplicationNotFound)?;

    if application.status == ApplicationStatus::Approved {
        tracing::debug!(application = %application_id, "Application already approved");
        return Ok(());
    }

    application.status = ApplicationStatus::Approved;
    application.reviewed_at = Some(Utc::now());
    application.reviewed_by = Some(admin_id);
    application.rejection_reason = None;
    store.update_application(&application)?;

    store.set_user_verified(application.user_id, true)?;
    if let Some(username) = &application.github_username {
        store.set_user_github(
            application.user_id,
            username,
            &format!("https://github.com/{username}"),
        )?;
    }

    tracing::info!(
        application = %application_id,
        user = %application.user_id,
        reviewer = %admin_id,
        "Verification application approved"
    );

    notify::emit(
        store,
        application.user_id,
        NotificationKind::ApplicationUpdate,
        "Application Approved",
        "Congratulations! Your innovator verification application has been approved.",
        json!({ "applicationId": application_id }),
    );

    Ok(())
}

/// Reject an application, revoking any prior verified state.
///
/// Leaves no pending/approved record behind, so the user may submit again.
pub fn reject_application<P: PortalStore>(
    store: &P,
    application_id: Uuid,
    admin_id: Uuid,
    reason: &str,
) -> StoreResult<()> {
    let mut application = store
        .get_application(application_id)?
        .ok_or(PortalError::ApplicationNotFound)?;

    let now = Utc::now();
    application.status = ApplicationStatus::Rejected;
    application.reviewed_at = Some(now);
    application.reviewed_by = Some(admin_id);
    application.rejection_reason = Some(reason.to_string());
    store.update_application(&application)?;

    // Rejection revokes verification outright, covering re-review of a
    // previously approved account.
    store.set_user_verified(application.user_id, false)?;
    store.set_user_suspension(application.user_id, Some(reason.to_string()), Some(now))?;

    tracing::info!(
        application = %application_id,
        user = %application.user_id,
        reviewer = %admin_id,
        "Verification application rejected"
    );

    notify::emit(
        store,
        application.user_id,
        NotificationKind::ApplicationUpdate,
        "Application Rejected",
        &format!(
            "Your verification application was rejected: {reason}. \
             You may update your details and submit a new application."
        ),
        json!({ "applicationId": application_id, "reason": reason }),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, Role, User};

    fn payload() -> ApplicationPayload {
        ApplicationPayload {
            applicant_type: ApplicantType::Individual,
            sector: Sector::Technology,
            project_title: "X".to_string(),
            project_description: "A project".to_string(),
            github_username: Some("octocat".to_string()),
            team_members: Vec::new(),
            duration: None,
        }
    }

    fn seed_user(store: &InMemoryStore, role: Role) -> Uuid {
        let user = User::new("Ada", &format!("{}@example.com", Uuid::new_v4()), None, role);
        let id = user.id;
        store.insert_user(user).unwrap();
        id
    }

    #[test]
    fn test_submit_then_resubmit_conflicts() {
        let store = InMemoryStore::new();
        let user_id = seed_user(&store, Role::User);

        submit_application(&store, user_id, payload()).unwrap();
        let err = submit_application(&store, user_id, payload()).unwrap_err();
        assert!(matches!(err, PortalError::DuplicateApplication));

        // Exactly one application document exists
        assert_eq!(store.list_applications(None).unwrap().len(), 1);
    }

    #[test]
    fn test_approve_flips_verified_and_copies_github() {
        let store = InMemoryStore::new();
        let user_id = seed_user(&store, Role::User);
        let admin_id = seed_user(&store, Role::Admin);

        let app = submit_application(&store, user_id, payload()).unwrap();
        approve_application(&store, app.id, admin_id).unwrap();

        let user = store.get_user(user_id).unwrap().unwrap();
        assert!(user.verified);
        assert_eq!(user.github_username.as_deref(), Some("octocat"));
        assert_eq!(
            user.github_url.as_deref(),
            Some("https://github.com/octocat")
        );

        let status = check_status(&store, user_id).unwrap();
        assert!(status.is_verified);
        assert!(!status.can_apply);
    }

    #[test]
    fn test_reapprove_is_idempotent_without_renotify() {
        let store = InMemoryStore::new();
        let user_id = seed_user(&store, Role::User);
        let admin_id = seed_user(&store, Role::Admin);

        let app = submit_application(&store, user_id, payload()).unwrap();
        approve_application(&store, app.id, admin_id).unwrap();
        let before = store.list_notifications(user_id).unwrap().len();

        approve_application(&store, app.id, admin_id).unwrap();
        assert_eq!(store.list_notifications(user_id).unwrap().len(), before);
    }

    #[test]
    fn test_reject_revokes_verified_and_allows_resubmission() {
        let store = InMemoryStore::new();
        let user_id = seed_user(&store, Role::User);
        let admin_id = seed_user(&store, Role::Admin);

        let app = submit_application(&store, user_id, payload()).unwrap();
        approve_application(&store, app.id, admin_id).unwrap();
        reject_application(&store, app.id, admin_id, "incomplete").unwrap();

        let user = store.get_user(user_id).unwrap().unwrap();
        assert!(!user.verified);
        assert_eq!(user.suspension_reason.as_deref(), Some("incomplete"));

        let notifications = store.list_notifications(user_id).unwrap();
        assert!(notifications[0].message.contains("incomplete"));

        // Rejected record does not block a new submission
        submit_application(&store, user_id, payload()).unwrap();
    }

    #[test]
    fn test_admins_receive_fanout() {
        let store = InMemoryStore::new();
        let user_id = seed_user(&store, Role::User);
        let admin_a = seed_user(&store, Role::Admin);
        let admin_b = seed_user(&store, Role::SuperAdmin);

        submit_application(&store, user_id, payload()).unwrap();

        assert_eq!(store.list_notifications(admin_a).unwrap().len(), 1);
        assert_eq!(store.list_notifications(admin_b).unwrap().len(), 1);
        assert!(store.list_notifications(admin_a).unwrap()[0]
            .message
            .contains("Ada"));
    }
}
