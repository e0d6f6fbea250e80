//! In-memory storage implementations

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    ApplicationStatus, CollabStatus, CollaborationRequest, Comment, Notification, PortalStore,
    Project, Session, SessionId, SessionStore, StoreResult, TrackedRequest, TrackedStatus, User,
    VerificationApplication,
};
use crate::error::PortalError;

/// In-memory portal store
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    applications: RwLock<HashMap<Uuid, VerificationApplication>>,
    projects: RwLock<HashMap<Uuid, Project>>,
    collab_requests: RwLock<HashMap<Uuid, CollaborationRequest>>,
    tracked_requests: RwLock<HashMap<Uuid, TrackedRequest>>,
    notifications: RwLock<HashMap<Uuid, Notification>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            applications: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            collab_requests: RwLock::new(HashMap::new()),
            tracked_requests: RwLock::new(HashMap::new()),
            notifications: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalStore for InMemoryStore {
    fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        let normalized = user.email.to_lowercase();
        if users.values().any(|u| u.email == normalized) {
            return Err(PortalError::EmailAlreadyExists);
        }
        users.insert(user.id, user);
        Ok(())
    }

    fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&user_id).cloned())
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let normalized = email.to_lowercase();
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .find(|u| u.email == normalized)
            .cloned())
    }

    fn set_user_verified(&self, user_id: Uuid, verified: bool) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(&user_id).ok_or(PortalError::UserNotFound)?;
        user.verified = verified;
        Ok(())
    }

    fn set_user_github(&self, user_id: Uuid, username: &str, url: &str) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(&user_id).ok_or(PortalError::UserNotFound)?;
        user.github_username = Some(username.to_string());
        user.github_url = Some(url.to_string());
        Ok(())
    }

    fn set_user_suspension(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        let user = users.get_mut(&user_id).ok_or(PortalError::UserNotFound)?;
        user.suspension_reason = reason;
        user.suspended_at = at;
        Ok(())
    }

    fn list_moderators(&self) -> StoreResult<Vec<User>> {
        Ok(self
            .users
            .read()
            .unwrap()
            .values()
            .filter(|u| u.role.can_moderate())
            .cloned()
            .collect())
    }

    fn insert_application(&self, app: VerificationApplication) -> StoreResult<()> {
        // Check and insert under one write guard so two concurrent
        // submissions cannot both pass the uniqueness check.
        let mut applications = self.applications.write().unwrap();
        if applications
            .values()
            .any(|a| a.user_id == app.user_id && a.status.blocks_resubmission())
        {
            return Err(PortalError::DuplicateApplication);
        }
        applications.insert(app.id, app);
        Ok(())
    }

    fn get_application(&self, id: Uuid) -> StoreResult<Option<VerificationApplication>> {
        Ok(self.applications.read().unwrap().get(&id).cloned())
    }

    fn active_application(&self, user_id: Uuid) -> StoreResult<Option<VerificationApplication>> {
        Ok(self
            .applications
            .read()
            .unwrap()
            .values()
            .find(|a| a.user_id == user_id && a.status.blocks_resubmission())
            .cloned())
    }

    fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<VerificationApplication>> {
        let mut apps: Vec<_> = self
            .applications
            .read()
            .unwrap()
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(apps)
    }

    fn update_application(&self, app: &VerificationApplication) -> StoreResult<()> {
        let mut applications = self.applications.write().unwrap();
        if !applications.contains_key(&app.id) {
            return Err(PortalError::ApplicationNotFound);
        }
        applications.insert(app.id, app.clone());
        Ok(())
    }

    fn insert_project(&self, project: Project) -> StoreResult<()> {
        self.projects.write().unwrap().insert(project.id, project);
        Ok(())
    }

    fn get_project(&self, project_id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().unwrap().get(&project_id).cloned())
    }

    fn list_projects_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Project>> {
        Ok(self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect())
    }

    fn append_comment(&self, project_id: Uuid, comment: Comment) -> StoreResult<()> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&project_id)
            .ok_or(PortalError::ProjectNotFound)?;
        project.comments.push(comment);
        Ok(())
    }

    fn add_collaborator(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<u32> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(&project_id)
            .ok_or(PortalError::ProjectNotFound)?;
        if !project.collaborator_ids.contains(&user_id) {
            project.collaborator_ids.push(user_id);
        }
        // Recount from the set itself; the count can never drift.
        project.collaborator_count = project.collaborator_ids.len() as u32;
        Ok(project.collaborator_count)
    }

    fn count_projects_by_author(&self, author_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.author_id == author_id)
            .count() as u64)
    }

    fn count_collaborations(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .projects
            .read()
            .unwrap()
            .values()
            .filter(|p| p.collaborator_ids.contains(&user_id))
            .count() as u64)
    }

    fn insert_collab_request(&self, request: CollaborationRequest) -> StoreResult<()> {
        let project_title = self
            .projects
            .read()
            .unwrap()
            .get(&request.project_id)
            .map(|p| p.title.clone())
            .unwrap_or_default();

        let mut requests = self.collab_requests.write().unwrap();
        if let Some(existing) = requests
            .values()
            .find(|r| r.project_id == request.project_id && r.requester_id == request.requester_id)
        {
            return Err(PortalError::DuplicateRequest {
                status: existing.status,
                project_title,
            });
        }
        requests.insert(request.id, request);
        Ok(())
    }

    fn upsert_collab_request(
        &self,
        request: CollaborationRequest,
    ) -> StoreResult<CollaborationRequest> {
        let mut requests = self.collab_requests.write().unwrap();
        if let Some(existing) = requests
            .values()
            .find(|r| r.project_id == request.project_id && r.requester_id == request.requester_id)
        {
            return Ok(existing.clone());
        }
        requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn get_collab_request(
        &self,
        project_id: Uuid,
        requester_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self
            .collab_requests
            .read()
            .unwrap()
            .values()
            .find(|r| r.project_id == project_id && r.requester_id == requester_id)
            .cloned())
    }

    fn get_collab_request_by_comment(
        &self,
        project_id: Uuid,
        comment_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>> {
        Ok(self
            .collab_requests
            .read()
            .unwrap()
            .values()
            .find(|r| r.project_id == project_id && r.comment_id == comment_id)
            .cloned())
    }

    fn list_collab_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> StoreResult<Vec<CollaborationRequest>> {
        let mut requests: Vec<_> = self
            .collab_requests
            .read()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    fn set_collab_request_status(
        &self,
        id: Uuid,
        status: CollabStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut requests = self.collab_requests.write().unwrap();
        let request = requests.get_mut(&id).ok_or(PortalError::RequestNotFound)?;
        request.status = status;
        request.updated_at = updated_at;
        Ok(())
    }

    fn insert_tracked_request(&self, request: TrackedRequest) -> StoreResult<()> {
        self.tracked_requests
            .write()
            .unwrap()
            .insert(request.id, request);
        Ok(())
    }

    fn get_tracked_request(&self, id: Uuid) -> StoreResult<Option<TrackedRequest>> {
        Ok(self.tracked_requests.read().unwrap().get(&id).cloned())
    }

    fn set_tracked_request_status(
        &self,
        id: Uuid,
        status: TrackedStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut requests = self.tracked_requests.write().unwrap();
        let request = requests.get_mut(&id).ok_or(PortalError::RequestNotFound)?;
        request.status = status;
        request.updated_at = updated_at;
        Ok(())
    }

    fn mark_requests_submitted(&self, ids: &[Uuid]) -> StoreResult<Vec<TrackedRequest>> {
        let now = Utc::now();
        let mut requests = self.tracked_requests.write().unwrap();
        let mut affected = Vec::new();
        for id in ids {
            if let Some(request) = requests.get_mut(id) {
                if request.status != TrackedStatus::Submitted {
                    request.status = TrackedStatus::Submitted;
                    request.updated_at = now;
                    affected.push(request.clone());
                }
            }
        }
        Ok(affected)
    }

    fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        self.notifications
            .write()
            .unwrap()
            .insert(notification.id, notification);
        Ok(())
    }

    fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let mut notifications: Vec<_> = self
            .notifications
            .read()
            .unwrap()
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().unwrap();
        match notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut notifications = self.notifications.write().unwrap();
        let mut flipped = 0;
        for n in notifications.values_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

/// In-memory session store
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, user_id: Uuid) -> StoreResult<Session> {
        let session = Session {
            id: SessionId(Uuid::new_v4().to_string()),
            user_id,
            created_at: Utc::now(),
        };
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>> {
        Ok(self.sessions.read().unwrap().get(session_id).cloned())
    }

    fn delete(&self, session_id: &SessionId) -> StoreResult<()> {
        self.sessions.write().unwrap().remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ApplicantType, Role, Sector, TrackedKind};

    fn application(user_id: Uuid, status: ApplicationStatus) -> VerificationApplication {
        VerificationApplication {
            id: Uuid::new_v4(),
            user_id,
            applicant_type: ApplicantType::Individual,
            sector: Sector::Technology,
            project_title: "Test".to_string(),
            project_description: "Test project".to_string(),
            github_username: None,
            team_members: Vec::new(),
            duration: None,
            status,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn test_duplicate_application_blocked() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();

        store
            .insert_application(application(user_id, ApplicationStatus::Pending))
            .unwrap();

        let err = store
            .insert_application(application(user_id, ApplicationStatus::Pending))
            .unwrap_err();
        assert!(matches!(err, PortalError::DuplicateApplication));
    }

    #[test]
    fn test_rejected_application_does_not_block() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();

        store
            .insert_application(application(user_id, ApplicationStatus::Rejected))
            .unwrap();

        assert!(store.active_application(user_id).unwrap().is_none());
        store
            .insert_application(application(user_id, ApplicationStatus::Pending))
            .unwrap();
    }

    #[test]
    fn test_collab_request_uniqueness() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let project = Project::new(owner, "Rover", "A mars rover");
        let project_id = project.id;
        store.insert_project(project).unwrap();

        let now = Utc::now();
        let request = CollaborationRequest {
            id: Uuid::new_v4(),
            project_id,
            owner_id: owner,
            requester_id: requester,
            comment_id: Uuid::new_v4(),
            message: "[COLLAB REQUEST] hi".to_string(),
            status: CollabStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        store.insert_collab_request(request.clone()).unwrap();

        let mut second = request.clone();
        second.id = Uuid::new_v4();
        second.comment_id = Uuid::new_v4();
        let err = store.insert_collab_request(second).unwrap_err();
        match err {
            PortalError::DuplicateRequest {
                status,
                project_title,
            } => {
                assert_eq!(status, CollabStatus::Pending);
                assert_eq!(project_title, "Rover");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_upsert_collab_request_idempotent() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let project_id = Uuid::new_v4();
        let now = Utc::now();

        let request = CollaborationRequest {
            id: Uuid::new_v4(),
            project_id,
            owner_id: owner,
            requester_id: requester,
            comment_id: Uuid::new_v4(),
            message: "hi".to_string(),
            status: CollabStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let first = store.upsert_collab_request(request.clone()).unwrap();

        let mut again = request.clone();
        again.id = Uuid::new_v4();
        let second = store.upsert_collab_request(again).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.list_collab_requests_for_owner(owner).unwrap().len(), 1);
    }

    #[test]
    fn test_add_collaborator_set_semantics() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let collaborator = Uuid::new_v4();
        let project = Project::new(owner, "Rover", "A mars rover");
        let project_id = project.id;
        store.insert_project(project).unwrap();

        assert_eq!(store.add_collaborator(project_id, collaborator).unwrap(), 1);
        assert_eq!(store.add_collaborator(project_id, collaborator).unwrap(), 1);
        assert_eq!(store.count_collaborations(collaborator).unwrap(), 1);
    }

    #[test]
    fn test_mark_requests_submitted_skips_submitted() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();

        let mut submitted = TrackedRequest::new(TrackedKind::Funding, user_id);
        submitted.status = TrackedStatus::Submitted;
        let pending = TrackedRequest::new(TrackedKind::Certificate, user_id);
        let ids = vec![submitted.id, pending.id, Uuid::new_v4()];
        store.insert_tracked_request(submitted).unwrap();
        store.insert_tracked_request(pending.clone()).unwrap();

        let affected = store.mark_requests_submitted(&ids).unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].id, pending.id);
    }

    #[test]
    fn test_moderator_listing() {
        let store = InMemoryStore::new();
        store
            .insert_user(User::new("Alice", "alice@example.com", None, Role::User))
            .unwrap();
        store
            .insert_user(User::new("Bob", "bob@example.com", None, Role::Admin))
            .unwrap();
        store
            .insert_user(User::new("Eve", "eve@example.com", None, Role::SuperAdmin))
            .unwrap();

        assert_eq!(store.list_moderators().unwrap().len(), 2);
    }
}
