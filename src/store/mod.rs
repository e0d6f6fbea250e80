//! Storage abstractions for the portal

pub mod memory;
pub mod models;
pub mod sqlite;

pub use memory::{InMemorySessionStore, InMemoryStore};
pub use models::*;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::PortalError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, PortalError>;

/// Trait for portal document storage
///
/// Implementations enforce the two uniqueness invariants at this layer,
/// so concurrent check-then-insert callers cannot both pass:
/// at most one pending/approved application per user, and at most one
/// collaboration request per (project, requester) pair.
pub trait PortalStore: Send + Sync {
    // --- users ---

    /// Insert a new user. Fails with `EmailAlreadyExists` on a duplicate
    /// email (case-insensitive).
    fn insert_user(&self, user: User) -> StoreResult<()>;

    fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    fn set_user_verified(&self, user_id: Uuid, verified: bool) -> StoreResult<()>;

    /// Record a self-reported GitHub handle on the user profile
    fn set_user_github(&self, user_id: Uuid, username: &str, url: &str) -> StoreResult<()>;

    /// Set or clear the suspension marker left by a rejected review
    fn set_user_suspension(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// All admin and superadmin accounts (notification fan-out targets)
    fn list_moderators(&self) -> StoreResult<Vec<User>>;

    // --- verification applications ---

    /// Insert a new application. Fails with `DuplicateApplication` if the
    /// user already has a pending or approved one.
    fn insert_application(&self, app: VerificationApplication) -> StoreResult<()>;

    fn get_application(&self, id: Uuid) -> StoreResult<Option<VerificationApplication>>;

    /// The user's pending or approved application, if any
    fn active_application(&self, user_id: Uuid) -> StoreResult<Option<VerificationApplication>>;

    fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<VerificationApplication>>;

    fn update_application(&self, app: &VerificationApplication) -> StoreResult<()>;

    // --- projects ---

    fn insert_project(&self, project: Project) -> StoreResult<()>;

    fn get_project(&self, project_id: Uuid) -> StoreResult<Option<Project>>;

    fn list_projects_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Project>>;

    fn append_comment(&self, project_id: Uuid, comment: Comment) -> StoreResult<()>;

    /// Add a collaborator with set semantics and recount in one atomic
    /// step. Returns the resulting collaborator count.
    fn add_collaborator(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<u32>;

    fn count_projects_by_author(&self, author_id: Uuid) -> StoreResult<u64>;

    /// Number of projects where the user appears as a collaborator
    fn count_collaborations(&self, user_id: Uuid) -> StoreResult<u64>;

    // --- collaboration requests ---

    /// Insert a new request. Fails with `DuplicateRequest` if one already
    /// exists for the same (project, requester) pair.
    fn insert_collab_request(&self, request: CollaborationRequest) -> StoreResult<()>;

    /// Insert unless a request for the same (project, requester) pair
    /// exists; returns the surviving record either way. Used by the lazy
    /// legacy-comment migration, which must be idempotent.
    fn upsert_collab_request(
        &self,
        request: CollaborationRequest,
    ) -> StoreResult<CollaborationRequest>;

    fn get_collab_request(
        &self,
        project_id: Uuid,
        requester_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>>;

    fn get_collab_request_by_comment(
        &self,
        project_id: Uuid,
        comment_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>>;

    fn list_collab_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> StoreResult<Vec<CollaborationRequest>>;

    fn set_collab_request_status(
        &self,
        id: Uuid,
        status: CollabStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // --- funding/certificate requests ---

    fn insert_tracked_request(&self, request: TrackedRequest) -> StoreResult<()>;

    fn get_tracked_request(&self, id: Uuid) -> StoreResult<Option<TrackedRequest>>;

    fn set_tracked_request_status(
        &self,
        id: Uuid,
        status: TrackedStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Flip every listed request that is not already submitted to
    /// submitted, skipping unknown ids. Returns the affected requests.
    fn mark_requests_submitted(&self, ids: &[Uuid]) -> StoreResult<Vec<TrackedRequest>>;

    // --- notifications ---

    fn insert_notification(&self, notification: Notification) -> StoreResult<()>;

    /// All notifications for a recipient, newest first
    fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;

    /// Mark one notification read. Returns false when the id does not
    /// belong to this recipient.
    fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Mark every unread notification read, returning the flip count
    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64>;
}

/// Trait for session storage
pub trait SessionStore: Send + Sync {
    /// Create a new session for a user
    fn create(&self, user_id: Uuid) -> StoreResult<Session>;

    /// Get a session by ID
    fn get(&self, session_id: &SessionId) -> StoreResult<Option<Session>>;

    /// Delete a session
    fn delete(&self, session_id: &SessionId) -> StoreResult<()>;
}
