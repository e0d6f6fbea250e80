//! Data models for portal storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Whether this role may review applications and manage request status
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// A portal account (innovators and moderators share one collection,
/// discriminated by role)
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// None for OAuth-only accounts
    pub password_hash: Option<String>,
    pub role: Role,
    /// True after an approved verification application; moderators are
    /// verified at creation
    pub verified: bool,
    pub github_username: Option<String>,
    pub github_url: Option<String>,
    pub avatar_url: Option<String>,
    pub suspension_reason: Option<String>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub follower_count: u32,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: &str, password_hash: Option<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_lowercase(),
            password_hash,
            role,
            verified: role.can_moderate(),
            github_username: None,
            github_url: None,
            avatar_url: None,
            suspension_reason: None,
            suspended_at: None,
            follower_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Allowed innovation sectors for a verification application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sector {
    Education,
    Technology,
    Agriculture,
    Health,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Education => "Education",
            Sector::Technology => "Technology",
            Sector::Agriculture => "Agriculture",
            Sector::Health => "Health",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Education" => Some(Sector::Education),
            "Technology" => Some(Sector::Technology),
            "Agriculture" => Some(Sector::Agriculture),
            "Health" => Some(Sector::Health),
            _ => None,
        }
    }
}

/// Whether an application is filed by an individual or a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicantType {
    Individual,
    Team,
}

/// Verification application lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApplicationStatus::Pending),
            "under_review" => Some(ApplicationStatus::UnderReview),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }

    /// A pending or approved application blocks a new submission
    pub fn blocks_resubmission(&self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Approved)
    }
}

/// A user's request to be recognized as a verified innovator
#[derive(Debug, Clone)]
pub struct VerificationApplication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub applicant_type: ApplicantType,
    pub sector: Sector,
    pub project_title: String,
    pub project_description: String,
    /// Self-reported GitHub handle, copied onto the user on approval
    pub github_username: Option<String>,
    pub team_members: Vec<String>,
    pub duration: Option<String>,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
}

/// A freeform comment embedded in a project. Content beginning with
/// [`COLLAB_MARKER`](crate::collaboration::COLLAB_MARKER) is the legacy
/// encoding of a collaboration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A showcased project (fields relevant to the collaboration workflow)
#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub comments: Vec<Comment>,
    pub collaborator_ids: Vec<Uuid>,
    pub collaborator_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(author_id: Uuid, title: &str, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: title.to_string(),
            description: description.to_string(),
            comments: Vec::new(),
            collaborator_ids: Vec::new(),
            collaborator_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Collaboration request lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollabStatus {
    Pending,
    Accepted,
    Rejected,
}

impl CollabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollabStatus::Pending => "pending",
            CollabStatus::Accepted => "accepted",
            CollabStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CollabStatus::Pending),
            "accepted" => Some(CollabStatus::Accepted),
            "rejected" => Some(CollabStatus::Rejected),
            _ => None,
        }
    }
}

/// A structured collaboration request. Authoritative over the legacy
/// comment-embedded encoding; `comment_id` correlates the two.
#[derive(Debug, Clone)]
pub struct CollaborationRequest {
    pub id: Uuid,
    pub project_id: Uuid,
    /// The project author at request time
    pub owner_id: Uuid,
    pub requester_id: Uuid,
    pub comment_id: Uuid,
    pub message: String,
    pub status: CollabStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind discriminator for tracked (funding/certificate) requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedKind {
    Funding,
    Certificate,
}

impl TrackedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedKind::Funding => "funding",
            TrackedKind::Certificate => "certificate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "funding" => Some(TrackedKind::Funding),
            "certificate" => Some(TrackedKind::Certificate),
            _ => None,
        }
    }
}

/// Funding/certificate request status. Monotonic: once submitted, a
/// request never returns to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedStatus {
    Pending,
    Submitted,
}

impl TrackedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedStatus::Pending => "pending",
            TrackedStatus::Submitted => "submitted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TrackedStatus::Pending),
            "submitted" => Some(TrackedStatus::Submitted),
            _ => None,
        }
    }
}

/// A funding or certificate request tracked by the admin surface
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub id: Uuid,
    pub kind: TrackedKind,
    pub user_id: Uuid,
    pub status: TrackedStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedRequest {
    pub fn new(kind: TrackedKind, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            user_id,
            status: TrackedStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A notification delivered to one recipient
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: crate::notify::NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// An authenticated session
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
