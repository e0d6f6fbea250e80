//! SQLite-based storage implementation
//!
//! The two uniqueness invariants live in the schema itself: a partial
//! unique index keeps a user to one pending/approved application, and a
//! unique index keeps a (project, requester) pair to one collaboration
//! request. Concurrent check-then-insert races lose at the index, not in
//! application code.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use uuid::Uuid;

use super::{
    ApplicantType, ApplicationStatus, CollabStatus, CollaborationRequest, Comment, Notification,
    PortalStore, Project, Role, Sector, StoreResult, TrackedKind, TrackedRequest, TrackedStatus,
    User, VerificationApplication,
};
use crate::error::PortalError;
use crate::notify::NotificationKind;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQLite-based portal store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn internal<E: std::fmt::Display>(err: E) -> PortalError {
    PortalError::Internal(err.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(internal)
}

fn opt_ts(s: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_uuid(s: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(s).map_err(internal)
}

fn opt_uuid(s: Option<String>) -> StoreResult<Option<Uuid>> {
    s.as_deref().map(parse_uuid).transpose()
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: &str) -> Result<Self, PortalError> {
        let conn = Connection::open(path).map_err(internal)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(internal)?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run database migrations
    fn migrate(conn: &Connection) -> Result<(), PortalError> {
        let current_version = Self::get_schema_version(conn)?;

        if current_version < SCHEMA_VERSION {
            tracing::info!(
                current = current_version,
                target = SCHEMA_VERSION,
                "Running database migrations"
            );

            if current_version < 1 {
                Self::migrate_v1(conn)?;
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(internal)?;

            tracing::info!("Database migrations complete");
        }

        Ok(())
    }

    /// Get current schema version (0 if no schema exists)
    fn get_schema_version(conn: &Connection) -> Result<i32, PortalError> {
        let table_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                [],
                |row| row.get(0),
            )
            .map_err(internal)?;

        if !table_exists {
            return Ok(0);
        }

        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .map_err(internal)
        .map(|v| v.unwrap_or(0))
    }

    fn migrate_v1(conn: &Connection) -> Result<(), PortalError> {
        conn.execute_batch(
            "
            CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                role TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 0,
                github_username TEXT,
                github_url TEXT,
                avatar_url TEXT,
                suspension_reason TEXT,
                suspended_at TEXT,
                follower_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE applications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                applicant_type TEXT NOT NULL,
                sector TEXT NOT NULL,
                project_title TEXT NOT NULL,
                project_description TEXT NOT NULL,
                github_username TEXT,
                team_members TEXT NOT NULL DEFAULT '[]',
                duration TEXT,
                status TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                reviewed_at TEXT,
                reviewed_by TEXT,
                rejection_reason TEXT
            );

            -- At most one pending/approved application per user
            CREATE UNIQUE INDEX idx_applications_active
                ON applications(user_id)
                WHERE status IN ('pending', 'approved');

            CREATE TABLE projects (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                collaborator_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE project_comments (
                comment_id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE project_collaborators (
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                UNIQUE(project_id, user_id)
            );

            CREATE TABLE collab_requests (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                requester_id TEXT NOT NULL,
                comment_id TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(project_id, requester_id)
            );

            CREATE TABLE tracked_requests (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                data TEXT NOT NULL DEFAULT '{}',
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id);
            CREATE INDEX idx_collab_requests_owner ON collab_requests(owner_id);
            ",
        )
        .map_err(internal)
    }

    fn user_from_row(row: &Row<'_>) -> rusqlite::Result<RawUser> {
        Ok(RawUser {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            role: row.get("role")?,
            verified: row.get("verified")?,
            github_username: row.get("github_username")?,
            github_url: row.get("github_url")?,
            avatar_url: row.get("avatar_url")?,
            suspension_reason: row.get("suspension_reason")?,
            suspended_at: row.get("suspended_at")?,
            follower_count: row.get("follower_count")?,
            created_at: row.get("created_at")?,
        })
    }

    fn application_from_row(row: &Row<'_>) -> rusqlite::Result<RawApplication> {
        Ok(RawApplication {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            applicant_type: row.get("applicant_type")?,
            sector: row.get("sector")?,
            project_title: row.get("project_title")?,
            project_description: row.get("project_description")?,
            github_username: row.get("github_username")?,
            team_members: row.get("team_members")?,
            duration: row.get("duration")?,
            status: row.get("status")?,
            submitted_at: row.get("submitted_at")?,
            reviewed_at: row.get("reviewed_at")?,
            reviewed_by: row.get("reviewed_by")?,
            rejection_reason: row.get("rejection_reason")?,
        })
    }

    fn collab_from_row(row: &Row<'_>) -> rusqlite::Result<RawCollabRequest> {
        Ok(RawCollabRequest {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            owner_id: row.get("owner_id")?,
            requester_id: row.get("requester_id")?,
            comment_id: row.get("comment_id")?,
            message: row.get("message")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn tracked_from_row(row: &Row<'_>) -> rusqlite::Result<RawTrackedRequest> {
        Ok(RawTrackedRequest {
            id: row.get("id")?,
            kind: row.get("kind")?,
            user_id: row.get("user_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn load_project(conn: &Connection, project_id: &str) -> StoreResult<Option<Project>> {
        let header = conn
            .query_row(
                "SELECT id, author_id, title, description, collaborator_count, created_at
                 FROM projects WHERE id = ?1",
                params![project_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(internal)?;

        let (id, author_id, title, description, collaborator_count, created_at) = match header {
            Some(h) => h,
            None => return Ok(None),
        };

        let mut stmt = conn
            .prepare(
                "SELECT comment_id, user_id, user_name, content, created_at
                 FROM project_comments WHERE project_id = ?1 ORDER BY created_at",
            )
            .map_err(internal)?;
        let raw_comments: Vec<(String, String, String, String, String)> = stmt
            .query_map(params![project_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;

        let mut comments = Vec::with_capacity(raw_comments.len());
        for (comment_id, user_id, user_name, content, created_at) in raw_comments {
            comments.push(Comment {
                comment_id: parse_uuid(&comment_id)?,
                user_id: parse_uuid(&user_id)?,
                user_name,
                content,
                created_at: parse_ts(&created_at)?,
            });
        }

        let mut stmt = conn
            .prepare("SELECT user_id FROM project_collaborators WHERE project_id = ?1")
            .map_err(internal)?;
        let raw_collaborators: Vec<String> = stmt
            .query_map(params![project_id], |row| row.get(0))
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;
        let collaborator_ids = raw_collaborators
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(Project {
            id: parse_uuid(&id)?,
            author_id: parse_uuid(&author_id)?,
            title,
            description,
            comments,
            collaborator_ids,
            collaborator_count,
            created_at: parse_ts(&created_at)?,
        }))
    }
}

/// Raw user row before enum/uuid/timestamp decoding
struct RawUser {
    id: String,
    name: String,
    email: String,
    password_hash: Option<String>,
    role: String,
    verified: bool,
    github_username: Option<String>,
    github_url: Option<String>,
    avatar_url: Option<String>,
    suspension_reason: Option<String>,
    suspended_at: Option<String>,
    follower_count: u32,
    created_at: String,
}

impl RawUser {
    fn decode(self) -> StoreResult<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role: Role::from_str(&self.role)
                .ok_or_else(|| internal(format!("unknown role: {}", self.role)))?,
            verified: self.verified,
            github_username: self.github_username,
            github_url: self.github_url,
            avatar_url: self.avatar_url,
            suspension_reason: self.suspension_reason,
            suspended_at: opt_ts(self.suspended_at)?,
            follower_count: self.follower_count,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

struct RawApplication {
    id: String,
    user_id: String,
    applicant_type: String,
    sector: String,
    project_title: String,
    project_description: String,
    github_username: Option<String>,
    team_members: String,
    duration: Option<String>,
    status: String,
    submitted_at: String,
    reviewed_at: Option<String>,
    reviewed_by: Option<String>,
    rejection_reason: Option<String>,
}

impl RawApplication {
    fn decode(self) -> StoreResult<VerificationApplication> {
        let applicant_type = match self.applicant_type.as_str() {
            "individual" => ApplicantType::Individual,
            "team" => ApplicantType::Team,
            other => return Err(internal(format!("unknown applicant type: {other}"))),
        };
        Ok(VerificationApplication {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            applicant_type,
            sector: Sector::from_str(&self.sector)
                .ok_or_else(|| internal(format!("unknown sector: {}", self.sector)))?,
            project_title: self.project_title,
            project_description: self.project_description,
            github_username: self.github_username,
            team_members: serde_json::from_str(&self.team_members).map_err(internal)?,
            duration: self.duration,
            status: ApplicationStatus::from_str(&self.status)
                .ok_or_else(|| internal(format!("unknown status: {}", self.status)))?,
            submitted_at: parse_ts(&self.submitted_at)?,
            reviewed_at: opt_ts(self.reviewed_at)?,
            reviewed_by: opt_uuid(self.reviewed_by)?,
            rejection_reason: self.rejection_reason,
        })
    }
}

struct RawCollabRequest {
    id: String,
    project_id: String,
    owner_id: String,
    requester_id: String,
    comment_id: String,
    message: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl RawCollabRequest {
    fn decode(self) -> StoreResult<CollaborationRequest> {
        Ok(CollaborationRequest {
            id: parse_uuid(&self.id)?,
            project_id: parse_uuid(&self.project_id)?,
            owner_id: parse_uuid(&self.owner_id)?,
            requester_id: parse_uuid(&self.requester_id)?,
            comment_id: parse_uuid(&self.comment_id)?,
            message: self.message,
            status: CollabStatus::from_str(&self.status)
                .ok_or_else(|| internal(format!("unknown status: {}", self.status)))?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

struct RawTrackedRequest {
    id: String,
    kind: String,
    user_id: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl RawTrackedRequest {
    fn decode(self) -> StoreResult<TrackedRequest> {
        Ok(TrackedRequest {
            id: parse_uuid(&self.id)?,
            kind: TrackedKind::from_str(&self.kind)
                .ok_or_else(|| internal(format!("unknown kind: {}", self.kind)))?,
            user_id: parse_uuid(&self.user_id)?,
            status: TrackedStatus::from_str(&self.status)
                .ok_or_else(|| internal(format!("unknown status: {}", self.status)))?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl PortalStore for SqliteStore {
    fn insert_user(&self, user: User) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, role, verified,
                github_username, github_url, avatar_url, suspension_reason,
                suspended_at, follower_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                user.id.to_string(),
                user.name,
                user.email.to_lowercase(),
                user.password_hash,
                user.role.as_str(),
                user.verified,
                user.github_username,
                user.github_url,
                user.avatar_url,
                user.suspension_reason,
                user.suspended_at.map(ts),
                user.follower_count,
                ts(user.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => Err(PortalError::EmailAlreadyExists),
            Err(err) => Err(internal(err)),
        }
    }

    fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE id = ?1",
            params![user_id.to_string()],
            Self::user_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawUser::decode)
        .transpose()
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email.to_lowercase()],
            Self::user_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawUser::decode)
        .transpose()
    }

    fn set_user_verified(&self, user_id: Uuid, verified: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE users SET verified = ?1 WHERE id = ?2",
                params![verified, user_id.to_string()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::UserNotFound);
        }
        Ok(())
    }

    fn set_user_github(&self, user_id: Uuid, username: &str, url: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE users SET github_username = ?1, github_url = ?2 WHERE id = ?3",
                params![username, url, user_id.to_string()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::UserNotFound);
        }
        Ok(())
    }

    fn set_user_suspension(
        &self,
        user_id: Uuid,
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE users SET suspension_reason = ?1, suspended_at = ?2 WHERE id = ?3",
                params![reason, at.map(ts), user_id.to_string()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::UserNotFound);
        }
        Ok(())
    }

    fn list_moderators(&self) -> StoreResult<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT * FROM users WHERE role IN ('admin', 'superadmin')")
            .map_err(internal)?;
        let raw: Vec<RawUser> = stmt
            .query_map([], Self::user_from_row)
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;
        raw.into_iter().map(RawUser::decode).collect()
    }

    fn insert_application(&self, app: VerificationApplication) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO applications (id, user_id, applicant_type, sector,
                project_title, project_description, github_username, team_members,
                duration, status, submitted_at, reviewed_at, reviewed_by,
                rejection_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                app.id.to_string(),
                app.user_id.to_string(),
                match app.applicant_type {
                    ApplicantType::Individual => "individual",
                    ApplicantType::Team => "team",
                },
                app.sector.as_str(),
                app.project_title,
                app.project_description,
                app.github_username,
                serde_json::to_string(&app.team_members).map_err(internal)?,
                app.duration,
                app.status.as_str(),
                ts(app.submitted_at),
                app.reviewed_at.map(ts),
                app.reviewed_by.map(|id| id.to_string()),
                app.rejection_reason,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            // Lost the race at idx_applications_active
            Err(err) if is_constraint_violation(&err) => Err(PortalError::DuplicateApplication),
            Err(err) => Err(internal(err)),
        }
    }

    fn get_application(&self, id: Uuid) -> StoreResult<Option<VerificationApplication>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM applications WHERE id = ?1",
            params![id.to_string()],
            Self::application_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawApplication::decode)
        .transpose()
    }

    fn active_application(&self, user_id: Uuid) -> StoreResult<Option<VerificationApplication>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM applications
             WHERE user_id = ?1 AND status IN ('pending', 'approved')",
            params![user_id.to_string()],
            Self::application_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawApplication::decode)
        .transpose()
    }

    fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> StoreResult<Vec<VerificationApplication>> {
        let conn = self.conn.lock().unwrap();
        let raw: Vec<RawApplication> = match status {
            Some(status) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT * FROM applications WHERE status = ?1
                         ORDER BY submitted_at DESC",
                    )
                    .map_err(internal)?;
                let rows = stmt
                    .query_map(params![status.as_str()], Self::application_from_row)
                    .map_err(internal)?
                    .collect::<Result<_, _>>()
                    .map_err(internal)?;
                rows
            }
            None => {
                let mut stmt = conn
                    .prepare("SELECT * FROM applications ORDER BY submitted_at DESC")
                    .map_err(internal)?;
                let rows = stmt
                    .query_map([], Self::application_from_row)
                    .map_err(internal)?
                    .collect::<Result<_, _>>()
                    .map_err(internal)?;
                rows
            }
        };
        raw.into_iter().map(RawApplication::decode).collect()
    }

    fn update_application(&self, app: &VerificationApplication) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE applications SET status = ?1, reviewed_at = ?2,
                    reviewed_by = ?3, rejection_reason = ?4
                 WHERE id = ?5",
                params![
                    app.status.as_str(),
                    app.reviewed_at.map(ts),
                    app.reviewed_by.map(|id| id.to_string()),
                    app.rejection_reason,
                    app.id.to_string(),
                ],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::ApplicationNotFound);
        }
        Ok(())
    }

    fn insert_project(&self, project: Project) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO projects (id, author_id, title, description,
                collaborator_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id.to_string(),
                project.author_id.to_string(),
                project.title,
                project.description,
                project.collaborator_count,
                ts(project.created_at),
            ],
        )
        .map_err(internal)?;

        for comment in &project.comments {
            conn.execute(
                "INSERT INTO project_comments (comment_id, project_id, user_id,
                    user_name, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.comment_id.to_string(),
                    project.id.to_string(),
                    comment.user_id.to_string(),
                    comment.user_name,
                    comment.content,
                    ts(comment.created_at),
                ],
            )
            .map_err(internal)?;
        }
        for collaborator in &project.collaborator_ids {
            conn.execute(
                "INSERT OR IGNORE INTO project_collaborators (project_id, user_id)
                 VALUES (?1, ?2)",
                params![project.id.to_string(), collaborator.to_string()],
            )
            .map_err(internal)?;
        }

        Ok(())
    }

    fn get_project(&self, project_id: Uuid) -> StoreResult<Option<Project>> {
        let conn = self.conn.lock().unwrap();
        Self::load_project(&conn, &project_id.to_string())
    }

    fn list_projects_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Project>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT id FROM projects WHERE author_id = ?1")
            .map_err(internal)?;
        let ids: Vec<String> = stmt
            .query_map(params![author_id.to_string()], |row| row.get(0))
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;
        drop(stmt);

        let mut projects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(project) = Self::load_project(&conn, &id)? {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    fn append_comment(&self, project_id: Uuid, comment: Comment) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
                params![project_id.to_string()],
                |row| row.get(0),
            )
            .map_err(internal)?;
        if !exists {
            return Err(PortalError::ProjectNotFound);
        }

        conn.execute(
            "INSERT INTO project_comments (comment_id, project_id, user_id,
                user_name, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.comment_id.to_string(),
                project_id.to_string(),
                comment.user_id.to_string(),
                comment.user_name,
                comment.content,
                ts(comment.created_at),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn add_collaborator(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<u32> {
        // Insert and recount under one connection lock, so the stored
        // count always matches the set.
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
                params![project_id.to_string()],
                |row| row.get(0),
            )
            .map_err(internal)?;
        if !exists {
            return Err(PortalError::ProjectNotFound);
        }

        conn.execute(
            "INSERT OR IGNORE INTO project_collaborators (project_id, user_id)
             VALUES (?1, ?2)",
            params![project_id.to_string(), user_id.to_string()],
        )
        .map_err(internal)?;

        let count: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM project_collaborators WHERE project_id = ?1",
                params![project_id.to_string()],
                |row| row.get(0),
            )
            .map_err(internal)?;

        conn.execute(
            "UPDATE projects SET collaborator_count = ?1 WHERE id = ?2",
            params![count, project_id.to_string()],
        )
        .map_err(internal)?;

        Ok(count)
    }

    fn count_projects_by_author(&self, author_id: Uuid) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE author_id = ?1",
            params![author_id.to_string()],
            |row| row.get(0),
        )
        .map_err(internal)
    }

    fn count_collaborations(&self, user_id: Uuid) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM project_collaborators WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| row.get(0),
        )
        .map_err(internal)
    }

    fn insert_collab_request(&self, request: CollaborationRequest) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO collab_requests (id, project_id, owner_id, requester_id,
                comment_id, message, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                request.id.to_string(),
                request.project_id.to_string(),
                request.owner_id.to_string(),
                request.requester_id.to_string(),
                request.comment_id.to_string(),
                request.message,
                request.status.as_str(),
                ts(request.created_at),
                ts(request.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_constraint_violation(&err) => {
                // Lost the race at the (project, requester) index; report
                // the surviving record's status.
                let existing = conn
                    .query_row(
                        "SELECT * FROM collab_requests
                         WHERE project_id = ?1 AND requester_id = ?2",
                        params![
                            request.project_id.to_string(),
                            request.requester_id.to_string()
                        ],
                        Self::collab_from_row,
                    )
                    .optional()
                    .map_err(internal)?
                    .map(RawCollabRequest::decode)
                    .transpose()?;
                let project_title: Option<String> = conn
                    .query_row(
                        "SELECT title FROM projects WHERE id = ?1",
                        params![request.project_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(internal)?;
                Err(PortalError::DuplicateRequest {
                    status: existing.map(|r| r.status).unwrap_or(CollabStatus::Pending),
                    project_title: project_title.unwrap_or_default(),
                })
            }
            Err(err) => Err(internal(err)),
        }
    }

    fn upsert_collab_request(
        &self,
        request: CollaborationRequest,
    ) -> StoreResult<CollaborationRequest> {
        let conn = self.conn.lock().unwrap();
        let existing = conn
            .query_row(
                "SELECT * FROM collab_requests
                 WHERE project_id = ?1 AND requester_id = ?2",
                params![
                    request.project_id.to_string(),
                    request.requester_id.to_string()
                ],
                Self::collab_from_row,
            )
            .optional()
            .map_err(internal)?;

        if let Some(raw) = existing {
            return raw.decode();
        }

        conn.execute(
            "INSERT INTO collab_requests (id, project_id, owner_id, requester_id,
                comment_id, message, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                request.id.to_string(),
                request.project_id.to_string(),
                request.owner_id.to_string(),
                request.requester_id.to_string(),
                request.comment_id.to_string(),
                request.message,
                request.status.as_str(),
                ts(request.created_at),
                ts(request.updated_at),
            ],
        )
        .map_err(internal)?;
        Ok(request)
    }

    fn get_collab_request(
        &self,
        project_id: Uuid,
        requester_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM collab_requests WHERE project_id = ?1 AND requester_id = ?2",
            params![project_id.to_string(), requester_id.to_string()],
            Self::collab_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawCollabRequest::decode)
        .transpose()
    }

    fn get_collab_request_by_comment(
        &self,
        project_id: Uuid,
        comment_id: Uuid,
    ) -> StoreResult<Option<CollaborationRequest>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM collab_requests WHERE project_id = ?1 AND comment_id = ?2",
            params![project_id.to_string(), comment_id.to_string()],
            Self::collab_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawCollabRequest::decode)
        .transpose()
    }

    fn list_collab_requests_for_owner(
        &self,
        owner_id: Uuid,
    ) -> StoreResult<Vec<CollaborationRequest>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM collab_requests WHERE owner_id = ?1
                 ORDER BY created_at DESC",
            )
            .map_err(internal)?;
        let raw: Vec<RawCollabRequest> = stmt
            .query_map(params![owner_id.to_string()], Self::collab_from_row)
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;
        raw.into_iter().map(RawCollabRequest::decode).collect()
    }

    fn set_collab_request_status(
        &self,
        id: Uuid,
        status: CollabStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE collab_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(updated_at), id.to_string()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::RequestNotFound);
        }
        Ok(())
    }

    fn insert_tracked_request(&self, request: TrackedRequest) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracked_requests (id, kind, user_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.id.to_string(),
                request.kind.as_str(),
                request.user_id.to_string(),
                request.status.as_str(),
                ts(request.created_at),
                ts(request.updated_at),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn get_tracked_request(&self, id: Uuid) -> StoreResult<Option<TrackedRequest>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM tracked_requests WHERE id = ?1",
            params![id.to_string()],
            Self::tracked_from_row,
        )
        .optional()
        .map_err(internal)?
        .map(RawTrackedRequest::decode)
        .transpose()
    }

    fn set_tracked_request_status(
        &self,
        id: Uuid,
        status: TrackedStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE tracked_requests SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), ts(updated_at), id.to_string()],
            )
            .map_err(internal)?;
        if changed == 0 {
            return Err(PortalError::RequestNotFound);
        }
        Ok(())
    }

    fn mark_requests_submitted(&self, ids: &[Uuid]) -> StoreResult<Vec<TrackedRequest>> {
        let conn = self.conn.lock().unwrap();
        let now = ts(Utc::now());
        let mut affected = Vec::new();

        for id in ids {
            let changed = conn
                .execute(
                    "UPDATE tracked_requests SET status = 'submitted', updated_at = ?1
                     WHERE id = ?2 AND status != 'submitted'",
                    params![now, id.to_string()],
                )
                .map_err(internal)?;
            if changed > 0 {
                let raw = conn
                    .query_row(
                        "SELECT * FROM tracked_requests WHERE id = ?1",
                        params![id.to_string()],
                        Self::tracked_from_row,
                    )
                    .map_err(internal)?;
                affected.push(raw.decode()?);
            }
        }

        Ok(affected)
    }

    fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO notifications (id, user_id, kind, title, message, data,
                is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id.to_string(),
                notification.user_id.to_string(),
                notification.kind.as_str(),
                notification.title,
                notification.message,
                notification.data.to_string(),
                notification.read,
                ts(notification.created_at),
            ],
        )
        .map_err(internal)?;
        Ok(())
    }

    fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, kind, title, message, data, is_read, created_at
                 FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC",
            )
            .map_err(internal)?;
        let raw: Vec<(String, String, String, String, String, String, bool, String)> = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .map_err(internal)?
            .collect::<Result<_, _>>()
            .map_err(internal)?;

        let mut notifications = Vec::with_capacity(raw.len());
        for (id, user_id, kind, title, message, data, read, created_at) in raw {
            notifications.push(Notification {
                id: parse_uuid(&id)?,
                user_id: parse_uuid(&user_id)?,
                kind: NotificationKind::from_str(&kind)
                    .ok_or_else(|| internal(format!("unknown notification kind: {kind}")))?,
                title,
                message,
                data: serde_json::from_str(&data).map_err(internal)?,
                read,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(notifications)
    }

    fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )
            .map_err(internal)?;
        Ok(changed > 0)
    }

    fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                params![user_id.to_string()],
            )
            .map_err(internal)?;
        Ok(changed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ApplicantType;

    fn open_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.db");
        let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
        (store, dir)
    }

    fn application(user_id: Uuid) -> VerificationApplication {
        VerificationApplication {
            id: Uuid::new_v4(),
            user_id,
            applicant_type: ApplicantType::Individual,
            sector: Sector::Health,
            project_title: "Clinic".to_string(),
            project_description: "A clinic finder".to_string(),
            github_username: None,
            team_members: vec!["a".to_string()],
            duration: Some("6 months".to_string()),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn test_application_unique_index() {
        let (store, _dir) = open_store();
        let user_id = Uuid::new_v4();

        store.insert_application(application(user_id)).unwrap();
        let err = store.insert_application(application(user_id)).unwrap_err();
        assert!(matches!(err, PortalError::DuplicateApplication));

        // Rejecting frees the slot
        let mut app = store.active_application(user_id).unwrap().unwrap();
        app.status = ApplicationStatus::Rejected;
        app.rejection_reason = Some("incomplete".to_string());
        store.update_application(&app).unwrap();
        store.insert_application(application(user_id)).unwrap();
    }

    #[test]
    fn test_application_round_trip() {
        let (store, _dir) = open_store();
        let user_id = Uuid::new_v4();
        let app = application(user_id);
        store.insert_application(app.clone()).unwrap();

        let loaded = store.get_application(app.id).unwrap().unwrap();
        assert_eq!(loaded.sector, Sector::Health);
        assert_eq!(loaded.team_members, vec!["a".to_string()]);
        assert_eq!(loaded.status, ApplicationStatus::Pending);
    }

    #[test]
    fn test_collab_request_unique_index() {
        let (store, _dir) = open_store();
        let owner = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let project = Project::new(owner, "Rover", "A rover");
        let project_id = project.id;
        store.insert_project(project).unwrap();

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
        store.insert_collab_request(request.clone()).unwrap();

        let mut second = request;
        second.id = Uuid::new_v4();
        second.comment_id = Uuid::new_v4();
        let err = store.insert_collab_request(second).unwrap_err();
        match err {
            PortalError::DuplicateRequest { project_title, .. } => {
                assert_eq!(project_title, "Rover");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_project_with_comments_round_trip() {
        let (store, _dir) = open_store();
        let owner = Uuid::new_v4();
        let commenter = Uuid::new_v4();
        let project = Project::new(owner, "Rover", "A rover");
        let project_id = project.id;
        store.insert_project(project).unwrap();

        store
            .append_comment(
                project_id,
                Comment {
                    comment_id: Uuid::new_v4(),
                    user_id: commenter,
                    user_name: "Req".to_string(),
                    content: "[COLLAB REQUEST] hello".to_string(),
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        store.add_collaborator(project_id, commenter).unwrap();

        let loaded = store.get_project(project_id).unwrap().unwrap();
        assert_eq!(loaded.comments.len(), 1);
        assert_eq!(loaded.collaborator_ids, vec![commenter]);
        assert_eq!(loaded.collaborator_count, 1);
    }
}
