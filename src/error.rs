//! Portal error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::store::CollabStatus;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("User not found")]
    UserNotFound,

    #[error("Project not found")]
    ProjectNotFound,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("Request not found")]
    RequestNotFound,

    #[error("Notification not found")]
    NotificationNotFound,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    EmailAlreadyExists,

    #[error("Admin access required")]
    ModeratorRequired,

    #[error("Only the project owner can manage collaboration requests")]
    NotProjectOwner,

    #[error("Project owners cannot request collaboration on their own project")]
    OwnerCollabRequest,

    #[error("Invalid sector: {0}")]
    InvalidSector(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("An application is already pending or approved for this user")]
    DuplicateApplication,

    #[error("A collaboration request already exists for this project")]
    DuplicateRequest {
        status: CollabStatus,
        project_title: String,
    },

    #[error("This collaboration request has already been {}", status.as_str())]
    AlreadyProcessed { status: CollabStatus },

    #[error("A submitted request cannot return to pending")]
    IrreversibleTransition,

    #[error("This request has already been submitted")]
    AlreadySubmitted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            PortalError::UserNotFound
            | PortalError::ProjectNotFound
            | PortalError::ApplicationNotFound
            | PortalError::RequestNotFound
            | PortalError::NotificationNotFound => StatusCode::NOT_FOUND,

            PortalError::NotAuthenticated | PortalError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }

            PortalError::ModeratorRequired
            | PortalError::NotProjectOwner
            | PortalError::OwnerCollabRequest => StatusCode::FORBIDDEN,

            PortalError::InvalidSector(_) | PortalError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }

            PortalError::EmailAlreadyExists
            | PortalError::DuplicateApplication
            | PortalError::DuplicateRequest { .. }
            | PortalError::AlreadyProcessed { .. }
            | PortalError::IrreversibleTransition
            | PortalError::AlreadySubmitted => StatusCode::CONFLICT,

            PortalError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };

        // Conflict errors carry enough structure for the client to render
        // a specific message rather than a generic failure.
        let body = match &self {
            PortalError::DuplicateRequest {
                status,
                project_title,
            } => json!({
                "error": self.to_string(),
                "status": status.as_str(),
                "projectTitle": project_title,
            }),
            PortalError::AlreadyProcessed { status } => json!({
                "error": self.to_string(),
                "status": status.as_str(),
            }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
