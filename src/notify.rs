//! Best-effort notification emission
//!
//! Notifications are side effects of workflow transitions. A failed insert
//! is logged and swallowed; it never fails the parent operation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{Notification, PortalStore};

/// Closed set of notification kinds. Wire tags match the legacy portal's
/// string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "application_update")]
    ApplicationUpdate,
    #[serde(rename = "collab-request")]
    CollabRequest,
    #[serde(rename = "collab-response")]
    CollabResponse,
    #[serde(rename = "request-status")]
    RequestStatus,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ApplicationUpdate => "application_update",
            NotificationKind::CollabRequest => "collab-request",
            NotificationKind::CollabResponse => "collab-response",
            NotificationKind::RequestStatus => "request-status",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "application_update" => Some(NotificationKind::ApplicationUpdate),
            "collab-request" => Some(NotificationKind::CollabRequest),
            "collab-response" => Some(NotificationKind::CollabResponse),
            "request-status" => Some(NotificationKind::RequestStatus),
            _ => None,
        }
    }
}

/// Append a notification for one recipient, swallowing storage errors
pub fn emit<P: PortalStore>(
    store: &P,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Value,
) {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        kind,
        title: title.to_string(),
        message: message.to_string(),
        data,
        read: false,
        created_at: Utc::now(),
    };

    if let Err(err) = store.insert_notification(notification) {
        tracing::warn!(
            recipient = %user_id,
            kind = kind.as_str(),
            "Failed to deliver notification: {}",
            err
        );
    }
}

/// Fan out one notification per recipient
pub fn emit_to_all<P: PortalStore>(
    store: &P,
    recipients: &[Uuid],
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: Value,
) {
    for user_id in recipients {
        emit(store, *user_id, kind, title, message, data.clone());
    }
}
