//! Notification read endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::error::PortalError;
use crate::notify::NotificationKind;
use crate::state::AppState;
use crate::store::{Notification, PortalStore, SessionStore};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            data: n.data,
            read: n.read,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationView>,
}

/// GET /notifications
pub async fn list_notifications<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
) -> Result<Json<NotificationsResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    let notifications = state
        .store
        .list_notifications(user.id)?
        .into_iter()
        .map(NotificationView::from)
        .collect();
    Ok(Json(NotificationsResponse { notifications }))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub message: String,
}

/// POST /notifications/:id/read
pub async fn mark_read<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    if !state.store.mark_notification_read(user.id, notification_id)? {
        return Err(PortalError::NotificationNotFound);
    }
    Ok(Json(MarkReadResponse {
        message: "Notification marked read".to_string(),
    }))
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub updated: u64,
}

/// POST /notifications/read-all
pub async fn mark_all_read<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
) -> Result<Json<MarkAllReadResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = super::session::current_user(&cookies, &state)?;
    let updated = state.store.mark_all_notifications_read(user.id)?;
    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked read".to_string(),
        updated,
    }))
}
