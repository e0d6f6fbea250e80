//! HTTP routes for the portal

mod admin;
mod auth;
mod notifications;
mod projects;
pub mod session;
mod verification;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::store::{PortalStore, SessionStore};

/// Create the router with all routes
pub fn create_router<P, S>(state: Arc<AppState<P, S>>) -> Router
where
    P: PortalStore + 'static,
    S: SessionStore + 'static,
{
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/verification", post(verification::submit_application))
        .route("/verification/check/:user_id", get(verification::check_status))
        .route("/admin/applications", get(admin::list_applications))
        .route(
            "/admin/applications/:id/approve",
            post(admin::approve_application),
        )
        .route(
            "/admin/applications/:id/reject",
            post(admin::reject_application),
        )
        .route(
            "/admin/requests/:id/status",
            put(admin::update_request_status),
        )
        .route(
            "/admin/requests/bulk-submit",
            post(admin::bulk_submit_requests),
        )
        .route("/projects/:id/comments", post(projects::add_comment))
        .route(
            "/projects/:id/collaboration/status",
            get(projects::collaboration_status),
        )
        .route(
            "/projects/:id/collaboration/:comment_id/accept",
            post(projects::accept_collaboration),
        )
        .route(
            "/projects/:id/collaboration/:comment_id/reject",
            post(projects::reject_collaboration),
        )
        .route(
            "/projects/collaboration/requests",
            get(projects::list_collaboration_requests),
        )
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
