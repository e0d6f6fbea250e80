//! Registration and login endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{PortalStore, Role, SessionStore, User};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: Uuid,
}

/// POST /auth/register
pub async fn register<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(PortalError::ValidationError(
            "name and email are required".to_string(),
        ));
    }
    if req.password.len() < 8 {
        return Err(PortalError::ValidationError(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash =
        hash_password(&req.password).map_err(|e| PortalError::Internal(e.to_string()))?;

    let user = User::new(req.name.trim(), &req.email, Some(password_hash), Role::User);
    let user_id = user.id;
    state.store.insert_user(user)?;

    let session = state.sessions.create(user_id)?;
    super::session::set_session_cookie(&cookies, &session.id.0);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created".to_string(),
            user_id,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub user_id: Uuid,
    pub role: Role,
}

/// POST /auth/login
pub async fn login<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = state
        .store
        .get_user_by_email(&req.email)?
        .ok_or(PortalError::InvalidCredentials)?;

    // OAuth-only accounts have no local password
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(PortalError::InvalidCredentials)?;

    if !verify_password(&req.password, hash).map_err(|e| PortalError::Internal(e.to_string()))? {
        return Err(PortalError::InvalidCredentials);
    }

    let session = state.sessions.create(user.id)?;
    super::session::set_session_cookie(&cookies, &session.id.0);

    Ok(Json(LoginResponse {
        message: "Logged in".to_string(),
        user_id: user.id,
        role: user.role,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// POST /auth/logout
pub async fn logout<P, S>(
    State(state): State<Arc<AppState<P, S>>>,
    cookies: Cookies,
) -> Result<Json<LogoutResponse>, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    if let Some(session) =
        super::session::get_session_from_cookies(&cookies, state.sessions.as_ref())
    {
        state.sessions.delete(&session.id)?;
    }
    super::session::clear_session_cookie(&cookies);

    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}
