//! Session-cookie helpers shared by the route handlers

use std::sync::Arc;

use tower_cookies::Cookies;

use crate::error::PortalError;
use crate::state::AppState;
use crate::store::{PortalStore, Session, SessionId, SessionStore, User};

pub const SESSION_COOKIE: &str = "portal_session";

/// Resolve the current session from the request cookies
pub fn get_session_from_cookies<S: SessionStore>(
    cookies: &Cookies,
    sessions: &S,
) -> Option<Session> {
    cookies.get(SESSION_COOKIE).and_then(|c| {
        let session_id = SessionId(c.value().to_string());
        sessions.get(&session_id).ok().flatten()
    })
}

/// Resolve the authenticated user, or fail with 401
pub fn current_user<P, S>(
    cookies: &Cookies,
    state: &Arc<AppState<P, S>>,
) -> Result<User, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let session = get_session_from_cookies(cookies, state.sessions.as_ref())
        .ok_or(PortalError::NotAuthenticated)?;
    state
        .store
        .get_user(session.user_id)?
        .ok_or(PortalError::NotAuthenticated)
}

/// Resolve the authenticated user and require a moderator role
pub fn require_moderator<P, S>(
    cookies: &Cookies,
    state: &Arc<AppState<P, S>>,
) -> Result<User, PortalError>
where
    P: PortalStore,
    S: SessionStore,
{
    let user = current_user(cookies, state)?;
    if !user.role.can_moderate() {
        return Err(PortalError::ModeratorRequired);
    }
    Ok(user)
}

/// Set the session cookie
pub fn set_session_cookie(cookies: &Cookies, session_id: &str) {
    use tower_cookies::Cookie;
    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .build();
    cookies.add(cookie);
}

/// Clear the session cookie
pub fn clear_session_cookie(cookies: &Cookies) {
    use tower_cookies::Cookie;
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(tower_cookies::cookie::time::Duration::ZERO)
        .build();
    cookies.add(cookie);
}
