//! Common test utilities for portal integration tests

use std::sync::Arc;

use axum_test::TestServer;
use uuid::Uuid;

use innovation_portal::store::{
    InMemorySessionStore, InMemoryStore, PortalStore, Project, Role, SessionStore, User,
};
use innovation_portal::{routes, AppState};

pub const SESSION_COOKIE: &str = "portal_session";

/// Create a test server with handles to the underlying stores for seeding
/// fixtures and inspecting state
pub fn create_test_context() -> (TestServer, Arc<InMemoryStore>, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemoryStore::new());
    let sessions = Arc::new(InMemorySessionStore::new());

    let state = Arc::new(AppState::new_with_arcs(store.clone(), sessions.clone()));
    let app = routes::create_router(state);
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, store, sessions)
}

/// Seed a user directly into the store
pub fn seed_user(store: &InMemoryStore, name: &str, role: Role) -> Uuid {
    let user = User::new(
        name,
        &format!("{}@example.com", Uuid::new_v4()),
        None,
        role,
    );
    let id = user.id;
    store.insert_user(user).expect("Failed to seed user");
    id
}

/// Seed a project directly into the store
pub fn seed_project(store: &InMemoryStore, author_id: Uuid, title: &str) -> Uuid {
    let project = Project::new(author_id, title, "A seeded project");
    let id = project.id;
    store.insert_project(project).expect("Failed to seed project");
    id
}

/// Create a session for a user and return the cookie value
pub fn login(sessions: &InMemorySessionStore, user_id: Uuid) -> String {
    sessions
        .create(user_id)
        .expect("Failed to create session")
        .id
        .0
}
