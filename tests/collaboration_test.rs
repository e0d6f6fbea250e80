//! Tests for the collaboration request lifecycle

mod common;

use chrono::Utc;
use common::{create_test_context, login, seed_project, seed_user, SESSION_COOKIE};
use innovation_portal::store::{Comment, PortalStore, Role};
use serde_json::{json, Value};
use uuid::Uuid;

/// Test: marker comment creates a pending request; accept adds the
/// collaborator; a second accept conflicts
#[tokio::test]
async fn test_request_accept_lifecycle() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let owner_session = login(&sessions, owner);
    let requester_session = login(&sessions, requester);

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, requester_session))
        .json(&json!({ "content": "[COLLAB REQUEST] Let's build" }))
        .await;
    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    let comment_id = body["comment"]["commentId"].as_str().unwrap().to_string();

    // Structured record exists and is pending
    let request = store
        .get_collab_request(project_id, requester)
        .unwrap()
        .unwrap();
    assert_eq!(request.status.as_str(), "pending");
    assert_eq!(request.comment_id.to_string(), comment_id);

    // Owner got notified
    let notifications = store.list_notifications(owner).unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("Rover"));

    let response = server
        .post(&format!(
            "/projects/{project_id}/collaboration/{comment_id}/accept"
        ))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session.clone()))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["collaboratorCount"], 1);
    assert_eq!(body["status"], "accepted");

    let project = store.get_project(project_id).unwrap().unwrap();
    assert!(project.collaborator_ids.contains(&requester));
    assert_eq!(project.collaborator_count, 1);

    // Second accept conflicts and leaves the count unchanged
    let response = server
        .post(&format!(
            "/projects/{project_id}/collaboration/{comment_id}/accept"
        ))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["status"], "accepted");

    let project = store.get_project(project_id).unwrap().unwrap();
    assert_eq!(project.collaborator_count, 1);
}

/// Test: duplicate request conflicts with status and project title
#[tokio::test]
async fn test_duplicate_request_carries_context() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let session = login(&sessions, requester);

    server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session.clone()))
        .json(&json!({ "content": "[COLLAB REQUEST] hi" }))
        .await;

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session))
        .json(&json!({ "content": "[COLLAB REQUEST] again" }))
        .await;
    assert_eq!(response.status_code(), 409);
    let body: Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["projectTitle"], "Rover");
}

/// Test: plain comments do not create requests
#[tokio::test]
async fn test_plain_comment_is_not_a_request() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let commenter = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let session = login(&sessions, commenter);

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session.clone()))
        .json(&json!({ "content": "Nice project!" }))
        .await;
    assert_eq!(response.status_code(), 201);

    assert!(store
        .get_collab_request(project_id, commenter)
        .unwrap()
        .is_none());

    let response = server
        .get(&format!("/projects/{project_id}/collaboration/status"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session))
        .await;
    let body: Value = response.json();
    assert_eq!(body["exists"], false);
}

/// Test: status endpoint reports a pending request
#[tokio::test]
async fn test_collaboration_status() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let session = login(&sessions, requester);

    server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session.clone()))
        .json(&json!({ "content": "[COLLAB REQUEST] hi" }))
        .await;

    let response = server
        .get(&format!("/projects/{project_id}/collaboration/status"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["exists"], true);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["projectTitle"], "Rover");
}

/// Test: rejection is terminal and never touches the collaborator set
#[tokio::test]
async fn test_reject_lifecycle() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let owner_session = login(&sessions, owner);
    let requester_session = login(&sessions, requester);

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, requester_session))
        .json(&json!({ "content": "[COLLAB REQUEST] hi" }))
        .await;
    let body: Value = response.json();
    let comment_id = body["comment"]["commentId"].as_str().unwrap().to_string();

    let response = server
        .post(&format!(
            "/projects/{project_id}/collaboration/{comment_id}/reject"
        ))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session.clone()))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "rejected");

    // Requester was notified of the decision
    let notifications = store.list_notifications(requester).unwrap();
    assert!(notifications[0].message.contains("declined"));

    // Re-rejecting conflicts (same guard as accept)
    let response = server
        .post(&format!(
            "/projects/{project_id}/collaboration/{comment_id}/reject"
        ))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session))
        .await;
    assert_eq!(response.status_code(), 409);

    let project = store.get_project(project_id).unwrap().unwrap();
    assert!(project.collaborator_ids.is_empty());
    assert_eq!(project.collaborator_count, 0);
}

/// Test: only the project owner can process requests
#[tokio::test]
async fn test_only_owner_can_process() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let requester_session = login(&sessions, requester);

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, requester_session.clone()))
        .json(&json!({ "content": "[COLLAB REQUEST] hi" }))
        .await;
    let body: Value = response.json();
    let comment_id = body["comment"]["commentId"].as_str().unwrap().to_string();

    // The requester cannot accept their own request
    let response = server
        .post(&format!(
            "/projects/{project_id}/collaboration/{comment_id}/accept"
        ))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, requester_session))
        .await;
    assert_eq!(response.status_code(), 403);
}

/// Test: owners cannot request collaboration on their own project
#[tokio::test]
async fn test_owner_cannot_request_own_project() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let session = login(&sessions, owner);

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, session))
        .json(&json!({ "content": "[COLLAB REQUEST] me" }))
        .await;
    assert_eq!(response.status_code(), 403);
}

/// Test: commenting requires authentication
#[tokio::test]
async fn test_comment_requires_auth() {
    let (server, store, _) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let project_id = seed_project(&store, owner, "Rover");

    let response = server
        .post(&format!("/projects/{project_id}/comments"))
        .json(&json!({ "content": "hi" }))
        .await;
    assert_eq!(response.status_code(), 401);
}

/// Test: legacy comment-only requests are lazily migrated, idempotently
#[tokio::test]
async fn test_legacy_migration_via_listing() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    let owner_session = login(&sessions, owner);

    // Legacy-era marker comment with no structured record
    store
        .append_comment(
            project_id,
            Comment {
                comment_id: Uuid::new_v4(),
                user_id: requester,
                user_name: "Alex".to_string(),
                content: "[COLLAB REQUEST] from the old days".to_string(),
                created_at: Utc::now(),
            },
        )
        .unwrap();

    let response = server
        .get("/projects/collaboration/requests")
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session.clone()))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    let requests = body["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["requesterName"], "Alex");
    assert_eq!(requests[0]["projectTitle"], "Rover");
    assert_eq!(requests[0]["status"], "pending");
    let first_id = requests[0]["id"].as_str().unwrap().to_string();

    // Listing again does not duplicate the migrated record
    let response = server
        .get("/projects/collaboration/requests")
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session))
        .await;
    let body: Value = response.json();
    let requests = body["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["id"], first_id.as_str());
}

/// Test: the enriched listing carries the requester profile summary
#[tokio::test]
async fn test_listing_enrichment() {
    let (server, store, sessions) = create_test_context();
    let owner = seed_user(&store, "Blair", Role::User);
    let requester = seed_user(&store, "Alex", Role::User);
    let project_id = seed_project(&store, owner, "Rover");
    // The requester has a project of their own
    seed_project(&store, requester, "Sensor Hub");
    let owner_session = login(&sessions, owner);
    let requester_session = login(&sessions, requester);

    server
        .post(&format!("/projects/{project_id}/comments"))
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, requester_session))
        .json(&json!({ "content": "[COLLAB REQUEST] hi" }))
        .await;

    let response = server
        .get("/projects/collaboration/requests")
        .add_cookie(cookie::Cookie::new(SESSION_COOKIE, owner_session))
        .await;
    let body: Value = response.json();
    let requests = body["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["projectCount"], 1);
    assert_eq!(requests[0]["collaborationCount"], 0);
    assert_eq!(requests[0]["requested"], "just now");
}
