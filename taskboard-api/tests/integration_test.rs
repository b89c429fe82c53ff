/// Integration tests for the Taskboard API
///
/// These tests verify the full system end-to-end against a real PostgreSQL
/// database and are marked `#[ignore]`; run them with a configured
/// `DATABASE_URL` and `JWT_SECRET`:
///
/// ```bash
/// cargo test -p taskboard-api -- --ignored
/// ```
///
/// Covered flows:
/// - Registration, token exchange, and bearer authentication
/// - Task lifecycle (create → update → events → delete)
/// - Filtered listings
/// - Dependency edges (duplicates, self-edges, cycles)
/// - Role-based update/delete restrictions
/// - Analytics (task distribution, timeline)

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{create_test_task, send_json, TestContext};
use serde_json::json;
use taskboard_shared::models::user::UserRole;
use tower::Service as _;

/// Requests without a bearer token are rejected
#[tokio::test]
#[ignore]
async fn test_authentication_required() {
    let ctx = TestContext::new().await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/tasks/")
        .body(Body::empty())
        .unwrap();

    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

/// Register, exchange credentials for a token, fetch the profile
#[tokio::test]
#[ignore]
async fn test_register_and_token_flow() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("flow-{}@example.com", uuid::Uuid::new_v4());

    let request = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "email": email,
                "password": "SecureP4ss",
                "full_name": "Flow Tester"
            })
            .to_string(),
        ))
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Duplicate email is a conflict
    let request = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "email": email, "password": "SecureP4ss" }).to_string(),
        ))
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let request = Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "username={}&password=SecureP4ss",
            email
        )))
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let token_json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let token = token_json["access_token"].as_str().unwrap().to_string();
    assert_eq!(token_json["token_type"], "bearer");

    let (status, me) = send_json(&ctx, "GET", "/auth/me", &token, None).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email);
    assert!(me.get("password_hash").is_none());

    // Registered outside the context's tracking; remove directly
    sqlx::query("DELETE FROM users WHERE email = $1")
        .bind(&email)
        .execute(&ctx.db)
        .await
        .unwrap();
    ctx.cleanup().await.unwrap();
}

/// Create a task with tags, update it, inspect its event log, delete it
#[tokio::test]
#[ignore]
async fn test_task_lifecycle() {
    let ctx = TestContext::new().await.unwrap();

    let task_id = create_test_task(
        &ctx,
        "Ship the release",
        json!({
            "priority": "high",
            "tag_names": ["backend", "urgent"]
        }),
    )
    .await
    .unwrap();

    let (status, task) = send_json(
        &ctx,
        "GET",
        &format!("/tasks/{}", task_id),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "high");
    let tag_names: Vec<&str> = task["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tag_names, vec!["backend", "urgent"]);

    let (status, updated) = send_json(
        &ctx,
        "PATCH",
        &format!("/tasks/{}", task_id),
        &ctx.jwt_token,
        Some(json!({ "status": "in_progress", "priority": "medium" })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "in_progress");

    // created + one updated event per changed field, carrying the old and
    // new values
    let events: Vec<(String, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT event_type, field, old_value, new_value \
         FROM task_events WHERE task_id = $1 ORDER BY id",
    )
    .bind(task_id)
    .fetch_all(&ctx.db)
    .await
    .unwrap();
    assert_eq!(events[0].0, "created");

    let status_event = events
        .iter()
        .find(|(_, f, _, _)| f.as_deref() == Some("status"))
        .expect("no status event");
    assert_eq!(status_event.2.as_deref(), Some("todo"));
    assert_eq!(status_event.3.as_deref(), Some("in_progress"));

    let priority_event = events
        .iter()
        .find(|(_, f, _, _)| f.as_deref() == Some("priority"))
        .expect("no priority event");
    assert_eq!(priority_event.2.as_deref(), Some("high"));
    assert_eq!(priority_event.3.as_deref(), Some("medium"));

    let (status, _) = send_json(
        &ctx,
        "DELETE",
        &format!("/tasks/{}", task_id),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(
        &ctx,
        "GET",
        &format!("/tasks/{}", task_id),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

/// Listings combine filters with AND; tag filter matches any listed tag
#[tokio::test]
#[ignore]
async fn test_task_filtering() {
    let ctx = TestContext::new().await.unwrap();

    let backend = create_test_task(
        &ctx,
        "Backend fix",
        json!({ "priority": "high", "tag_names": ["backend"] }),
    )
    .await
    .unwrap();
    let frontend = create_test_task(
        &ctx,
        "Frontend fix",
        json!({ "priority": "low", "tag_names": ["frontend"] }),
    )
    .await
    .unwrap();

    let (status, tasks) = send_json(
        &ctx,
        "GET",
        "/tasks/?priority=high&tag=backend&tag=infra",
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&backend.to_string().as_str()));
    assert!(!ids.contains(&frontend.to_string().as_str()));

    // Unknown enum value is a validation error
    let (status, _) = send_json(
        &ctx,
        "GET",
        "/tasks/?status=finished",
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    ctx.cleanup().await.unwrap();
}

/// Dependency edges reject self-edges, duplicates, and cycles
#[tokio::test]
#[ignore]
async fn test_dependency_cycle_rejection() {
    let ctx = TestContext::new().await.unwrap();

    let a = create_test_task(&ctx, "A", json!({})).await.unwrap();
    let b = create_test_task(&ctx, "B", json!({})).await.unwrap();
    let c = create_test_task(&ctx, "C", json!({})).await.unwrap();

    // a -> b -> c
    for (from, to) in [(a, b), (b, c)] {
        let (status, _) = send_json(
            &ctx,
            "POST",
            &format!("/tasks/{}/dependencies/{}", from, to),
            &ctx.jwt_token,
            None,
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
    }

    // c -> a closes the loop
    let (status, body) = send_json(
        &ctx,
        "POST",
        &format!("/tasks/{}/dependencies/{}", c, a),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    // Duplicate edge
    let (status, _) = send_json(
        &ctx,
        "POST",
        &format!("/tasks/{}/dependencies/{}", a, b),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CONFLICT);

    // Self-edge
    let (status, _) = send_json(
        &ctx,
        "POST",
        &format!("/tasks/{}/dependencies/{}", a, a),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CONFLICT);

    // Unknown task
    let (status, _) = send_json(
        &ctx,
        "POST",
        &format!("/tasks/{}/dependencies/{}", a, uuid::Uuid::new_v4()),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Listing reflects insertion order
    let (status, deps) = send_json(
        &ctx,
        "GET",
        &format!("/tasks/{}/dependencies", a),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deps.as_array().unwrap().len(), 1);
    assert_eq!(deps[0], b.to_string());

    ctx.cleanup().await.unwrap();
}

/// Members cannot touch unrelated tasks; assignees can update but not delete
#[tokio::test]
#[ignore]
async fn test_role_restrictions() {
    let mut ctx = TestContext::new().await.unwrap();
    let (member, member_token) = ctx.create_user(UserRole::Member).await.unwrap();

    let unrelated = create_test_task(&ctx, "Admin's task", json!({})).await.unwrap();
    let assigned = create_test_task(
        &ctx,
        "Assigned task",
        json!({ "assignee_id": member.id }),
    )
    .await
    .unwrap();

    let (status, _) = send_json(
        &ctx,
        "PATCH",
        &format!("/tasks/{}", unrelated),
        &member_token,
        Some(json!({ "status": "done" })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(
        &ctx,
        "PATCH",
        &format!("/tasks/{}", assigned),
        &member_token,
        Some(json!({ "status": "done" })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);

    // Assignee is not the creator, so deletion stays forbidden
    let (status, _) = send_json(
        &ctx,
        "DELETE",
        &format!("/tasks/{}", assigned),
        &member_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

/// Bulk updates skip missing and forbidden tasks instead of failing
#[tokio::test]
#[ignore]
async fn test_bulk_update_skips() {
    let mut ctx = TestContext::new().await.unwrap();
    let (_member, member_token) = ctx.create_user(UserRole::Member).await.unwrap();

    let mine = create_test_task(&ctx, "Mine", json!({})).await.unwrap();

    let (status, updated) = send_json(
        &ctx,
        "POST",
        "/tasks/bulk-update",
        &member_token,
        Some(json!({
            "items": [
                { "id": mine, "status": "done" },
                { "id": uuid::Uuid::new_v4(), "status": "done" }
            ]
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    // The admin-owned task is skipped for the member, as is the unknown ID
    assert_eq!(updated.as_array().unwrap().len(), 0);

    // A bad value anywhere in the batch rejects it before any item runs
    let (status, _) = send_json(
        &ctx,
        "POST",
        "/tasks/bulk-update",
        &ctx.jwt_token,
        Some(json!({
            "items": [
                { "id": mine, "status": "done" },
                { "id": mine, "status": "paused" }
            ]
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, task) = send_json(
        &ctx,
        "GET",
        &format!("/tasks/{}", mine),
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(task["status"], "todo", "rejected batch must not mutate");

    let (status, updated) = send_json(
        &ctx,
        "POST",
        "/tasks/bulk-update",
        &ctx.jwt_token,
        Some(json!({ "items": [{ "id": mine, "status": "done" }] })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated[0]["status"], "done");

    ctx.cleanup().await.unwrap();
}

/// Naming a nonexistent user as assignee or collaborator is a 404
#[tokio::test]
#[ignore]
async fn test_unknown_assignee_is_not_found() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = send_json(
        &ctx,
        "POST",
        "/tasks/",
        &ctx.jwt_token,
        Some(json!({ "title": "Orphan", "assignee_id": uuid::Uuid::new_v4() })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    assert_eq!(body["error"], "not_found");

    let (status, _) = send_json(
        &ctx,
        "POST",
        "/tasks/",
        &ctx.jwt_token,
        Some(json!({ "title": "Orphan", "collaborator_ids": [uuid::Uuid::new_v4()] })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

/// Distribution counts per assignee, overdue excludes done tasks
#[tokio::test]
#[ignore]
async fn test_task_distribution() {
    let mut ctx = TestContext::new().await.unwrap();
    let (assignee, _) = ctx.create_user(UserRole::Member).await.unwrap();

    let past = (chrono::Utc::now() - chrono::Duration::days(2)).to_rfc3339();
    create_test_task(
        &ctx,
        "Overdue",
        json!({ "assignee_id": assignee.id, "due_date": past }),
    )
    .await
    .unwrap();
    create_test_task(
        &ctx,
        "Overdue but done",
        json!({ "assignee_id": assignee.id, "due_date": past, "status": "done" }),
    )
    .await
    .unwrap();
    create_test_task(&ctx, "No due date", json!({ "assignee_id": assignee.id }))
        .await
        .unwrap();

    let (status, rows) = send_json(
        &ctx,
        "GET",
        "/analytics/task-distribution",
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);

    let entry = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["user_id"] == assignee.id.to_string())
        .expect("assignee missing from distribution");
    assert_eq!(entry["total_tasks"], 3);
    assert_eq!(entry["overdue_tasks"], 1);

    ctx.cleanup().await.unwrap();
}

/// Timeline scopes to the caller's tasks and validates the day window
#[tokio::test]
#[ignore]
async fn test_timeline() {
    let mut ctx = TestContext::new().await.unwrap();
    let (_other, other_token) = ctx.create_user(UserRole::Member).await.unwrap();

    let task_id = create_test_task(&ctx, "Timed", json!({})).await.unwrap();

    let (status, events) = send_json(
        &ctx,
        "GET",
        "/analytics/timeline?days=30",
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["task_id"] == task_id.to_string()));

    // Another user sees nothing for this task
    let (status, events) = send_json(&ctx, "GET", "/analytics/timeline", &other_token, None)
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(!events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["task_id"] == task_id.to_string()));

    // Events older than the requested window are excluded
    sqlx::query(
        "UPDATE task_events SET created_at = NOW() - INTERVAL '30 days' WHERE task_id = $1",
    )
    .bind(task_id)
    .execute(&ctx.db)
    .await
    .unwrap();
    let (status, events) = send_json(
        &ctx,
        "GET",
        "/analytics/timeline?days=7",
        &ctx.jwt_token,
        None,
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(!events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["task_id"] == task_id.to_string()));

    // Out-of-range windows are rejected
    for uri in ["/analytics/timeline?days=0", "/analytics/timeline?days=365"] {
        let (status, _) = send_json(&ctx, "GET", uri, &ctx.jwt_token, None)
            .await
            .unwrap();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    ctx.cleanup().await.unwrap();
}
