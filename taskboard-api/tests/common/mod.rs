/// Common test utilities for integration tests
///
/// Shared infrastructure for the API tests:
/// - Test database setup and per-test cleanup
/// - Test user creation with real password hashes
/// - JWT token generation
/// - Request/response helpers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::{create_token, Claims};
use taskboard_shared::auth::password;
use taskboard_shared::models::user::{CreateUser, User, UserRole};
use tower::Service as _;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub user: User,
    pub jwt_token: String,
    created_users: Vec<Uuid>,
}

impl TestContext {
    /// Creates a new test context against the configured database
    ///
    /// The primary test user is an admin so individual tests do not trip
    /// over ownership checks unless they mean to.
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db = PgPool::connect(&config.database.url).await?;
        taskboard_shared::db::migrations::run_migrations(&db).await?;

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        let mut ctx = Self {
            db,
            app,
            config,
            user: placeholder_user(),
            jwt_token: String::new(),
            created_users: Vec::new(),
        };

        let (user, token) = ctx.create_user(UserRole::Admin).await?;
        ctx.user = user;
        ctx.jwt_token = token;

        Ok(ctx)
    }

    /// Creates a user with a unique email and returns it with a valid token
    pub async fn create_user(&mut self, role: UserRole) -> anyhow::Result<(User, String)> {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("test-{}@example.com", Uuid::new_v4()),
                password_hash: password::hash_password("TestP4ssword")?,
                full_name: Some("Test User".to_string()),
                role,
            },
        )
        .await?;
        self.created_users.push(user.id);

        let claims = Claims::new(user.id, role, chrono::Duration::minutes(60));
        let token = create_token(&claims, &self.config.jwt.secret)?;

        Ok((user, token))
    }

    /// Authorization header value for the primary test user
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.jwt_token)
    }

    /// Removes rows created by this test
    ///
    /// Tasks go first since `created_by` does not cascade; tags, edges,
    /// and events cascade with the tasks.
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM tasks WHERE created_by = ANY($1)")
            .bind(&self.created_users)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&self.created_users)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

fn placeholder_user() -> User {
    User {
        id: Uuid::nil(),
        email: String::new(),
        password_hash: String::new(),
        full_name: None,
        role: "member".to_string(),
        is_active: true,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

/// Sends an authenticated JSON request and returns (status, parsed body)
pub async fn send_json(
    ctx: &TestContext,
    method: &str,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> anyhow::Result<(StatusCode, Value)> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = ctx.app.clone().call(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}

/// Creates a task through the API and returns its ID
pub async fn create_test_task(
    ctx: &TestContext,
    title: &str,
    extra: Value,
) -> anyhow::Result<Uuid> {
    let mut body = serde_json::json!({ "title": title });
    if let (Some(obj), Some(extra_obj)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }

    let (status, json) = send_json(ctx, "POST", "/tasks/", &ctx.jwt_token, Some(body)).await?;
    anyhow::ensure!(
        status == StatusCode::CREATED,
        "expected 201, got {}: {}",
        status,
        json
    );

    let id = json["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("response missing id"))?;
    Ok(id.parse()?)
}
