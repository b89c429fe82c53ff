/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/register` - Register a new user
/// - `POST /auth/token` - Exchange credentials for a bearer token
/// - `GET  /auth/me` - Current user's profile

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Extension, Form, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use taskboard_shared::auth::{context::AuthContext, jwt, password};
use taskboard_shared::models::user::{CreateUser, User, UserRole};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (also validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional display name
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub full_name: Option<String>,

    /// Requested role (default: member)
    pub role: Option<String>,
}

/// Public user profile, never includes the password hash
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// User ID
    pub id: Uuid,

    /// Email address
    pub email: String,

    /// Display name
    pub full_name: Option<String>,

    /// Role string
    pub role: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        }
    }
}

/// Token request (OAuth2-style password form)
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    /// Email address
    pub username: String,

    /// Password
    pub password: String,
}

/// Token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Bearer token
    pub access_token: String,

    /// Always "bearer"
    pub token_type: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP4ss",
///   "full_name": "Jo Harper",
///   "role": "member"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ProfileResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid_field("password", e))?;

    let role = match req.role.as_deref() {
        None => UserRole::Member,
        Some(s) => UserRole::parse(s)
            .ok_or_else(|| ApiError::invalid_field("role", format!("Unknown role: {}", s)))?,
    };

    let password_hash = password::hash_password(&req.password)?;

    // Unique-violation on email surfaces as 409 via the sqlx error mapping
    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            full_name: req.full_name,
            role,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Exchange credentials for a bearer token
///
/// # Endpoint
///
/// ```text
/// POST /auth/token
/// Content-Type: application/x-www-form-urlencoded
///
/// username=user@example.com&password=SecureP4ss
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = User::find_by_email(&state.db, &form.username)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Incorrect email or password".to_string()))?;

    let valid = password::verify_password(&form.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Incorrect email or password".to_string(),
        ));
    }

    let claims = jwt::Claims::new(
        user.id,
        user.role(),
        Duration::minutes(state.config.jwt.ttl_minutes),
    );
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// Current user's profile
///
/// # Endpoint
///
/// ```text
/// GET /auth/me
/// Authorization: Bearer <token>
/// ```
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
