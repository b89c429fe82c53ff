/// Bearer token issuing and validation
///
/// Access tokens are HS256-signed JWTs carrying the user's id and role.
/// Validation checks the signature, expiry, not-before time, and the
/// issuer claim (always `"taskboard"`). Lifetime comes from the caller's
/// config; secrets must be at least 32 bytes.
///
/// # Example
///
/// ```
/// use taskboard_shared::auth::jwt::{create_token, validate_token, Claims};
/// use taskboard_shared::models::user::UserRole;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "your-secret-key-at-least-32-bytes!!";
///
/// let claims = Claims::new(user_id, UserRole::Member, Duration::hours(24));
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

const ISSUER: &str = "taskboard";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,
}

/// Token claims: standard sub/iss/iat/exp/nbf plus the user's role at
/// issue time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the user ID
    pub sub: Uuid,

    /// Issuer, always "taskboard"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not valid before (Unix timestamp)
    pub nbf: i64,

    /// Role at issue time; role edits take effect on the next token
    pub role: UserRole,
}

impl Claims {
    /// Creates claims valid from now until `expires_in` from now
    pub fn new(user_id: Uuid, role: UserRole, expires_in: Duration) -> Self {
        let now = Utc::now().timestamp();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now,
            exp: (Utc::now() + expires_in).timestamp(),
            nbf: now,
            role,
        }
    }

    /// Whether the expiry has passed
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims into a compact JWT
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Validates a JWT and returns its claims
///
/// # Errors
///
/// [`JwtError::Expired`] and [`JwtError::InvalidIssuer`] for those specific
/// failures; [`JwtError::ValidationError`] for a bad signature or malformed
/// token.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(e.to_string()),
    })?;

    Ok(data.claims)
}
