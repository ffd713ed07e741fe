/// Bearer-token authentication
///
/// Turns an `Authorization` header into an [`AuthContext`]: the header must
/// carry `Bearer <access token>`, the token must validate, and the user it
/// names must still exist. The API server runs this in its auth layer and
/// inserts the context into request extensions, so handlers never read an
/// identity from the request body.
///
/// # Example
///
/// ```no_run
/// use sharetask_shared::auth::middleware::authenticate_bearer;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let auth = authenticate_bearer(&pool, "secret", Some("Bearer eyJ...")).await?;
/// println!("Authenticated as {}", auth.username);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::User;

/// Identity of the caller, injected into request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Username at authentication time
    pub username: String,
}

impl AuthContext {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
        }
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Authentication credentials were not provided")]
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    #[error("{0}")]
    InvalidFormat(String),

    /// Token failed validation
    #[error("{0}")]
    InvalidToken(String),

    /// Token is valid but its user no longer exists
    #[error("User not found")]
    UnknownUser,

    /// Store lookup failed
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid token issuer".to_string()),
            JwtError::WrongTokenType { .. } => {
                AuthError::InvalidToken("Token is not an access token".to_string())
            }
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

/// Extracts the token from a `Bearer <token>` header value
///
/// The scheme is matched case-insensitively.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::InvalidFormat(
            "Authorization header must be 'Bearer <token>'".to_string(),
        ));
    }

    Ok(token)
}

/// Authenticates a request from its `Authorization` header value
///
/// # Errors
///
/// - `MissingCredentials`: no header
/// - `InvalidFormat`: not a bearer header
/// - `InvalidToken`: bad signature, expired, wrong issuer, or a refresh token
/// - `UnknownUser`: the token's user has been deleted
pub async fn authenticate_bearer(
    pool: &PgPool,
    secret: &str,
    header: Option<&str>,
) -> Result<AuthContext, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let token = parse_bearer(header)?;
    let claims = validate_access_token(token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or(AuthError::UnknownUser)?;

    tracing::debug!(user_id = %user.id, "Request authenticated");

    Ok(AuthContext::new(user.id, user.username))
}
