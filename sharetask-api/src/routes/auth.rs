/// Registration and token endpoints
///
/// # Endpoints
///
/// - `POST /api/register` - Create an account (does not log in)
/// - `POST /api/token` - Exchange username/password for an access/refresh pair
/// - `POST /api/token/refresh` - Exchange a refresh token for a new access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::AppJson,
    validation::no_nul,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sharetask_shared::{
    auth::{jwt, password},
    models::user::{is_valid_username, CreateUser, PublicUser, User, MAX_USERNAME_LENGTH},
};
use validator::{Validate, ValidateEmail, ValidationError};

/// Same answer for an unknown user and a wrong password
const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

fn username_chars(username: &str) -> Result<(), ValidationError> {
    if username.chars().count() <= MAX_USERNAME_LENGTH && !is_valid_username(username) {
        let mut err = ValidationError::new("invalid_username");
        err.message = Some(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

fn optional_email(email: &str) -> Result<(), ValidationError> {
    no_nul(email)?;

    if !email.is_empty() && !email.validate_email() {
        let mut err = ValidationError::new("email");
        err.message = Some("Enter a valid email address.".into());
        return Err(err);
    }

    Ok(())
}

fn strong_password(candidate: &str) -> Result<(), ValidationError> {
    no_nul(candidate)?;

    password::validate_password_strength(candidate).map_err(|weak| {
        let mut err = ValidationError::new("weak_password");
        err.message = Some(weak.to_string().into());
        err
    })
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters."),
        custom(function = "username_chars")
    )]
    pub username: String,

    /// Optional; empty string when omitted
    #[serde(default)]
    #[validate(length(max = 254), custom(function = "optional_email"))]
    pub email: String,

    #[validate(custom(function = "strong_password"))]
    pub password: String,
}

/// Token request
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(
        length(min = 1, message = "This field may not be blank."),
        custom(function = "no_nul")
    )]
    pub username: String,

    #[validate(
        length(min = 1, message = "This field may not be blank."),
        custom(function = "no_nul")
    )]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// Register a new user
///
/// ```text
/// POST /api/register
/// { "username": "alice", "email": "alice@example.com", "password": "Sup3r$ecret" }
/// ```
///
/// Responds `201 Created` with `{id, username, email}`.
///
/// # Errors
///
/// - `400 Bad Request`: malformed JSON
/// - `422 Unprocessable Entity`: invalid fields, weak password or taken username
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    req.validate()?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            username: req.username,
            email: req.email,
            password_hash,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Login: issue an access/refresh pair
///
/// ```text
/// POST /api/token
/// { "username": "alice", "password": "Sup3r$ecret" }
/// ```
///
/// Responds with `{access, refresh}`.
///
/// # Errors
///
/// - `401 Unauthorized`: unknown user or wrong password
pub async fn token(
    State(state): State<AppState>,
    AppJson(req): AppJson<TokenRequest>,
) -> ApiResult<Json<jwt::TokenPair>> {
    req.validate()?;

    let Some(user) = User::find_by_username(&state.db, &req.username).await? else {
        password::verify_against_dummy(&req.password)?;
        tracing::info!(username = %req.username, "Login failed: unknown user");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login failed: wrong password");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    let pair = jwt::issue_token_pair(user.id, state.jwt_secret(), &state.config.jwt.lifetimes())?;

    tracing::info!(user_id = %user.id, "Tokens issued");

    Ok(Json(pair))
}

/// Exchange a refresh token for a new access token
///
/// ```text
/// POST /api/token/refresh
/// { "refresh": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: invalid or expired token, or an access token
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access =
        jwt::refresh_access_token(&req.refresh, state.jwt_secret(), &state.config.jwt.lifetimes())?;

    Ok(Json(RefreshResponse { access }))
}
