/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; library errors convert into it
/// through the `From` impls below, so `?` does the mapping.
///
/// # Response body
///
/// ```json
/// {
///   "error": "validation_error",
///   "message": "Request validation failed",
///   "details": [{ "field": "title", "message": "This field may not be blank." }]
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sharetask_shared::{
    auth::{
        authorization::AuthzError,
        jwt::JwtError,
        middleware::AuthError,
        password::{PasswordError, WeakPassword},
    },
    models::{category, task::FilterError, user},
};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Malformed JSON body or query string (400)
    BadRequest(String),

    /// Missing or invalid credentials (401)
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    Forbidden(String),

    /// Not found, or not visible to the caller (404)
    NotFound(String),

    /// Unprocessable entity (422) - field validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "authentication_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Validation error on a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// The 404 used for tasks that are missing or invisible
    pub fn task_not_found() -> Self {
        ApiError::NotFound("Task not found".to_string())
    }

    pub fn category_not_found() -> Self {
        ApiError::NotFound("Category not found".to_string())
    }

    /// Machine-readable code and status for this error
    pub fn code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "authorization_error"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::ValidationError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.code();

        let (message, details) = match self {
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
///
/// Constraint violations a client can cause become field validation errors.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                match db_err.constraint() {
                    Some(user::USERNAME_CONSTRAINT) => {
                        return ApiError::field("username", "A user with that username already exists.");
                    }
                    Some(category::NAME_CONSTRAINT) => {
                        return ApiError::field("name", "You already have a category with this name.");
                    }
                    Some("task_shares_user_id_fkey") => {
                        return ApiError::field("shared_with", "One or more users do not exist.");
                    }
                    Some("tasks_category_id_fkey") => {
                        return ApiError::field("category", "Category does not exist.");
                    }
                    _ => {}
                }

                // Other database errors are internal
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is temporarily unavailable".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Flattens `validator` derive errors into field details, sorted by field
pub fn validation_details(errors: validator::ValidationErrors) -> Vec<ValidationErrorDetail> {
    let mut details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();

    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(validation_details(errors))
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials
            | AuthError::InvalidFormat(_)
            | AuthError::InvalidToken(_)
            | AuthError::UnknownUser => ApiError::Unauthorized(err.to_string()),
            AuthError::DatabaseError(err) => err.into(),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<WeakPassword> for ApiError {
    fn from(err: WeakPassword) -> Self {
        ApiError::field("password", err.to_string())
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        let field = match err {
            FilterError::InvalidCompleted(_) => "completed",
            FilterError::InvalidCategory(_) => "category",
        };

        ApiError::field(field, err.to_string())
    }
}

/// Unparseable JSON is a bad request; JSON of the wrong shape is a field error
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => data_error(&err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

/// Maps a deserialization failure onto the top-level field it names
///
/// The rejection text reads `<prefix>: <path>: <serde message> at line L column C`,
/// with no path when the failure is about the body as a whole.
fn data_error(text: &str) -> ApiError {
    let detail = text.split_once("target type: ").map_or(text, |(_, rest)| rest);
    let detail = detail.rsplit_once(" at line ").map_or(detail, |(message, _)| message);

    if let Some(rest) = detail.strip_prefix("missing field `") {
        let field = rest.split('`').next().unwrap_or_default();
        return ApiError::field(field, "This field is required.");
    }

    let named = detail
        .split_once(": ")
        .filter(|(path, _)| !path.contains(' '))
        .map(|(path, message)| {
            let root = path.split(|c: char| c == '.' || c == '[').next().unwrap_or_default();
            (root, message)
        })
        .filter(|(field, _)| !field.is_empty());

    match named {
        Some((field, message)) => ApiError::field(field, message),
        None => ApiError::field(NON_FIELD_ERRORS, detail),
    }
}

/// Field name for errors about the body as a whole
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Unparseable ids are indistinguishable from unknown ones
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::NotFound("Resource not found".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use uuid::Uuid;
    use validator::Validate;

    async fn body_of(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_codes() {
        let cases = [
            (ApiError::BadRequest(String::new()), 400, "bad_request"),
            (ApiError::Unauthorized(String::new()), 401, "authentication_error"),
            (ApiError::Forbidden(String::new()), 403, "authorization_error"),
            (ApiError::task_not_found(), 404, "not_found"),
            (ApiError::ValidationError(vec![]), 422, "validation_error"),
            (ApiError::InternalError(String::new()), 500, "internal_error"),
            (ApiError::ServiceUnavailable(String::new()), 503, "service_unavailable"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.code(), (StatusCode::from_u16(status).unwrap(), code));
        }
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let (status, body) = body_of(ApiError::field("title", "This field may not be blank.")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "validation_error");
        let details = body.details.unwrap();
        assert_eq!(details[0].field, "title");
    }

    #[tokio::test]
    async fn test_internal_error_hides_message() {
        let (status, body) = body_of(ApiError::InternalError("connection reset".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "An internal error occurred");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_authz_errors_are_forbidden() {
        let err: ApiError = AuthzError::NotTaskOwner.into();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err: ApiError = AuthzError::ForeignCategory(Uuid::new_v4()).into();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        for err in [
            AuthError::MissingCredentials,
            AuthError::InvalidFormat("bad".to_string()),
            AuthError::InvalidToken("bad".to_string()),
            AuthError::UnknownUser,
        ] {
            assert!(matches!(ApiError::from(err), ApiError::Unauthorized(_)));
        }
    }

    #[test]
    fn test_weak_password_is_field_error() {
        let err: ApiError = WeakPassword::MissingDigit.into();
        match err {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "password"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_filter_error_names_its_field() {
        let err: ApiError = FilterError::InvalidCompleted("maybe".to_string()).into();
        match err {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "completed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validator_errors_are_collected() {
        #[derive(Validate)]
        struct Input {
            #[validate(length(min = 1, message = "too short"))]
            b: String,
            #[validate(length(min = 1, message = "too short"))]
            a: String,
        }

        let errors = Input {
            a: String::new(),
            b: String::new(),
        }
        .validate()
        .unwrap_err();

        match ApiError::from(errors) {
            ApiError::ValidationError(details) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["a", "b"]);
                assert!(details.iter().all(|d| d.message == "too short"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Body {
        name: String,
        done: Option<bool>,
        ids: Option<Vec<Uuid>>,
    }

    fn rejection_of(json: &str) -> ApiError {
        match Json::<Body>::from_bytes(json.as_bytes()) {
            Ok(_) => panic!("{json} should be rejected"),
            Err(rejection) => rejection.into(),
        }
    }

    fn single_field(err: ApiError) -> String {
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 1);
                details[0].field.clone()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        assert!(matches!(rejection_of(r#"{"name": "#), ApiError::BadRequest(_)));
        assert!(matches!(rejection_of("not json"), ApiError::BadRequest(_)));
    }

    #[test]
    fn test_wrong_field_type_names_the_field() {
        assert_eq!(single_field(rejection_of(r#"{"name": "x", "done": "yes"}"#)), "done");
        assert_eq!(single_field(rejection_of(r#"{"name": 5}"#)), "name");
        assert_eq!(single_field(rejection_of(r#"{"name": "x", "ids": ["bob"]}"#)), "ids");
    }

    #[test]
    fn test_missing_field_is_required() {
        match rejection_of(r#"{"done": true}"#) {
            ApiError::ValidationError(details) => {
                assert_eq!(details[0].field, "name");
                assert_eq!(details[0].message, "This field is required.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_body_shape_is_non_field_error() {
        assert_eq!(single_field(rejection_of(r#""text""#)), NON_FIELD_ERRORS);
        assert_eq!(single_field(rejection_of("[1, 2]")), NON_FIELD_ERRORS);
    }

    #[test]
    fn test_row_not_found_is_not_found() {
        assert!(matches!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
    }
}
