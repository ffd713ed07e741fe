/// Request extractors that reject with [`ApiError`]
///
/// Axum's stock `Json`, `Path` and `Query` reject with plain-text bodies.
/// These wrappers reuse them and convert the rejection, so every failure a
/// client can trigger comes back in the JSON error format:
///
/// - malformed JSON body or query string → 400 `bad_request`
/// - JSON body with a missing or mistyped field → 422 `validation_error`
/// - unparseable path id → 404 `not_found`

use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// JSON body extractor
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path parameter extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Query string extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// Deserializes a body taken as `AppJson<Value>`, rejecting like [`AppJson`]
///
/// Handlers that must authorize before judging the body's fields extract
/// the raw value first and call this afterwards.
pub fn from_body<T: DeserializeOwned>(body: &Value) -> Result<T, ApiError> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| ApiError::InternalError(format!("Failed to re-encode body: {}", e)))?;

    let Json(value) = Json::<T>::from_bytes(&bytes)?;

    Ok(value)
}
