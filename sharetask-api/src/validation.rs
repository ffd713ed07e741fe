/// Field validators shared by request bodies and query strings
///
/// Postgres `text` cannot store U+0000, so every client string that reaches
/// a query is checked for it here and rejected as a field error.

use crate::error::{ApiError, ApiResult};
use validator::ValidationError;

pub const NUL_MESSAGE: &str = "Null characters are not allowed.";

/// `validator` custom function rejecting NUL characters
pub fn no_nul(value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        let mut err = ValidationError::new("null_character");
        err.message = Some(NUL_MESSAGE.into());
        return Err(err);
    }

    Ok(())
}

/// Rejects a query parameter holding a NUL character
pub fn query_param(field: &str, value: Option<&str>) -> ApiResult<()> {
    match value {
        Some(value) if value.contains('\0') => Err(ApiError::field(field, NUL_MESSAGE)),
        _ => Ok(()),
    }
}
