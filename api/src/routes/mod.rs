pub mod diagnostics;
pub mod health;
pub mod post;
pub mod user;

use crate::errors::ApiError;

/// Path ids must be complete decimal integers in `i32` range.
pub(crate) fn parse_id(raw: &str, invalid: &'static str) -> Result<i32, ApiError> {
    raw.parse::<i32>().map_err(|_| ApiError::Validation(invalid))
}
