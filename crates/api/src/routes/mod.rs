pub mod health;
pub mod metrics;
pub mod orders;
pub mod tables;
pub mod vouchers;
pub mod ws;

use crate::error::ApiError;

/// Parses a path or body id.
pub(crate) fn parse_id<T>(kind: &str, raw: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {kind} id '{raw}': {e}")))
}
