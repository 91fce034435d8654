pub mod crm;
pub mod numbering;
pub mod order;

use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Parse a snake_case enum value coming from a request, naming the field on failure.
pub fn parse_field<T: FromStr>(field: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Validation(format!("invalid {field}: '{raw}'")))
}
