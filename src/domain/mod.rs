use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

pub mod session;
pub mod task;
pub mod timeline;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// Builds a single-field [ValidationErrors] for rules that can only be checked once the domain
/// has the full picture (for example a partial update that makes a schedule run backwards).
/// The result renders the same way as DTO validation failures on the API.
pub(crate) fn field_error(
    field: &'static str,
    code: &'static str,
    message: &'static str,
) -> ValidationErrors {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));

    let mut errors = ValidationErrors::new();
    errors.add(field, error);
    errors
}
