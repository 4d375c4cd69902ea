//! Typed path parameter helpers.

use uuid::Uuid;

use keygate_core::error::AppError;

/// Parses a UUID from a path segment or body field.
pub fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("invalid {what} id")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage() {
        let err = parse_uuid("42", "user").unwrap_err();
        assert_eq!(err.message, "invalid user id");
        assert!(parse_uuid(&Uuid::new_v4().to_string(), "user").is_ok());
    }
}
