use std::collections::HashMap;

use crate::error::ApiError;

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod categories;
pub mod transactions;

/// Accumulates field-level validation messages; empty means valid.
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn into_error(self) -> ApiError {
        ApiError::validation("Validation failed", self.0)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

pub fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

/// `#rrggbb`
pub fn valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(valid_email("user@example.com"));
        assert!(!valid_email("userexample.com"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("user@nodot"));
        assert!(!valid_email("user@.com"));
    }

    #[test]
    fn test_color_validation() {
        assert!(valid_color("#4f46e5"));
        assert!(valid_color("#ABCDEF"));
        assert!(!valid_color("4f46e5"));
        assert!(!valid_color("#4f46e"));
        assert!(!valid_color("#4f46eg"));
    }

    #[test]
    fn test_field_errors_collects() {
        let mut errors = FieldErrors::new();
        assert!(errors.0.is_empty());
        errors.add("amount", "must be positive");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
