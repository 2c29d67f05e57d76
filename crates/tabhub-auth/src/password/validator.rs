//! Password policy enforcement for new passwords.

use tabhub_core::config::auth::AuthConfig;
use tabhub_core::error::AppError;

/// Validates new passwords against the configured policy.
///
/// The identity provider this mirrors enforces a plain minimum length,
/// so the policy is deliberately small.
#[derive(Debug, Clone)]
pub struct PasswordValidator {
    /// Minimum password length.
    min_length: usize,
}

impl PasswordValidator {
    /// Creates a new validator from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            min_length: config.min_password_length,
        }
    }

    /// Validates a password, returning the first violation found.
    pub fn validate(&self, password: &str) -> Result<(), AppError> {
        if password.is_empty() {
            return Err(AppError::validation("Password must not be empty"));
        }

        if password.chars().count() < self.min_length {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> PasswordValidator {
        PasswordValidator::new(&AuthConfig::default())
    }

    #[test]
    fn test_accepts_minimum_length() {
        assert!(validator().validate("abcdef").is_ok());
    }

    #[test]
    fn test_rejects_short_password() {
        assert!(validator().validate("abc").is_err());
    }

    #[test]
    fn test_rejects_empty_password() {
        assert!(validator().validate("").is_err());
    }
}
