use regex::Regex;

use super::AuthError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_SPECIALS: &str = "@#$%^&+=!";

const USERNAME_PATTERN: &str = r"^[a-zA-Z0-9_]+$";

/// Shape rules for new usernames and passwords.
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    username: Regex,
}

impl CredentialPolicy {
    pub fn new() -> Result<Self, AuthError> {
        let username = Regex::new(USERNAME_PATTERN)
            .map_err(|e| AuthError::Internal(format!("bad username pattern: {}", e)))?;
        Ok(Self { username })
    }

    pub fn check_username(&self, username: &str) -> Result<(), AuthError> {
        let len = username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(AuthError::Validation(format!(
                "Username must be between {} and {} characters",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            )));
        }
        if !self.username.is_match(username) {
            return Err(AuthError::Validation(
                "Username can only contain letters, numbers and underscores".into(),
            ));
        }
        Ok(())
    }

    pub fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                PASSWORD_MIN_LEN
            )));
        }

        let upper = password.chars().any(|c| c.is_ascii_uppercase());
        let lower = password.chars().any(|c| c.is_ascii_lowercase());
        let digit = password.chars().any(|c| c.is_ascii_digit());
        let special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
        if !(upper && lower && digit && special) {
            return Err(AuthError::Validation(format!(
                "Password must contain uppercase, lowercase, numbers and special characters ({})",
                PASSWORD_SPECIALS
            )));
        }
        Ok(())
    }
}
