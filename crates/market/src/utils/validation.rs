//! Validation utilities.

use regex::Regex;

use crate::types::{MarketError, MarketResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate email format
    pub fn email(email: &str) -> MarketResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(MarketError::validation("email", "Email is required"));
        }

        if email.len() > 255 {
            return Err(MarketError::validation(
                "email",
                "Email too long (max 255 characters)",
            ));
        }

        let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .map_err(|e| MarketError::validation("email", format!("Failed to compile email regex: {e}")))?;

        if !email_regex.is_match(email) {
            return Err(MarketError::validation("email", "Invalid email address"));
        }

        Ok(())
    }

    pub fn password(password: &str) -> MarketResult<()> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(MarketError::validation(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        Ok(())
    }

    pub fn full_name(name: &str) -> MarketResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MarketError::validation("full_name", "Full name is required"));
        }
        if name.chars().count() > 100 {
            return Err(MarketError::validation(
                "full_name",
                "Full name too long (max 100 characters)",
            ));
        }
        Ok(())
    }

    /// Validate invite code shape: letters and digits only
    pub fn invite_code(code: &str) -> MarketResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(MarketError::validation("code", "Invite code is required"));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MarketError::InvalidInviteCode);
        }
        Ok(())
    }
}
