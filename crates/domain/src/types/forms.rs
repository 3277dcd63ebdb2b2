//! Login and registration form input
//!
//! Validation mirrors the rules enforced on the login and register pages, so
//! obviously bad input never reaches the identity provider.

use std::fmt;

use thiserror::Error;

use super::profile::{RegistrationFields, Role};
use crate::constants::MIN_PASSWORD_LENGTH;

/// A single form rule violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Credentials entered on the login page
#[derive(Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Check the login page rules, returning every violation found
    ///
    /// # Errors
    /// Returns the list of violated rules.
    pub fn validate(&self) -> Result<(), Vec<FormError>> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        check_password(&self.password, &mut errors);
        finish(errors)
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Input collected on the registration page
#[derive(Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    /// URL of an already-uploaded profile image
    pub profile_image: Option<String>,
    pub address: String,
    /// Requested role, forwarded to the backend as a hint
    pub role: Option<Role>,
}

impl RegistrationForm {
    /// Check the register page rules, returning every violation found
    ///
    /// # Errors
    /// Returns the list of violated rules.
    pub fn validate(&self) -> Result<(), Vec<FormError>> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        if self.name.trim().is_empty() {
            errors.push(FormError::Required("Name"));
        }
        if self.address.trim().is_empty() {
            errors.push(FormError::Required("Address"));
        }
        check_password(&self.password, &mut errors);
        if self.confirm_password.is_empty() {
            errors.push(FormError::Required("Password confirmation"));
        } else if self.confirm_password != self.password {
            errors.push(FormError::PasswordMismatch);
        }
        finish(errors)
    }

    /// Backend registration fields derived from this form
    #[must_use]
    pub fn fields(&self) -> RegistrationFields {
        RegistrationFields {
            name: Some(self.name.trim().to_string()),
            address: Some(self.address.trim().to_string()),
            profile_image: self.profile_image.clone(),
            role_hint: self.role,
        }
    }
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("profile_image", &self.profile_image)
            .field("address", &self.address)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn check_email(email: &str, errors: &mut Vec<FormError>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push(FormError::Required("Email"));
        return;
    }
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@')
    });
    if !valid || email.contains(char::is_whitespace) {
        errors.push(FormError::InvalidEmail);
    }
}

fn check_password(password: &str, errors: &mut Vec<FormError>) {
    if password.is_empty() {
        errors.push(FormError::Required("Password"));
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FormError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }
}

fn finish(errors: Vec<FormError>) -> Result<(), Vec<FormError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
