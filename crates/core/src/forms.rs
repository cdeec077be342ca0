//! Validation for account and contact forms.
//!
//! Each form deserializes straight from an urlencoded body and exposes a
//! `validate()` that returns every problem at once, keyed by field name, so
//! the page can be re-rendered with messages next to the inputs.

use core::fmt;

use serde::Deserialize;

use crate::types::Email;

/// Minimum length for a new password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length for the current password when changing it.
const MIN_CURRENT_PASSWORD_LENGTH: usize = 6;

/// Field-level validation messages, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(&'static str, String)>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. Only the first message per field is kept.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if self.get(field).is_none() {
            self.errors.push((field, message.into()));
        }
    }

    /// Message for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// All messages in order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|(_, m)| m.as_str())
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when there is at least one.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Require at least `min` characters after trimming.
    pub fn min_chars(&mut self, field: &'static str, value: &str, min: usize, message: &str) {
        if value.trim().chars().count() < min {
            self.add(field, message);
        }
    }

    /// Require a parseable email address.
    pub fn email(&mut self, field: &'static str, value: &str) {
        if Email::parse(value).is_err() {
            self.add(field, "Invalid email");
        }
    }
}

/// Login form.
#[derive(Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the form is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()
    }
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sign-up form.
#[derive(Clone, Deserialize)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the form is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.min_chars("first_name", &self.first_name, 2, "First name is too short");
        errors.min_chars("last_name", &self.last_name, 2, "Last name is too short");
        errors.email("email", &self.email);
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("password", "Password must be at least 8 characters");
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        errors.into_result()
    }

    /// Phone number with blanks treated as absent.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        non_blank(self.phone_number.as_deref())
    }
}

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Profile details form.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl ProfileForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the form is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.min_chars("first_name", &self.first_name, 2, "Name must be at least 2 characters");
        errors.min_chars("last_name", &self.last_name, 2, "Name must be at least 2 characters");
        errors.email("email", &self.email);
        errors.into_result()
    }

    /// Phone number with blanks treated as absent.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        non_blank(self.phone_number.as_deref())
    }
}

/// Password change form.
#[derive(Clone, Deserialize)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the form is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.current_password.chars().count() < MIN_CURRENT_PASSWORD_LENGTH {
            errors.add("current_password", "Current password required");
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add("new_password", "New password must be 8+ characters");
        } else if self.new_password == self.current_password {
            errors.add("new_password", "New password must differ from the current one");
        }
        if self.new_password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        errors.into_result()
    }
}

impl fmt::Debug for PasswordChangeForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordChangeForm { .. }")
    }
}

/// Contact form.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns the field errors when the form is invalid.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.min_chars("name", &self.name, 2, "Name must be at least 2 characters");
        if Email::parse(&self.email).is_err() {
            errors.add("email", "Invalid email address");
        }
        errors.min_chars("message", &self.message, 10, "Message must be at least 10 characters");
        errors.into_result()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
