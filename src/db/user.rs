//! User model for gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum user name length in characters.
pub const MAX_NAME_LENGTH: usize = 64;

/// A registered user. Users own feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
}

impl NewUser {
    /// Create a new user request. The name is trimmed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
        }
    }

    /// Check the name is non-empty and not too long.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::GatorError::Validation("user name is empty".into()));
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(crate::GatorError::Validation(format!(
                "user name is longer than {MAX_NAME_LENGTH} characters"
            )));
        }
        Ok(())
    }
}
