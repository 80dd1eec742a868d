use serde::{Deserialize, Serialize};

use crate::enums::Role;
use crate::validation::{validate_username, ValidationResult};

/// The acting user for a session.
///
/// Built once at startup from the identity store and passed by reference to
/// every operation that needs an actor. Nothing on the server verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    /// Create an identity for a seeker after validating the username
    pub fn seeker(username: impl Into<String>) -> ValidationResult<Self> {
        Self::new(username, Role::Seeker)
    }

    /// Create an identity for Kevin
    pub fn kevin(username: impl Into<String>) -> ValidationResult<Self> {
        Self::new(username, Role::Kevin)
    }

    pub fn new(username: impl Into<String>, role: Role) -> ValidationResult<Self> {
        let username = username.into();
        validate_username(&username)?;
        Ok(Self { username, role })
    }

    pub fn is_kevin(&self) -> bool {
        self.role == Role::Kevin
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}
