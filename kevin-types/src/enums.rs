use serde::{Deserialize, Serialize};

/// Who the local user claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The one user who publishes sightings
    Kevin,
    /// Everyone else: browses, comments and likes
    #[default]
    Seeker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Kevin => "kevin",
            Role::Seeker => "seeker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "kevin" => Some(Role::Kevin),
            "seeker" => Some(Role::Seeker),
            _ => None,
        }
    }
}

/// Error categories shared by server responses and client failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Upload,
    Storage,
    NotFound,
    #[default]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Upload => "upload",
            ErrorKind::Storage => "storage",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Kevin"), Some(Role::Kevin));
        assert_eq!(Role::parse("SEEKER"), Some(Role::Seeker));
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn test_error_kind_wire_format() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
        assert_eq!(ErrorKind::Upload.as_str(), "upload");
    }
}
