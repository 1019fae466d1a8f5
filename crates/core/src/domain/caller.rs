// Caller Identity (passed through from the upstream auth layer)

use serde::{Deserialize, Serialize};

/// Role carried by an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Editor => write!(f, "EDITOR"),
            Role::Viewer => write!(f, "VIEWER"),
        }
    }
}

/// Identity of whoever issued the current request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Privileged callers see and act on every job and item.
    pub fn is_privileged(&self) -> bool {
        self.role == Role::Admin
    }

    /// Visibility rule shared by jobs and items
    pub fn can_access(&self, owner_id: &str) -> bool {
        self.is_privileged() || self.user_id == owner_id
    }
}
