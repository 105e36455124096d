//! Staff user profiles.

use serde::{Deserialize, Serialize};

/// Staff role. Roles are ordered: admin > doctor > receptionist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Receptionist,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Receptionist => "receptionist",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "receptionist" | "recepcionista" => Some(Role::Receptionist),
            "doctor" | "medico" | "médico" => Some(Role::Doctor),
            "admin" | "administrator" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Receptionist
    }
}

/// A staff member's profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    /// Unique login name
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl UserProfile {
    pub fn new(username: String, role: Role) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            username,
            role,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
