use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    User,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => f.write_str("ADMIN"),
            UserRole::User => f.write_str("USER"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(UserRole::Admin),
            "USER" => Ok(UserRole::User),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Browser profile identifier, carried in the `device_id` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(pub String);

/// Who is making the request. Decides whether per-viewer data lives in the
/// remote store (signed in) or in local storage (anonymous).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Authenticated { user_id: Uuid, role: UserRole },
    Anonymous { device_id: String },
}

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Authenticated { user_id, .. } => Some(*user_id),
            Viewer::Anonymous { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Viewer::Authenticated { role: UserRole::Admin, .. })
    }
}
