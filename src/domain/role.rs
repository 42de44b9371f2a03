//! Caller roles
//!
//! Carried in the JWT `idrole` claim as 1 (admin) or 2 (customer).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn code(&self) -> i32 {
        match self {
            Self::Admin => 1,
            Self::Customer => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Admin),
            2 => Some(Self::Customer),
            _ => None,
        }
    }

    /// Admins list and fetch records of every owner
    pub fn can_view_all_records(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl TryFrom<i32> for Role {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown role {}", code))
    }
}

impl From<Role> for i32 {
    fn from(role: Role) -> Self {
        role.code()
    }
}
