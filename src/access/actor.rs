use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Coarse role tag carried by every actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    SuperAdmin,
    Admin,
    Principal,
    Teacher,
    Accountant,
    Librarian,
    Staff,
    Student,
    Parent,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::SuperAdmin => "super_admin",
            ActorRole::Admin => "admin",
            ActorRole::Principal => "principal",
            ActorRole::Teacher => "teacher",
            ActorRole::Accountant => "accountant",
            ActorRole::Librarian => "librarian",
            ActorRole::Staff => "staff",
            ActorRole::Student => "student",
            ActorRole::Parent => "parent",
        }
    }

    /// Elevated roles may address any branch and skip ownership checks.
    pub fn is_elevated(&self) -> bool {
        matches!(self, ActorRole::SuperAdmin | ActorRole::Admin)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, ActorRole::SuperAdmin)
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "super_admin" => Ok(ActorRole::SuperAdmin),
            "admin" => Ok(ActorRole::Admin),
            "principal" => Ok(ActorRole::Principal),
            "teacher" => Ok(ActorRole::Teacher),
            "accountant" => Ok(ActorRole::Accountant),
            "librarian" => Ok(ActorRole::Librarian),
            "staff" => Ok(ActorRole::Staff),
            "student" => Ok(ActorRole::Student),
            "parent" => Ok(ActorRole::Parent),
            other => Err(AppError::internal(format!("unknown role tag: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Active,
    Inactive,
    Suspended,
}

impl ActorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorStatus::Active => "active",
            ActorStatus::Inactive => "inactive",
            ActorStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for ActorStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(ActorStatus::Active),
            "inactive" => Ok(ActorStatus::Inactive),
            "suspended" => Ok(ActorStatus::Suspended),
            other => Err(AppError::internal(format!("unknown actor status: {other}"))),
        }
    }
}

/// The authenticated identity making a request. Read-only to the access core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
    /// Fine-grained role whose grants apply to this actor.
    pub role_id: Option<Uuid>,
    /// Home branch; `None` when unassigned.
    pub branch_id: Option<Uuid>,
    pub status: ActorStatus,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self {
            id,
            role,
            role_id: None,
            branch_id: None,
            status: ActorStatus::Active,
        }
    }

    pub fn with_role_id(mut self, role_id: Uuid) -> Self {
        self.role_id = Some(role_id);
        self
    }

    pub fn with_branch(mut self, branch_id: Uuid) -> Self {
        self.branch_id = Some(branch_id);
        self
    }

    pub fn with_status(mut self, status: ActorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    pub fn is_active(&self) -> bool {
        self.status == ActorStatus::Active
    }
}
