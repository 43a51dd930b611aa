//! Store contracts the access core reads from.
//!
//! Every method returns [`AppResult`]; an `Err` is a store failure and must be
//! propagated, never read as "no rows".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
    Allow,
    Deny,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Allow => "allow",
            GrantType::Deny => "deny",
        }
    }
}

impl std::str::FromStr for GrantType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "allow" => Ok(GrantType::Allow),
            "deny" => Ok(GrantType::Deny),
            other => Err(AppError::internal(format!("unknown grant type: {other}"))),
        }
    }
}

/// Per-actor allow/deny entry for a single permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserOverride {
    #[schema(example = "hr.employee:delete")]
    pub permission: String,
    pub grant_type: GrantType,
}

impl UserOverride {
    pub fn allow(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            grant_type: GrantType::Allow,
        }
    }

    pub fn deny(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            grant_type: GrantType::Deny,
        }
    }
}

/// Tenant record as seen by the scope resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BranchRecord {
    pub id: Uuid,
    pub code: String,
    pub subdomain: Option<String>,
    pub is_active: bool,
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Permission names granted to a fine-grained role.
    async fn role_grants(&self, role_id: Uuid) -> AppResult<Vec<String>>;

    async fn user_overrides(&self, actor_id: Uuid) -> AppResult<Vec<UserOverride>>;

    /// Replace the role's grant set in one atomic unit.
    async fn set_role_grants(&self, role_id: Uuid, permissions: &[String]) -> AppResult<()>;

    /// Replace the actor's overrides in one atomic unit.
    async fn set_user_overrides(&self, actor_id: Uuid, overrides: &[UserOverride]) -> AppResult<()>;
}

#[async_trait]
pub trait BranchStore: Send + Sync {
    async fn branch_by_code(&self, code: &str) -> AppResult<Option<BranchRecord>>;

    /// Only active branches are visible through this lookup.
    async fn branch_by_subdomain(&self, subdomain: &str) -> AppResult<Option<BranchRecord>>;

    async fn branch_by_id(&self, id: Uuid) -> AppResult<Option<BranchRecord>>;
}

#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// `false` for slugs with no row.
    async fn is_module_enabled(&self, slug: &str) -> AppResult<bool>;
}
