use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{EffectivePermissionSet, UserOverride};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "class_teacher")]
    pub name: String,
    #[schema(example = "Homeroom teachers")]
    pub description: Option<String>,
}

// =============================================================================
// ROLE GRANTS
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleGrants {
    pub role_id: Uuid,
    #[schema(example = json!(["hr.employee:read"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleGrantsRequest {
    #[schema(example = json!(["hr.employee:read", "branch:read"]))]
    pub permissions: Vec<String>,
}

// =============================================================================
// USER OVERRIDES
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserOverrides {
    pub user_id: Uuid,
    pub overrides: Vec<UserOverride>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetUserOverridesRequest {
    pub overrides: Vec<UserOverride>,
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    #[schema(example = "teacher")]
    pub role: String,
    pub role_id: Option<Uuid>,
    pub permissions: EffectivePermissionSet,
}

/// Permission names must be non-empty and free of whitespace.
pub fn validate_permission_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}
