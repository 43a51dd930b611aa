use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::{ActorRole, ActorStatus, EffectivePermissionSet, ScopeView};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: ActorRole,
    pub role_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: ActorStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Caller's own view of its access state.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserProfile,
    pub permissions: EffectivePermissionSet,
    /// Scope derived from the actor alone.
    pub default_scope: ScopeView,
    /// Scope resolved for this request, including headers and host.
    pub request_scope: ScopeView,
}
