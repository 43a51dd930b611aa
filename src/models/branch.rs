use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::access::BranchRecord;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Branch {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub subdomain: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Branch> for BranchRecord {
    fn from(branch: &Branch) -> Self {
        BranchRecord {
            id: branch.id,
            code: branch.code.clone(),
            subdomain: branch.subdomain.clone(),
            is_active: branch.is_active,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BranchCreateRequest {
    #[schema(example = "NORTH")]
    pub code: String,
    #[schema(example = "North Campus")]
    pub name: String,
    #[schema(example = "north")]
    pub subdomain: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BranchUpdateRequest {
    #[schema(example = "North Campus (Senior)")]
    pub name: Option<String>,
    pub subdomain: Option<String>,
    pub is_active: Option<bool>,
}
