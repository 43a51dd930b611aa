use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModuleFlag {
    #[schema(example = "hr")]
    pub slug: String,
    #[schema(example = "Human Resources")]
    pub name: String,
    pub is_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ModuleToggleRequest {
    pub is_enabled: bool,
    /// Display name used when the module row does not exist yet.
    pub name: Option<String>,
}
