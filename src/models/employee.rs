use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Employee {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub employee_code: String,
    pub full_name: String,
    pub designation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeCreateRequest {
    #[schema(example = "EMP-0042")]
    pub employee_code: String,
    #[schema(example = "Grace Hopper")]
    pub full_name: String,
    #[schema(example = "Mathematics Teacher")]
    pub designation: Option<String>,
    /// Required only when the caller's scope is unrestricted.
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmployeeUpdateRequest {
    pub full_name: Option<String>,
    pub designation: Option<String>,
}
