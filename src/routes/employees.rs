use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::access::permissions::{HR_EMPLOYEE_CREATE, HR_EMPLOYEE_DELETE, HR_EMPLOYEE_READ, HR_EMPLOYEE_UPDATE};
use crate::access::{modules, AccessContext, BranchScope, BranchStore, Requirement};
use crate::app::AppState;
use crate::db::row_parsers::employee_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::employee::{Employee, EmployeeCreateRequest, EmployeeUpdateRequest};
use crate::utils::timestamp;

const EMPLOYEE_COLUMNS: &str =
    "id, branch_id, employee_code, full_name, designation, created_at, updated_at, deleted_at";

const READ: Requirement = Requirement::new(HR_EMPLOYEE_READ).in_module(modules::HR);
const CREATE: Requirement = Requirement::new(HR_EMPLOYEE_CREATE).in_module(modules::HR);
const UPDATE: Requirement = Requirement::new(HR_EMPLOYEE_UPDATE).in_module(modules::HR);
const DELETE: Requirement = Requirement::new(HR_EMPLOYEE_DELETE).in_module(modules::HR);

#[utoipa::path(
    get,
    path = "/hr/employees",
    tag = "HR",
    responses(
        (status = 200, description = "Employees in the resolved scope", body = [Employee]),
        (status = 404, description = "HR module disabled")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_employees(
    State(state): State<AppState>,
    access: AccessContext,
) -> AppResult<Json<Vec<Employee>>> {
    state.guard.authorize(&access, READ).await?;

    let rows = match access.scope {
        BranchScope::Unrestricted => {
            sqlx::query(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE deleted_at IS NULL ORDER BY employee_code"
            ))
            .fetch_all(&state.pool)
            .await?
        }
        BranchScope::Branch(branch_id) => {
            sqlx::query(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE deleted_at IS NULL AND branch_id = ? ORDER BY employee_code"
            ))
            .bind(branch_id.to_string())
            .fetch_all(&state.pool)
            .await?
        }
        BranchScope::Unassigned => Vec::new(),
    };

    let employees = rows.iter().map(employee_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(employees))
}

#[utoipa::path(
    post,
    path = "/hr/employees",
    tag = "HR",
    request_body = EmployeeCreateRequest,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "No target branch could be determined"),
        (status = 403, description = "Missing permission or foreign branch")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_employee(
    State(state): State<AppState>,
    access: AccessContext,
    Json(payload): Json<EmployeeCreateRequest>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    state.guard.authorize(&access, CREATE).await?;

    let branch_id = match access.scope {
        BranchScope::Branch(branch_id) => {
            // a body branch can only restate the scoped one
            if payload.branch_id.is_some_and(|b| b != branch_id) {
                access.ensure_branch_access(payload.branch_id)?;
            }
            payload.branch_id.unwrap_or(branch_id)
        }
        BranchScope::Unrestricted => payload
            .branch_id
            .ok_or_else(|| AppError::bad_request("branch_id is required without a branch scope"))?,
        BranchScope::Unassigned => {
            return Err(AppError::forbidden("no branch assigned to this account"));
        }
    };

    if state.guard.branch_store().branch_by_id(branch_id).await?.is_none() {
        return Err(AppError::bad_request("unknown branch"));
    }

    let code = payload.employee_code.trim();
    let full_name = payload.full_name.trim();
    if code.is_empty() || full_name.is_empty() {
        return Err(AppError::bad_request("employee_code and full_name are required"));
    }

    let id = Uuid::new_v4();
    let now = timestamp();

    sqlx::query(
        "INSERT INTO employees (id, branch_id, employee_code, full_name, designation, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(branch_id.to_string())
    .bind(code)
    .bind(full_name)
    .bind(&payload.designation)
    .bind(&now)
    .bind(&now)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %access.actor.id, employee_id = %id, branch_id = %branch_id, "employee created");

    let employee = fetch_employee(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

#[utoipa::path(
    get,
    path = "/hr/employees/{id}",
    tag = "HR",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses(
        (status = 200, description = "Employee detail", body = Employee),
        (status = 403, description = "Employee belongs to another branch"),
        (status = 404, description = "Employee not found or HR module disabled")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_employee(
    State(state): State<AppState>,
    access: AccessContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Employee>> {
    state.guard.authorize(&access, READ).await?;

    let employee = fetch_employee(&state.pool, id).await?;
    access.ensure_branch_access(Some(employee.branch_id))?;
    Ok(Json(employee))
}

#[utoipa::path(
    put,
    path = "/hr/employees/{id}",
    tag = "HR",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body = EmployeeUpdateRequest,
    responses((status = 200, description = "Employee updated", body = Employee)),
    security(("bearerAuth" = []))
)]
pub async fn update_employee(
    State(state): State<AppState>,
    access: AccessContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<EmployeeUpdateRequest>,
) -> AppResult<Json<Employee>> {
    state.guard.authorize(&access, UPDATE).await?;

    let mut employee = fetch_employee(&state.pool, id).await?;
    access.ensure_branch_access(Some(employee.branch_id))?;

    if let Some(full_name) = payload.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        employee.full_name = full_name.to_string();
    }
    if payload.designation.is_some() {
        employee.designation = payload.designation;
    }

    sqlx::query("UPDATE employees SET full_name = ?, designation = ?, updated_at = ? WHERE id = ?")
        .bind(&employee.full_name)
        .bind(&employee.designation)
        .bind(timestamp())
        .bind(employee.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %access.actor.id, employee_id = %employee.id, "employee updated");

    Ok(Json(fetch_employee(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/hr/employees/{id}",
    tag = "HR",
    params(("id" = Uuid, Path, description = "Employee id")),
    responses((status = 204, description = "Employee removed")),
    security(("bearerAuth" = []))
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    access: AccessContext,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.guard.authorize(&access, DELETE).await?;

    let employee = fetch_employee(&state.pool, id).await?;
    access.ensure_branch_access(Some(employee.branch_id))?;

    let now = timestamp();
    sqlx::query("UPDATE employees SET deleted_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(employee.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %access.actor.id, employee_id = %employee.id, "employee soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_employee(pool: &SqlitePool, id: Uuid) -> AppResult<Employee> {
    let row = sqlx::query(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? AND deleted_at IS NULL"
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(AppError::resource_not_found)?;

    employee_from_row(&row)
}
