use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::access::permissions::{BRANCH_MANAGE, BRANCH_READ};
use crate::access::{AccessContext, BranchScope, Requirement};
use crate::app::AppState;
use crate::db::row_parsers::branch_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::branch::{Branch, BranchCreateRequest, BranchUpdateRequest};
use crate::utils::timestamp;

const BRANCH_COLUMNS: &str = "id, code, name, subdomain, is_active, created_at, updated_at";

#[utoipa::path(
    get,
    path = "/branches",
    tag = "Branches",
    responses((status = 200, description = "Branches visible in the resolved scope", body = [Branch])),
    security(("bearerAuth" = []))
)]
pub async fn list_branches(State(state): State<AppState>, access: AccessContext) -> AppResult<Json<Vec<Branch>>> {
    state.guard.authorize(&access, Requirement::new(BRANCH_READ)).await?;

    let rows = match access.scope {
        BranchScope::Unrestricted => {
            sqlx::query(&format!("SELECT {BRANCH_COLUMNS} FROM branches ORDER BY code"))
                .fetch_all(&state.pool)
                .await?
        }
        BranchScope::Branch(id) => {
            sqlx::query(&format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?"))
                .bind(id.to_string())
                .fetch_all(&state.pool)
                .await?
        }
        BranchScope::Unassigned => Vec::new(),
    };

    let branches = rows.iter().map(branch_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(branches))
}

#[utoipa::path(
    post,
    path = "/branches",
    tag = "Branches",
    request_body = BranchCreateRequest,
    responses(
        (status = 201, description = "Branch created", body = Branch),
        (status = 409, description = "Branch code or subdomain already in use")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_branch(
    State(state): State<AppState>,
    access: AccessContext,
    Json(payload): Json<BranchCreateRequest>,
) -> AppResult<(StatusCode, Json<Branch>)> {
    state.guard.authorize(&access, Requirement::new(BRANCH_MANAGE)).await?;

    let code = payload.code.trim();
    if code.is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::bad_request("branch code and name are required"));
    }
    let subdomain = normalize_subdomain(payload.subdomain.as_deref());
    ensure_unique(&state.pool, code, subdomain.as_deref(), None).await?;

    let id = Uuid::new_v4();
    let now = timestamp();

    sqlx::query(
        "INSERT INTO branches (id, code, name, subdomain, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(code)
    .bind(payload.name.trim())
    .bind(&subdomain)
    .bind(payload.is_active.unwrap_or(true))
    .bind(&now)
    .bind(&now)
    .execute(&state.pool)
    .await?;

    tracing::info!(user_id = %access.actor.id, branch_id = %id, code = %code, "branch created");

    let branch = fetch_branch(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

#[utoipa::path(
    get,
    path = "/branches/{id}",
    tag = "Branches",
    params(("id" = Uuid, Path, description = "Branch id")),
    responses(
        (status = 200, description = "Branch detail", body = Branch),
        (status = 403, description = "Branch outside the caller's scope"),
        (status = 404, description = "Branch not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_branch(
    State(state): State<AppState>,
    access: AccessContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Branch>> {
    state.guard.authorize(&access, Requirement::new(BRANCH_READ)).await?;

    let branch = fetch_branch(&state.pool, id).await?;
    access.ensure_branch_access(Some(branch.id))?;
    Ok(Json(branch))
}

#[utoipa::path(
    put,
    path = "/branches/{id}",
    tag = "Branches",
    params(("id" = Uuid, Path, description = "Branch id")),
    request_body = BranchUpdateRequest,
    responses((status = 200, description = "Branch updated", body = Branch)),
    security(("bearerAuth" = []))
)]
pub async fn update_branch(
    State(state): State<AppState>,
    access: AccessContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<BranchUpdateRequest>,
) -> AppResult<Json<Branch>> {
    state.guard.authorize(&access, Requirement::new(BRANCH_MANAGE)).await?;

    let mut branch = fetch_branch(&state.pool, id).await?;
    access.ensure_branch_access(Some(branch.id))?;

    if let Some(name) = payload.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        branch.name = name.to_string();
    }
    if payload.subdomain.is_some() {
        branch.subdomain = normalize_subdomain(payload.subdomain.as_deref());
        ensure_unique(&state.pool, &branch.code, branch.subdomain.as_deref(), Some(branch.id)).await?;
    }
    if let Some(is_active) = payload.is_active {
        branch.is_active = is_active;
    }

    sqlx::query("UPDATE branches SET name = ?, subdomain = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(&branch.name)
        .bind(&branch.subdomain)
        .bind(branch.is_active)
        .bind(timestamp())
        .bind(branch.id.to_string())
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %access.actor.id, branch_id = %branch.id, "branch updated");

    let branch = fetch_branch(&state.pool, id).await?;
    Ok(Json(branch))
}

fn normalize_subdomain(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
}

async fn ensure_unique(pool: &SqlitePool, code: &str, subdomain: Option<&str>, exclude: Option<Uuid>) -> AppResult<()> {
    let exclude = exclude.map(|id| id.to_string()).unwrap_or_default();

    let clashes: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM branches WHERE id != ? AND (code = ? OR (? IS NOT NULL AND subdomain = ? COLLATE NOCASE))",
    )
    .bind(&exclude)
    .bind(code)
    .bind(subdomain)
    .bind(subdomain)
    .fetch_one(pool)
    .await?;

    if clashes > 0 {
        return Err(AppError::conflict("branch code or subdomain already in use"));
    }
    Ok(())
}

async fn fetch_branch(pool: &SqlitePool, id: Uuid) -> AppResult<Branch> {
    let row = sqlx::query(&format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(AppError::resource_not_found)?;

    branch_from_row(&row)
}
