//! RBAC admin API.
//!
//! Roles, their permission grants, per-user overrides, and the computed
//! effective set for any user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::access::permissions::{OVERRIDE_MANAGE, OVERRIDE_READ, ROLE_MANAGE, ROLE_READ, WILDCARD};
use crate::access::{AccessContext, Actor, PermissionStore, Requirement};
use crate::app::AppState;
use crate::db::access_store::fetch_actor;
use crate::db::row_parsers::role_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::*;
use crate::utils::timestamp;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", get(get_role).delete(delete_role))
        .route(
            "/roles/:role_id/permissions",
            get(get_role_permissions).put(set_role_permissions),
        )
        .route(
            "/users/:user_id/overrides",
            get(get_user_overrides).put(set_user_overrides),
        )
        .route("/users/:user_id/effective-permissions", get(get_effective_permissions))
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

/// List all roles
#[utoipa::path(
    get,
    path = "/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "List of roles", body = Vec<Role>)),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, access: AccessContext) -> AppResult<Json<Vec<Role>>> {
    state.guard.authorize(&access, Requirement::new(ROLE_READ)).await?;

    let rows = sqlx::query("SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    let roles = rows.iter().map(role_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(roles))
}

/// Create a new role
#[utoipa::path(
    post,
    path = "/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 409, description = "Role name already exists"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    access: AccessContext,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    state.guard.authorize(&access, Requirement::new(ROLE_MANAGE)).await?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("role name is required"));
    }

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM roles WHERE name = ?")
        .bind(name)
        .fetch_one(&state.pool)
        .await?;
    if taken > 0 {
        return Err(AppError::conflict(format!("role {name} already exists")));
    }

    let id = Uuid::new_v4();
    let now = timestamp();

    sqlx::query("INSERT INTO roles (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(&req.description)
        .bind(&now)
        .bind(&now)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %access.actor.id, role_id = %id, role = %name, "role created");

    let role = fetch_role(&state.pool, id).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// Get a role by ID
#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role details", body = Role),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    access: AccessContext,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<Role>> {
    state.guard.authorize(&access, Requirement::new(ROLE_READ)).await?;
    Ok(Json(fetch_role(&state.pool, role_id).await?))
}

/// Delete a role
///
/// Users pointing at the role keep their coarse role and lose its grants.
#[utoipa::path(
    delete,
    path = "/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    access: AccessContext,
    Path(role_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.guard.authorize(&access, Requirement::new(ROLE_MANAGE)).await?;

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE users SET role_id = NULL WHERE role_id = ?")
        .bind(role_id.to_string())
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("role not found"));
    }

    tx.commit().await?;
    tracing::info!(user_id = %access.actor.id, role_id = %role_id, "role deleted");

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ROLE GRANTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/roles/{role_id}/permissions",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Permissions granted to the role", body = RoleGrants),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    access: AccessContext,
    Path(role_id): Path<Uuid>,
) -> AppResult<Json<RoleGrants>> {
    state.guard.authorize(&access, Requirement::new(ROLE_READ)).await?;
    fetch_role(&state.pool, role_id).await?;

    let permissions = state.guard.permission_store().role_grants(role_id).await?;
    Ok(Json(RoleGrants { role_id, permissions }))
}

/// Replace the role's grant set
///
/// The previous set is discarded atomically; readers never observe a mix.
#[utoipa::path(
    put,
    path = "/rbac/roles/{role_id}/permissions",
    tag = "RBAC",
    params(("role_id" = Uuid, Path, description = "Role ID")),
    request_body = SetRoleGrantsRequest,
    responses(
        (status = 200, description = "Grant set replaced", body = RoleGrants),
        (status = 400, description = "Malformed permission name"),
        (status = 403, description = "Missing permission, or wildcard granted by a non-super-admin"),
        (status = 404, description = "Role not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    access: AccessContext,
    Path(role_id): Path<Uuid>,
    Json(req): Json<SetRoleGrantsRequest>,
) -> AppResult<Json<RoleGrants>> {
    state.guard.authorize(&access, Requirement::new(ROLE_MANAGE)).await?;
    fetch_role(&state.pool, role_id).await?;

    if let Some(bad) = req.permissions.iter().find(|p| !validate_permission_name(p)) {
        return Err(AppError::bad_request(format!("invalid permission name: {bad:?}")));
    }
    ensure_wildcard_allowed(&access, req.permissions.iter().map(String::as_str))?;

    let store = state.guard.permission_store();
    store.set_role_grants(role_id, &req.permissions).await?;

    let permissions = store.role_grants(role_id).await?;
    Ok(Json(RoleGrants { role_id, permissions }))
}

// =============================================================================
// USER OVERRIDES
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/overrides",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Overrides for the user", body = UserOverrides),
        (status = 403, description = "User outside the caller's branch"),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_overrides(
    State(state): State<AppState>,
    access: AccessContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserOverrides>> {
    state.guard.authorize(&access, Requirement::new(OVERRIDE_READ)).await?;
    fetch_managed_user(&state.pool, &access, user_id).await?;

    let overrides = state.guard.permission_store().user_overrides(user_id).await?;
    Ok(Json(UserOverrides { user_id, overrides }))
}

#[utoipa::path(
    put,
    path = "/rbac/users/{user_id}/overrides",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    request_body = SetUserOverridesRequest,
    responses(
        (status = 200, description = "Overrides replaced", body = UserOverrides),
        (status = 400, description = "Malformed permission name"),
        (status = 403, description = "User outside the caller's branch, or wildcard granted by a non-super-admin"),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_user_overrides(
    State(state): State<AppState>,
    access: AccessContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetUserOverridesRequest>,
) -> AppResult<Json<UserOverrides>> {
    state.guard.authorize(&access, Requirement::new(OVERRIDE_MANAGE)).await?;
    fetch_managed_user(&state.pool, &access, user_id).await?;

    if let Some(bad) = req.overrides.iter().find(|o| !validate_permission_name(&o.permission)) {
        return Err(AppError::bad_request(format!(
            "invalid permission name: {:?}",
            bad.permission
        )));
    }
    ensure_wildcard_allowed(&access, req.overrides.iter().map(|o| o.permission.as_str()))?;

    let store = state.guard.permission_store();
    store.set_user_overrides(user_id, &req.overrides).await?;

    let overrides = store.user_overrides(user_id).await?;
    Ok(Json(UserOverrides { user_id, overrides }))
}

// =============================================================================
// EFFECTIVE PERMISSIONS
// =============================================================================

#[utoipa::path(
    get,
    path = "/rbac/users/{user_id}/effective-permissions",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Computed allow and deny sets", body = EffectivePermissions),
        (status = 403, description = "User outside the caller's branch"),
        (status = 404, description = "User not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    access: AccessContext,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    state.guard.authorize(&access, Requirement::new(OVERRIDE_READ)).await?;

    let actor = fetch_managed_user(&state.pool, &access, user_id).await?;
    let permissions = state.guard.resolve_permissions(&actor).await?;

    Ok(Json(EffectivePermissions {
        user_id,
        role: actor.role.to_string(),
        role_id: actor.role_id,
        permissions,
    }))
}

async fn fetch_role(pool: &SqlitePool, role_id: Uuid) -> AppResult<Role> {
    let row = sqlx::query("SELECT id, name, description, created_at, updated_at FROM roles WHERE id = ?")
        .bind(role_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("role not found"))?;

    role_from_row(&row)
}

/// Load a user whose access the caller wants to read or change.
///
/// Non-elevated callers only reach non-elevated users of their own branch.
async fn fetch_managed_user(pool: &SqlitePool, access: &AccessContext, user_id: Uuid) -> AppResult<Actor> {
    let target = fetch_actor(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if !access.actor.is_elevated() && (target.is_elevated() || target.branch_id.is_none()) {
        tracing::warn!(
            user_id = %access.actor.id,
            target = %target.id,
            "non-elevated actor addressing a user outside its branch"
        );
        return Err(AppError::forbidden("user belongs to another branch"));
    }
    access.ensure_branch_access(target.branch_id)?;

    Ok(target)
}

/// Only a super admin hands out the superuser wildcard.
fn ensure_wildcard_allowed<'a>(access: &AccessContext, mut names: impl Iterator<Item = &'a str>) -> AppResult<()> {
    if access.actor.is_super_admin() || !names.any(|name| name == WILDCARD) {
        return Ok(());
    }
    tracing::warn!(user_id = %access.actor.id, "wildcard grant attempted by non-super-admin");
    Err(AppError::forbidden(format!("only a super admin may grant {WILDCARD}")))
}
