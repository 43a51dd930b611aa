use axum::extract::{Path, State};
use axum::Json;

use crate::access::permissions::MODULE_MANAGE;
use crate::access::{AccessContext, Requirement};
use crate::app::AppState;
use crate::db::access_store::upsert_module;
use crate::db::row_parsers::module_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::module::{ModuleFlag, ModuleToggleRequest};

#[utoipa::path(
    get,
    path = "/modules",
    tag = "Modules",
    responses((status = 200, description = "All module flags", body = [ModuleFlag])),
    security(("bearerAuth" = []))
)]
pub async fn list_modules(State(state): State<AppState>, access: AccessContext) -> AppResult<Json<Vec<ModuleFlag>>> {
    state.guard.authorize(&access, Requirement::new(MODULE_MANAGE)).await?;

    let rows = sqlx::query("SELECT slug, name, is_enabled, updated_at FROM modules ORDER BY slug")
        .fetch_all(&state.pool)
        .await?;

    let flags = rows.iter().map(module_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(flags))
}

/// Enable or disable a module, creating its row on first use.
#[utoipa::path(
    put,
    path = "/modules/{slug}",
    tag = "Modules",
    params(("slug" = String, Path, description = "Module slug")),
    request_body = ModuleToggleRequest,
    responses((status = 200, description = "Module flag after the change", body = ModuleFlag)),
    security(("bearerAuth" = []))
)]
pub async fn toggle_module(
    State(state): State<AppState>,
    access: AccessContext,
    Path(slug): Path<String>,
    Json(payload): Json<ModuleToggleRequest>,
) -> AppResult<Json<ModuleFlag>> {
    state.guard.authorize(&access, Requirement::new(MODULE_MANAGE)).await?;

    let slug = slug.trim().to_ascii_lowercase();
    let existing: Option<String> = sqlx::query_scalar("SELECT name FROM modules WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&state.pool)
        .await?;
    let name = payload
        .name
        .filter(|n| !n.trim().is_empty())
        .or(existing)
        .unwrap_or_else(|| slug.clone());

    upsert_module(&state.pool, &slug, &name, payload.is_enabled).await?;
    tracing::info!(user_id = %access.actor.id, module = %slug, enabled = payload.is_enabled, "module toggled");

    let row = sqlx::query("SELECT slug, name, is_enabled, updated_at FROM modules WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::internal("module row missing after upsert"))?;

    Ok(Json(module_from_row(&row)?))
}
