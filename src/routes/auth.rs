use axum::extract::State;
use axum::Json;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::access::{AccessContext, BranchScope, ScopeView};
use crate::app::AppState;
use crate::db::row_parsers::user_profile_from_row;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, LoginRequest, MeResponse, UserProfile};
use crate::utils::verify_password;

const USER_COLUMNS: &str = "id, name, email, role, role_id, branch_id, status";

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let row = sqlx::query(&format!(
        "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"
    ))
    .bind(payload.email.trim())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_hash: String = row.try_get("password_hash")?;
    if !verify_password(&payload.password, &password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user = user_profile_from_row(&row)?;
    if user.status != crate::access::ActorStatus::Active {
        return Err(AppError::unauthorized("account is not active"));
    }

    let token = state.jwt.encode(user.id)?;
    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current actor with resolved access", body = MeResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Cross-branch header from a non-elevated actor")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, access: AccessContext) -> AppResult<Json<MeResponse>> {
    let user = fetch_user_profile(&state.pool, access.actor.id).await?;

    Ok(Json(MeResponse {
        user,
        default_scope: ScopeView::from(BranchScope::default_for(&access.actor)),
        request_scope: access.scope_view(),
        permissions: access.effective,
    }))
}

pub async fn fetch_user_profile(pool: &SqlitePool, user_id: Uuid) -> AppResult<UserProfile> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    user_profile_from_row(&row)
}
