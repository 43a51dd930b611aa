//! SQLite-backed implementation of the access store contracts.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::row_parsers::{actor_from_row, branch_from_row};
use crate::access::{Actor, BranchRecord, BranchStore, ModuleStore, PermissionStore, UserOverride};
use crate::errors::{AppError, AppResult};
use crate::utils::timestamp;

const BRANCH_COLUMNS: &str = "id, code, name, subdomain, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqliteAccessStore {
    pool: SqlitePool,
}

impl SqliteAccessStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn branch_where(&self, clause: &str, value: &str) -> AppResult<Option<BranchRecord>> {
        let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE {clause}");
        let row = sqlx::query(&sql).bind(value).fetch_optional(&self.pool).await?;

        row.map(|r| branch_from_row(&r).map(|b| BranchRecord::from(&b)))
            .transpose()
    }
}

#[async_trait]
impl PermissionStore for SqliteAccessStore {
    async fn role_grants(&self, role_id: Uuid) -> AppResult<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT permission_name FROM role_permissions WHERE role_id = ? ORDER BY permission_name",
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    async fn user_overrides(&self, actor_id: Uuid) -> AppResult<Vec<UserOverride>> {
        let rows = sqlx::query(
            "SELECT permission_name, grant_type FROM user_permission_overrides WHERE user_id = ? ORDER BY permission_name",
        )
        .bind(actor_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> AppResult<UserOverride> {
                let grant_type: String = r.try_get("grant_type")?;
                Ok(UserOverride {
                    permission: r.try_get("permission_name")?,
                    grant_type: grant_type.parse()?,
                })
            })
            .collect()
    }

    async fn set_role_grants(&self, role_id: Uuid, permissions: &[String]) -> AppResult<()> {
        let unique: BTreeSet<&String> = permissions.iter().collect();
        let now = timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await?;

        for permission in unique {
            sqlx::query("INSERT INTO role_permissions (role_id, permission_name, created_at) VALUES (?, ?, ?)")
                .bind(role_id.to_string())
                .bind(permission.as_str())
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(role_id = %role_id, count = permissions.len(), "role grants replaced");
        Ok(())
    }

    async fn set_user_overrides(&self, actor_id: Uuid, overrides: &[UserOverride]) -> AppResult<()> {
        let now = timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_permission_overrides WHERE user_id = ?")
            .bind(actor_id.to_string())
            .execute(&mut *tx)
            .await?;

        // a repeated permission keeps its last grant type
        for entry in overrides {
            sqlx::query(
                "INSERT INTO user_permission_overrides (user_id, permission_name, grant_type, created_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (user_id, permission_name) DO UPDATE SET grant_type = excluded.grant_type",
            )
            .bind(actor_id.to_string())
            .bind(&entry.permission)
            .bind(entry.grant_type.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(user_id = %actor_id, count = overrides.len(), "user overrides replaced");
        Ok(())
    }
}

#[async_trait]
impl BranchStore for SqliteAccessStore {
    async fn branch_by_code(&self, code: &str) -> AppResult<Option<BranchRecord>> {
        self.branch_where("code = ?", code).await
    }

    async fn branch_by_subdomain(&self, subdomain: &str) -> AppResult<Option<BranchRecord>> {
        self.branch_where("subdomain = ? COLLATE NOCASE AND is_active = 1", subdomain)
            .await
    }

    async fn branch_by_id(&self, id: Uuid) -> AppResult<Option<BranchRecord>> {
        self.branch_where("id = ?", &id.to_string()).await
    }
}

#[async_trait]
impl ModuleStore for SqliteAccessStore {
    async fn is_module_enabled(&self, slug: &str) -> AppResult<bool> {
        let enabled = sqlx::query_scalar::<_, bool>("SELECT is_enabled FROM modules WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(enabled.unwrap_or(false))
    }
}

/// Load the identity attributes of a user.
pub async fn fetch_actor(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<Actor>> {
    let row = sqlx::query("SELECT id, role, role_id, branch_id, status FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| actor_from_row(&r)).transpose()
}

/// Insert or refresh a module flag.
pub async fn upsert_module(pool: &SqlitePool, slug: &str, name: &str, enabled: bool) -> AppResult<()> {
    if slug.trim().is_empty() {
        return Err(AppError::bad_request("module slug must not be empty"));
    }

    sqlx::query(
        "INSERT INTO modules (slug, name, is_enabled, updated_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT (slug) DO UPDATE SET name = excluded.name, is_enabled = excluded.is_enabled, updated_at = excluded.updated_at",
    )
    .bind(slug)
    .bind(name)
    .bind(enabled)
    .bind(timestamp())
    .execute(pool)
    .await?;

    tracing::info!(module = %slug, enabled, "module flag updated");
    Ok(())
}
