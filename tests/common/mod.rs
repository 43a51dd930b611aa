#![allow(dead_code)]

use std::path::Path;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use schoolgate::create_app;
use schoolgate::jwt::JwtConfig;
use schoolgate::utils::{hash_password, timestamp};

pub const JWT_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "password123";

/// Temp-file database with migrations applied. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn test_pool() -> Result<(TempDir, SqlitePool)> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok((dir, pool))
}

pub async fn test_app(pool: &SqlitePool) -> Result<Router> {
    std::env::set_var("JWT_SECRET", JWT_SECRET);
    Ok(create_app(pool.clone()).await?)
}

pub fn token_for(user_id: Uuid) -> Result<String> {
    Ok(JwtConfig::new(JWT_SECRET, 1).encode(user_id)?)
}

pub async fn insert_branch(pool: &SqlitePool, code: &str, subdomain: Option<&str>, is_active: bool) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = timestamp();
    sqlx::query(
        "INSERT INTO branches (id, code, name, subdomain, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(code)
    .bind(format!("{code} campus"))
    .bind(subdomain)
    .bind(is_active)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn insert_role(pool: &SqlitePool, name: &str, permissions: &[&str]) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = timestamp();
    sqlx::query("INSERT INTO roles (id, name, description, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

    for permission in permissions {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_name, created_at) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(*permission)
            .bind(&now)
            .execute(pool)
            .await?;
    }
    Ok(id)
}

pub async fn insert_user(
    pool: &SqlitePool,
    email: &str,
    role: &str,
    role_id: Option<Uuid>,
    branch_id: Option<Uuid>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = timestamp();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, role_id, branch_id, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)",
    )
    .bind(id.to_string())
    .bind(email.split('@').next().unwrap_or(email))
    .bind(email)
    .bind(hash_password(PASSWORD)?)
    .bind(role)
    .bind(role_id.map(|r| r.to_string()))
    .bind(branch_id.map(|b| b.to_string()))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn insert_override(pool: &SqlitePool, user_id: Uuid, permission: &str, grant_type: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_permission_overrides (user_id, permission_name, grant_type, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id.to_string())
    .bind(permission)
    .bind(grant_type)
    .bind(timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_module(pool: &SqlitePool, slug: &str, enabled: bool) -> Result<()> {
    schoolgate::db::access_store::upsert_module(pool, slug, slug, enabled).await?;
    Ok(())
}

pub async fn insert_employee(pool: &SqlitePool, branch_id: Uuid, code: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = timestamp();
    sqlx::query(
        "INSERT INTO employees (id, branch_id, employee_code, full_name, designation, created_at, updated_at) \
         VALUES (?, ?, ?, ?, NULL, ?, ?)",
    )
    .bind(id.to_string())
    .bind(branch_id.to_string())
    .bind(code)
    .bind(format!("Employee {code}"))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Send a request and decode the JSON body (Null when empty).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    dispatch(app, req).await
}

/// Send a bodiless request carrying one header given as raw bytes, which may
/// not be valid UTF-8.
pub async fn send_raw_header(
    app: &Router,
    method: &str,
    uri: &str,
    token: &str,
    name: &str,
    value: &[u8],
) -> Result<(StatusCode, Value)> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header(name, HeaderValue::from_bytes(value)?)
        .body(Body::empty())?;
    dispatch(app, req).await
}

async fn dispatch(app: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}
