use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use schoolgate::access::PermissionStore;
use schoolgate::db::access_store::upsert_module;
use schoolgate::db::SqliteAccessStore;
use schoolgate::models::rbac::validate_permission_name;

#[derive(Parser, Debug)]
#[command(author, version, about = "schoolgate admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Turn a module on, creating its flag if needed
    ModuleEnable {
        slug: String,
        /// Display name stored with the flag
        #[arg(long)]
        name: Option<String>,
    },
    /// Turn a module off
    ModuleDisable { slug: String },
    /// Replace the permission set of a named role
    GrantRole {
        role: String,
        #[arg(required = true)]
        permissions: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::ModuleEnable { slug, name } => {
            let pool = get_pool().await?;
            set_module(&pool, &slug, name, true).await?;
            println!("Module {slug} enabled");
        }
        Commands::ModuleDisable { slug } => {
            let pool = get_pool().await?;
            set_module(&pool, &slug, None, false).await?;
            println!("Module {slug} disabled");
        }
        Commands::GrantRole { role, permissions } => {
            let pool = get_pool().await?;
            let count = grant_role(&pool, &role, &permissions).await?;
            println!("Role {role} now holds {count} permission(s)");
        }
    }

    Ok(())
}

async fn set_module(pool: &SqlitePool, slug: &str, name: Option<String>, enabled: bool) -> anyhow::Result<()> {
    let slug = slug.trim().to_ascii_lowercase();
    let existing: Option<String> = sqlx::query_scalar("SELECT name FROM modules WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(pool)
        .await?;
    let name = name.or(existing).unwrap_or_else(|| slug.clone());

    upsert_module(pool, &slug, &name, enabled).await?;
    Ok(())
}

async fn grant_role(pool: &SqlitePool, role: &str, permissions: &[String]) -> anyhow::Result<usize> {
    if let Some(bad) = permissions.iter().find(|p| !validate_permission_name(p)) {
        anyhow::bail!("invalid permission name: {bad:?}");
    }

    let role_id: String = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("role {role} does not exist"))?;
    let role_id = Uuid::parse_str(&role_id).context("role id is not a uuid")?;

    let store = SqliteAccessStore::new(pool.clone());
    store.set_role_grants(role_id, permissions).await?;

    Ok(store.role_grants(role_id).await?.len())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let tracked: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations when run from the repo root, else the crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
