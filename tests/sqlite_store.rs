mod common;

use anyhow::Result;
use uuid::Uuid;

use schoolgate::access::{
    Actor, ActorRole, AuthorizationGuard, BranchScope, BranchStore, ModuleStore, PermissionStore, ScopeSignals,
    UserOverride,
};
use schoolgate::db::SqliteAccessStore;
use schoolgate::errors::AppError;

use common::*;

#[tokio::test]
async fn role_grants_are_replaced_wholesale() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let role = insert_role(&pool, "librarian", &["library.book:read", "library.book:issue"]).await?;
    let store = SqliteAccessStore::new(pool.clone());

    store
        .set_role_grants(role, &["library.book:read".to_string(), "library.member:read".to_string()])
        .await?;
    assert_eq!(
        store.role_grants(role).await?,
        vec!["library.book:read".to_string(), "library.member:read".to_string()]
    );

    store.set_role_grants(role, &[]).await?;
    assert!(store.role_grants(role).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn failed_replace_keeps_previous_grants() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let store = SqliteAccessStore::new(pool.clone());
    let user = insert_user(&pool, "someone@example.com", "staff", None, None).await?;
    store
        .set_user_overrides(user, &[UserOverride::allow("hr.employee:read")])
        .await?;

    // overrides for a user that does not exist violate the foreign key
    let ghost = Uuid::new_v4();
    let result = store.set_user_overrides(ghost, &[UserOverride::deny("hr.employee:read")]).await;
    assert!(matches!(result, Err(AppError::Database(_))));

    assert_eq!(
        store.user_overrides(user).await?,
        vec![UserOverride::allow("hr.employee:read")]
    );
    assert!(store.user_overrides(ghost).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn repeated_override_keeps_last_grant_type() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let store = SqliteAccessStore::new(pool.clone());
    let user = insert_user(&pool, "someone@example.com", "staff", None, None).await?;

    store
        .set_user_overrides(
            user,
            &[UserOverride::allow("branch:read"), UserOverride::deny("branch:read")],
        )
        .await?;
    assert_eq!(store.user_overrides(user).await?, vec![UserOverride::deny("branch:read")]);

    Ok(())
}

#[tokio::test]
async fn subdomain_lookup_ignores_inactive_branches() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let active = insert_branch(&pool, "NORTH", Some("north"), true).await?;
    insert_branch(&pool, "OLD", Some("old"), false).await?;
    let store = SqliteAccessStore::new(pool.clone());

    let found = store.branch_by_subdomain("North").await?;
    assert_eq!(found.map(|b| b.id), Some(active));
    assert!(store.branch_by_subdomain("old").await?.is_none());

    // code lookups still see inactive rows
    assert!(store.branch_by_code("OLD").await?.is_some());
    assert_eq!(store.branch_by_id(active).await?.map(|b| b.code), Some("NORTH".to_string()));

    Ok(())
}

#[tokio::test]
async fn subdomains_are_unique_ignoring_case() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let north = insert_branch(&pool, "NORTH", Some("north"), true).await?;

    let clash = insert_branch(&pool, "NORTH-2", Some("North"), true).await;
    assert!(clash.is_err(), "case variant of an existing subdomain was accepted");

    let store = SqliteAccessStore::new(pool.clone());
    assert_eq!(store.branch_by_subdomain("NORTH").await?.map(|b| b.id), Some(north));

    Ok(())
}

#[tokio::test]
async fn modules_are_fail_closed() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let store = SqliteAccessStore::new(pool.clone());

    assert!(!store.is_module_enabled("hr").await?);

    set_module(&pool, "hr", true).await?;
    assert!(store.is_module_enabled("hr").await?);

    set_module(&pool, "hr", false).await?;
    assert!(!store.is_module_enabled("hr").await?);

    Ok(())
}

#[tokio::test]
async fn guard_over_sqlite_resolves_scope_and_permissions() -> Result<()> {
    let (_dir, pool) = test_pool().await?;
    let north = insert_branch(&pool, "NORTH", Some("north"), true).await?;
    let role = insert_role(&pool, "teaching_staff", &["hr.employee:read"]).await?;
    let guard = AuthorizationGuard::from_store(std::sync::Arc::new(SqliteAccessStore::new(pool.clone())));

    let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher)
        .with_role_id(role)
        .with_branch(north);
    let ctx = guard.establish(teacher, &ScopeSignals::new()).await?;

    assert_eq!(ctx.scope, BranchScope::Branch(north));
    assert!(ctx.can("hr.employee:read"));
    assert!(!ctx.can("hr.employee:delete"));

    Ok(())
}
