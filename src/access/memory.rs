//! In-memory implementation of the store contracts, used by tests and local tooling.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{BranchRecord, BranchStore, ModuleStore, PermissionStore, UserOverride};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    role_grants: HashMap<Uuid, BTreeSet<String>>,
    overrides: HashMap<Uuid, Vec<UserOverride>>,
    branches: Vec<BranchRecord>,
    modules: HashMap<String, bool>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, simulating an unreachable backend.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn insert_branch(&self, branch: BranchRecord) {
        let mut tables = self.tables.write().await;
        tables.branches.retain(|b| b.id != branch.id);
        tables.branches.push(branch);
    }

    pub async fn set_module(&self, slug: &str, enabled: bool) {
        self.tables.write().await.modules.insert(slug.to_string(), enabled);
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::store("memory store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn role_grants(&self, role_id: Uuid) -> AppResult<Vec<String>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .role_grants
            .get(&role_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn user_overrides(&self, actor_id: Uuid) -> AppResult<Vec<UserOverride>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.overrides.get(&actor_id).cloned().unwrap_or_default())
    }

    async fn set_role_grants(&self, role_id: Uuid, permissions: &[String]) -> AppResult<()> {
        self.check()?;
        let grants: BTreeSet<String> = permissions.iter().cloned().collect();
        self.tables.write().await.role_grants.insert(role_id, grants);
        Ok(())
    }

    async fn set_user_overrides(&self, actor_id: Uuid, overrides: &[UserOverride]) -> AppResult<()> {
        self.check()?;
        // last entry wins for a repeated permission, mirroring the unique (actor, permission) key
        let mut deduped: Vec<UserOverride> = Vec::with_capacity(overrides.len());
        for entry in overrides {
            deduped.retain(|o| o.permission != entry.permission);
            deduped.push(entry.clone());
        }
        self.tables.write().await.overrides.insert(actor_id, deduped);
        Ok(())
    }
}

#[async_trait]
impl BranchStore for MemoryStore {
    async fn branch_by_code(&self, code: &str) -> AppResult<Option<BranchRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.branches.iter().find(|b| b.code == code).cloned())
    }

    async fn branch_by_subdomain(&self, subdomain: &str) -> AppResult<Option<BranchRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .branches
            .iter()
            .find(|b| {
                b.is_active
                    && b.subdomain
                        .as_deref()
                        .is_some_and(|own| own.eq_ignore_ascii_case(subdomain))
            })
            .cloned())
    }

    async fn branch_by_id(&self, id: Uuid) -> AppResult<Option<BranchRecord>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.branches.iter().find(|b| b.id == id).cloned())
    }
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn is_module_enabled(&self, slug: &str) -> AppResult<bool> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.modules.get(slug).copied().unwrap_or(false))
    }
}
