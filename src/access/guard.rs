use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::actor::Actor;
use super::effective::{EffectivePermissionSet, PermissionResolver};
use super::module_gate::ModuleGate;
use super::scope::{resolve_request_scope, BranchScope, ScopeSignals};
use super::store::{BranchStore, ModuleStore, PermissionStore};
use crate::errors::{AppError, AppResult};

/// Per-request authorization state, threaded explicitly through handlers.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub actor: Actor,
    pub effective: EffectivePermissionSet,
    pub scope: BranchScope,
}

impl AccessContext {
    pub fn can(&self, permission: &str) -> bool {
        self.actor.is_super_admin() || self.effective.has_permission(permission)
    }

    pub fn require(&self, permission: &str) -> AppResult<()> {
        if self.can(permission) {
            tracing::debug!(user_id = %self.actor.id, permission = %permission, "permission granted");
            Ok(())
        } else {
            tracing::debug!(user_id = %self.actor.id, permission = %permission, "permission denied");
            Err(AppError::forbidden(format!("missing permission {permission}")))
        }
    }

    /// Ownership check for a record owned by `owner`.
    ///
    /// Rows without an owning branch are shared and always pass.
    pub fn ensure_branch_access(&self, owner: Option<Uuid>) -> AppResult<()> {
        let Some(owner) = owner else {
            return Ok(());
        };
        if self.actor.is_elevated() {
            return Ok(());
        }

        match self.scope {
            BranchScope::Branch(scope) if scope == owner => Ok(()),
            BranchScope::Unrestricted => Ok(()),
            _ => {
                tracing::warn!(
                    user_id = %self.actor.id,
                    owner = %owner,
                    scope = ?self.scope,
                    "record outside resolved branch scope"
                );
                Err(AppError::forbidden("record belongs to another branch"))
            }
        }
    }

    pub fn scope_view(&self) -> ScopeView {
        ScopeView::from(self.scope)
    }
}

/// Serializable form of a [`BranchScope`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScopeView {
    #[schema(example = "branch")]
    pub kind: String,
    pub branch_id: Option<Uuid>,
}

impl From<BranchScope> for ScopeView {
    fn from(scope: BranchScope) -> Self {
        Self {
            kind: scope.label().to_string(),
            branch_id: scope.branch_id(),
        }
    }
}

/// What an operation needs before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub module: Option<&'static str>,
    pub permission: &'static str,
}

impl Requirement {
    pub const fn new(permission: &'static str) -> Self {
        Self {
            module: None,
            permission,
        }
    }

    pub const fn in_module(mut self, slug: &'static str) -> Self {
        self.module = Some(slug);
        self
    }
}

/// Request gate combining the module switch, the permission resolver and the
/// branch scope resolver. Holds injected store handles only.
#[derive(Clone)]
pub struct AuthorizationGuard {
    permissions: Arc<dyn PermissionStore>,
    branches: Arc<dyn BranchStore>,
    modules: Arc<dyn ModuleStore>,
}

impl AuthorizationGuard {
    pub fn new(
        permissions: Arc<dyn PermissionStore>,
        branches: Arc<dyn BranchStore>,
        modules: Arc<dyn ModuleStore>,
    ) -> Self {
        Self {
            permissions,
            branches,
            modules,
        }
    }

    /// Single store object implementing all three contracts.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PermissionStore + BranchStore + ModuleStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn permission_store(&self) -> &dyn PermissionStore {
        self.permissions.as_ref()
    }

    pub fn branch_store(&self) -> &dyn BranchStore {
        self.branches.as_ref()
    }

    pub fn module_gate(&self) -> ModuleGate<'_> {
        ModuleGate::new(self.modules.as_ref())
    }

    pub async fn resolve_permissions(&self, actor: &Actor) -> AppResult<EffectivePermissionSet> {
        PermissionResolver::new(self.permissions.as_ref()).resolve(actor).await
    }

    /// Scope first (it may reject outright), then permissions.
    pub async fn establish(&self, actor: Actor, signals: &ScopeSignals) -> AppResult<AccessContext> {
        let scope = resolve_request_scope(&actor, signals, self.branches.as_ref()).await?;
        let effective = self.resolve_permissions(&actor).await?;
        Ok(AccessContext {
            actor,
            effective,
            scope,
        })
    }

    /// Module gate (not-found on failure) followed by the permission gate
    /// (forbidden on failure).
    pub async fn authorize(&self, ctx: &AccessContext, requirement: Requirement) -> AppResult<()> {
        if let Some(slug) = requirement.module {
            self.module_gate().ensure_enabled(slug).await?;
        }
        ctx.require(requirement.permission)
    }
}
