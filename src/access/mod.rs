//! Access-control and tenant-scoping engine.
//!
//! Every request goes through the same steps:
//! - the actor is authenticated (see [`crate::jwt::AuthUser`])
//! - the branch scope is resolved from headers, host and home branch
//! - role grants and user overrides are folded into an effective permission set
//! - the [`AuthorizationGuard`] checks the module switch and the required permission
//!
//! Handlers then apply [`AccessContext::scope`] as their query filter and call
//! [`AccessContext::ensure_branch_access`] before touching a single record.

mod actor;
mod effective;
mod extract;
mod guard;
pub mod memory;
mod module_gate;
mod scope;
mod store;

pub use actor::{Actor, ActorRole, ActorStatus};
pub use effective::{EffectivePermissionSet, PermissionResolver};
pub use extract::{require_module, scope_signals_from_headers, ScopeHeaders};
pub use guard::{AccessContext, AuthorizationGuard, Requirement, ScopeView};
pub use module_gate::ModuleGate;
pub use scope::{resolve_request_scope, subdomain_candidate, BranchScope, ScopeSignals};
pub use store::{BranchRecord, BranchStore, GrantType, ModuleStore, PermissionStore, UserOverride};

/// Module slugs gated by [`ModuleGate`].
pub mod modules {
    pub const HR: &str = "hr";
}

/// Well-known permission names
pub mod permissions {
    /// Superuser wildcard; absolute and cannot be denied.
    pub const WILDCARD: &str = "*:manage";

    // Branches
    pub const BRANCH_READ: &str = "branch:read";
    pub const BRANCH_MANAGE: &str = "branch:manage";

    // HR
    pub const HR_EMPLOYEE_READ: &str = "hr.employee:read";
    pub const HR_EMPLOYEE_CREATE: &str = "hr.employee:create";
    pub const HR_EMPLOYEE_UPDATE: &str = "hr.employee:update";
    pub const HR_EMPLOYEE_DELETE: &str = "hr.employee:delete";

    // RBAC
    pub const ROLE_READ: &str = "rbac.role:read";
    pub const ROLE_MANAGE: &str = "rbac.role:manage";
    pub const OVERRIDE_READ: &str = "rbac.override:read";
    pub const OVERRIDE_MANAGE: &str = "rbac.override:manage";

    // System
    pub const MODULE_MANAGE: &str = "system.module:manage";
}
