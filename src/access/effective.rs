use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::actor::Actor;
use super::permissions::WILDCARD;
use super::store::{GrantType, PermissionStore};
use crate::errors::AppResult;

/// Allow/deny permission names resolved for one actor at request time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct EffectivePermissionSet {
    pub allow: BTreeSet<String>,
    pub deny: BTreeSet<String>,
}

impl EffectivePermissionSet {
    pub fn superuser() -> Self {
        Self {
            allow: BTreeSet::from([WILDCARD.to_string()]),
            deny: BTreeSet::new(),
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.allow.contains(WILDCARD)
    }

    /// Wildcard first, then deny, then allow. Anything else is denied.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.is_superuser() {
            return true;
        }
        if self.deny.contains(permission) {
            return false;
        }
        self.allow.contains(permission)
    }
}

/// Combines role grants and per-user overrides into an [`EffectivePermissionSet`].
pub struct PermissionResolver<'a> {
    store: &'a dyn PermissionStore,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(store: &'a dyn PermissionStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, actor: &Actor) -> AppResult<EffectivePermissionSet> {
        if actor.is_super_admin() {
            tracing::debug!(user_id = %actor.id, "super_admin resolves to wildcard");
            return Ok(EffectivePermissionSet::superuser());
        }

        let mut allow: BTreeSet<String> = match actor.role_id {
            Some(role_id) => self.store.role_grants(role_id).await?.into_iter().collect(),
            None => BTreeSet::new(),
        };
        let mut deny = BTreeSet::new();

        for entry in self.store.user_overrides(actor.id).await? {
            match entry.grant_type {
                GrantType::Allow => allow.insert(entry.permission),
                GrantType::Deny => deny.insert(entry.permission),
            };
        }

        tracing::debug!(
            user_id = %actor.id,
            allowed = allow.len(),
            denied = deny.len(),
            "resolved effective permissions"
        );

        Ok(EffectivePermissionSet { allow, deny })
    }
}
