//! Branch (tenant) scope resolution.
//!
//! Two strategies are exposed:
//! - [`resolve_request_scope`] honours explicit branch headers from elevated
//!   callers and infers a branch from the request subdomain.
//! - [`BranchScope::default_for`] derives the scope from the actor alone.

use std::net::IpAddr;

use uuid::Uuid;

use super::actor::Actor;
use super::store::BranchStore;
use crate::errors::{AppError, AppResult};

/// Branch a request is confined to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BranchScope {
    /// No branch restriction. Only reachable by elevated actors.
    #[default]
    Unrestricted,
    Branch(Uuid),
    /// Non-elevated actor with no home branch; sees no branch-owned data.
    Unassigned,
}

impl BranchScope {
    pub fn unrestricted() -> Self {
        Self::Unrestricted
    }

    pub fn branch_id(&self) -> Option<Uuid> {
        match self {
            Self::Branch(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Actor-derived default: elevated roles are unrestricted, everyone else
    /// is held to their home branch.
    pub fn default_for(actor: &Actor) -> Self {
        if actor.is_elevated() {
            Self::Unrestricted
        } else {
            Self::confined(actor.branch_id)
        }
    }

    fn confined(branch_id: Option<Uuid>) -> Self {
        match branch_id {
            Some(id) => Self::Branch(id),
            None => Self::Unassigned,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unrestricted => "unrestricted",
            Self::Branch(_) => "branch",
            Self::Unassigned => "unassigned",
        }
    }
}

/// Raw request signals consulted by [`resolve_request_scope`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSignals {
    pub branch_id: Option<String>,
    pub branch_code: Option<String>,
    pub host: Option<String>,
    /// The branch-id header arrived with values that disagree or do not decode.
    pub conflicting_branch_id: bool,
    pub conflicting_branch_code: bool,
}

impl ScopeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch_id(mut self, value: impl Into<String>) -> Self {
        self.branch_id = non_blank(value.into());
        self
    }

    pub fn with_branch_code(mut self, value: impl Into<String>) -> Self {
        self.branch_code = non_blank(value.into());
        self
    }

    pub fn with_conflicting_branch_id(mut self) -> Self {
        self.conflicting_branch_id = true;
        self
    }

    pub fn with_conflicting_branch_code(mut self) -> Self {
        self.conflicting_branch_code = true;
        self
    }

    pub fn with_host(mut self, value: impl Into<String>) -> Self {
        self.host = non_blank(value.into());
        self
    }

    pub fn subdomain(&self) -> Option<String> {
        self.host.as_deref().and_then(subdomain_candidate)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Leftmost label of `host`, only when the host has more than two labels.
pub fn subdomain_candidate(host: &str) -> Option<String> {
    let host = host.trim();
    if host.starts_with('[') {
        return None;
    }
    let host = host.split(':').next().unwrap_or(host).trim_end_matches('.');
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 || labels.iter().any(|label| label.is_empty()) {
        return None;
    }

    Some(labels[0].to_ascii_lowercase())
}

/// Resolve the branch scope of a request from headers, host and actor.
pub async fn resolve_request_scope(
    actor: &Actor,
    signals: &ScopeSignals,
    branches: &dyn BranchStore,
) -> AppResult<BranchScope> {
    let elevated = actor.is_elevated();

    // Checked before anything else: a non-elevated caller naming a branch
    // other than its own is rejected whatever the other signals say.
    if !elevated {
        if signals.conflicting_branch_id {
            tracing::warn!(
                user_id = %actor.id,
                role = %actor.role,
                "conflicting branch id headers from non-elevated actor"
            );
            return Err(AppError::forbidden("cannot address another branch"));
        }
        if let Some(raw) = signals.branch_id.as_deref() {
            let requested = Uuid::parse_str(raw).ok();
            if requested.is_none() || requested != actor.branch_id {
                tracing::warn!(
                    user_id = %actor.id,
                    role = %actor.role,
                    requested = %raw,
                    "cross-branch addressing by non-elevated actor"
                );
                return Err(AppError::forbidden("cannot address another branch"));
            }
        }
    }

    if elevated && signals.conflicting_branch_id {
        return Err(AppError::bad_request("conflicting branch id headers"));
    }
    if elevated && signals.conflicting_branch_code {
        return Err(AppError::bad_request("conflicting branch code headers"));
    }

    let mut resolved: Option<Uuid> = None;

    if let (true, Some(raw)) = (elevated, signals.branch_id.as_deref()) {
        let id = Uuid::parse_str(raw)
            .map_err(|_| AppError::bad_request(format!("invalid branch id header: {raw}")))?;
        resolved = Some(id);
    } else if let (true, Some(code)) = (elevated, signals.branch_code.as_deref()) {
        resolved = branches.branch_by_code(code).await?.map(|b| b.id);
        if resolved.is_none() {
            tracing::debug!(user_id = %actor.id, code = %code, "branch code did not match");
        }
    } else if let Some(subdomain) = signals.subdomain() {
        resolved = branches
            .branch_by_subdomain(&subdomain)
            .await?
            .filter(|b| b.is_active)
            .map(|b| b.id);
        // a non-elevated actor never leaves its home branch through the host
        if !elevated && resolved.is_some() && resolved != actor.branch_id {
            tracing::warn!(
                user_id = %actor.id,
                role = %actor.role,
                subdomain = %subdomain,
                "ignoring subdomain of another branch for non-elevated actor"
            );
            resolved = None;
        }
    }

    let scope = match resolved {
        Some(id) => BranchScope::Branch(id),
        None if elevated => BranchScope::Unrestricted,
        None => BranchScope::confined(actor.branch_id),
    };

    tracing::debug!(
        user_id = %actor.id,
        elevated,
        scope = ?scope,
        "resolved request scope"
    );

    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::actor::ActorRole;
    use crate::access::memory::MemoryStore;
    use crate::access::store::BranchRecord;

    fn branch(code: &str, subdomain: Option<&str>, is_active: bool) -> BranchRecord {
        BranchRecord {
            id: Uuid::new_v4(),
            code: code.to_string(),
            subdomain: subdomain.map(str::to_string),
            is_active,
        }
    }

    #[test]
    fn subdomain_needs_more_than_two_labels() {
        assert_eq!(subdomain_candidate("north.school.example.com").as_deref(), Some("north"));
        assert_eq!(subdomain_candidate("North.school.example.com:8443").as_deref(), Some("north"));
        assert_eq!(subdomain_candidate("example.com"), None);
        assert_eq!(subdomain_candidate("localhost:8000"), None);
        assert_eq!(subdomain_candidate("10.0.0.12"), None);
        assert_eq!(subdomain_candidate("[::1]:8000"), None);
    }

    #[test]
    fn default_scope_by_role() {
        let home = Uuid::new_v4();
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin).with_branch(home);
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);
        let unassigned = Actor::new(Uuid::new_v4(), ActorRole::Teacher);

        assert!(BranchScope::default_for(&admin).is_unrestricted());
        assert_eq!(BranchScope::default_for(&teacher).branch_id(), Some(home));
        assert_eq!(BranchScope::default_for(&unassigned), BranchScope::Unassigned);
    }

    #[tokio::test]
    async fn elevated_branch_id_header_is_used_verbatim() {
        let store = MemoryStore::new();
        let home = Uuid::new_v4();
        let target = Uuid::new_v4();
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin).with_branch(home);
        let signals = ScopeSignals::new().with_branch_id(target.to_string());

        let scope = resolve_request_scope(&admin, &signals, &store).await.unwrap();
        assert_eq!(scope.branch_id(), Some(target));
        assert!(BranchScope::default_for(&admin).is_unrestricted());
    }

    #[tokio::test]
    async fn elevated_branch_code_is_looked_up() {
        let store = MemoryStore::new();
        let east = branch("EAST", Some("east"), true);
        store.insert_branch(east.clone()).await;
        let admin = Actor::new(Uuid::new_v4(), ActorRole::SuperAdmin);

        let found = resolve_request_scope(&admin, &ScopeSignals::new().with_branch_code("EAST"), &store)
            .await
            .unwrap();
        assert_eq!(found.branch_id(), Some(east.id));

        let missing = resolve_request_scope(&admin, &ScopeSignals::new().with_branch_code("WEST"), &store)
            .await
            .unwrap();
        assert!(missing.is_unrestricted());
    }

    #[tokio::test]
    async fn branch_code_header_ignored_for_non_elevated() {
        let store = MemoryStore::new();
        let east = branch("EAST", None, true);
        store.insert_branch(east).await;
        let home = Uuid::new_v4();
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);

        let scope = resolve_request_scope(&teacher, &ScopeSignals::new().with_branch_code("EAST"), &store)
            .await
            .unwrap();
        assert_eq!(scope.branch_id(), Some(home));
    }

    #[tokio::test]
    async fn non_elevated_mismatched_header_is_rejected() {
        let store = MemoryStore::new();
        let north = branch("NORTH", Some("north"), true);
        store.insert_branch(north.clone()).await;
        let home = Uuid::new_v4();
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);

        for signals in [
            ScopeSignals::new().with_branch_id(Uuid::new_v4().to_string()),
            ScopeSignals::new()
                .with_branch_id(north.id.to_string())
                .with_host("north.school.example.com"),
            ScopeSignals::new()
                .with_branch_id("not-a-uuid")
                .with_branch_code("NORTH"),
        ] {
            let result = resolve_request_scope(&teacher, &signals, &store).await;
            assert!(matches!(result, Err(AppError::Forbidden(_))), "{signals:?}");
        }
    }

    #[tokio::test]
    async fn non_elevated_matching_header_is_accepted() {
        let store = MemoryStore::new();
        let home = Uuid::new_v4();
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);

        let scope = resolve_request_scope(&teacher, &ScopeSignals::new().with_branch_id(home.to_string()), &store)
            .await
            .unwrap();
        assert_eq!(scope.branch_id(), Some(home));
    }

    #[tokio::test]
    async fn unassigned_actor_naming_any_branch_is_rejected() {
        let store = MemoryStore::new();
        let student = Actor::new(Uuid::new_v4(), ActorRole::Student);

        let result = resolve_request_scope(
            &student,
            &ScopeSignals::new().with_branch_id(Uuid::new_v4().to_string()),
            &store,
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn unassigned_actor_without_signals_sees_nothing() {
        let store = MemoryStore::new();
        let student = Actor::new(Uuid::new_v4(), ActorRole::Student);

        let scope = resolve_request_scope(&student, &ScopeSignals::new(), &store).await.unwrap();
        assert_eq!(scope, BranchScope::Unassigned);
        assert!(!scope.is_unrestricted());
    }

    #[tokio::test]
    async fn subdomain_resolves_active_branch_only() {
        let store = MemoryStore::new();
        let north = branch("NORTH", Some("north"), true);
        let south = branch("SOUTH", Some("south"), false);
        store.insert_branch(north.clone()).await;
        store.insert_branch(south).await;
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);

        let scope = resolve_request_scope(&admin, &ScopeSignals::new().with_host("north.school.example.com"), &store)
            .await
            .unwrap();
        assert_eq!(scope.branch_id(), Some(north.id));

        let inactive = resolve_request_scope(&admin, &ScopeSignals::new().with_host("south.school.example.com"), &store)
            .await
            .unwrap();
        assert!(inactive.is_unrestricted());
    }

    #[tokio::test]
    async fn bare_domain_falls_back_to_home_branch() {
        let store = MemoryStore::new();
        let home = Uuid::new_v4();
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);

        let scope = resolve_request_scope(&teacher, &ScopeSignals::new().with_host("example.com"), &store)
            .await
            .unwrap();
        assert_eq!(scope.branch_id(), Some(home));

        let unknown = resolve_request_scope(&teacher, &ScopeSignals::new().with_host("school.example.com"), &store)
            .await
            .unwrap();
        assert_eq!(unknown.branch_id(), Some(home));
        assert_eq!(subdomain_candidate("school.example.com").as_deref(), Some("school"));
    }

    #[tokio::test]
    async fn non_elevated_foreign_subdomain_keeps_home_branch() {
        let store = MemoryStore::new();
        let north = branch("NORTH", Some("north"), true);
        let south = branch("SOUTH", Some("south"), true);
        store.insert_branch(north.clone()).await;
        store.insert_branch(south.clone()).await;
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(north.id);
        let unassigned = Actor::new(Uuid::new_v4(), ActorRole::Teacher);
        let signals = ScopeSignals::new().with_host("south.school.example.com");

        let scope = resolve_request_scope(&teacher, &signals, &store).await.unwrap();
        assert_eq!(scope, BranchScope::Branch(north.id));

        let own = resolve_request_scope(&teacher, &ScopeSignals::new().with_host("north.school.example.com"), &store)
            .await
            .unwrap();
        assert_eq!(own, BranchScope::Branch(north.id));

        let scope = resolve_request_scope(&unassigned, &signals, &store).await.unwrap();
        assert_eq!(scope, BranchScope::Unassigned);
    }

    #[tokio::test]
    async fn three_label_host_uses_its_first_label() {
        // `school.example.com` has three labels, so `school` is looked up like any other subdomain
        let store = MemoryStore::new();
        let school = branch("SCHOOL", Some("school"), true);
        store.insert_branch(school.clone()).await;
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);

        let scope = resolve_request_scope(&admin, &ScopeSignals::new().with_host("school.example.com"), &store)
            .await
            .unwrap();
        assert_eq!(scope, BranchScope::Branch(school.id));

        let without_branch = MemoryStore::new();
        let scope = resolve_request_scope(&admin, &ScopeSignals::new().with_host("school.example.com"), &without_branch)
            .await
            .unwrap();
        assert!(scope.is_unrestricted());
    }

    #[tokio::test]
    async fn conflicting_branch_id_headers_are_rejected() {
        let store = MemoryStore::new();
        let home = Uuid::new_v4();
        let teacher = Actor::new(Uuid::new_v4(), ActorRole::Teacher).with_branch(home);
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);
        let signals = ScopeSignals::new()
            .with_branch_id(home.to_string())
            .with_conflicting_branch_id();

        let result = resolve_request_scope(&teacher, &signals, &store).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let result = resolve_request_scope(&admin, &signals, &store).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        // code headers are ignored for non-elevated actors, conflicting or not
        let codes = ScopeSignals::new().with_conflicting_branch_code();
        let scope = resolve_request_scope(&teacher, &codes, &store).await.unwrap();
        assert_eq!(scope.branch_id(), Some(home));
        let result = resolve_request_scope(&admin, &codes, &store).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn elevated_without_signals_is_unrestricted() {
        let store = MemoryStore::new();
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin).with_branch(Uuid::new_v4());

        let scope = resolve_request_scope(&admin, &ScopeSignals::new(), &store).await.unwrap();
        assert!(scope.is_unrestricted());
    }

    #[tokio::test]
    async fn elevated_malformed_branch_id_is_bad_request() {
        let store = MemoryStore::new();
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);

        let result = resolve_request_scope(&admin, &ScopeSignals::new().with_branch_id("B2"), &store).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn branch_lookup_failure_propagates() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);

        let result = resolve_request_scope(&admin, &ScopeSignals::new().with_branch_code("EAST"), &store).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }
}
