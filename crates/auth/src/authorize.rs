//! Authorization decisions: the role gate, the permission gate, and the
//! ordered pipeline that composes them.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use labtrack_core::RoleId;

use crate::{
    AuthError, CredentialStore, IdentityContext, Permission, PermissionCache, PermissionSet,
    RoleGrants, RoleName, RoleSet, StoreError,
};

/// Why a gate or precondition refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The caller's role is not in the operation's accepted role set.
    RoleNotPermitted,
    /// The role referenced by the token no longer exists.
    RoleNotFound,
    /// At least one required permission is not granted to the role.
    MissingPermission,
    /// An identity tried to delete its own account.
    SelfDeletion,
    /// A non-privileged identity tried to change its own role.
    SelfRoleChange,
    /// A non-privileged identity targeted someone else's record.
    NotOwner,
}

impl core::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DenyReason::RoleNotPermitted => "role not permitted",
            DenyReason::RoleNotFound => "role not found",
            DenyReason::MissingPermission => "missing permission",
            DenyReason::SelfDeletion => "cannot delete own account",
            DenyReason::SelfRoleChange => "cannot change own role",
            DenyReason::NotOwner => "not the owner of the target record",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AuthError::Forbidden(reason)),
        }
    }
}

/// Role gate. Pure; an empty requirement is vacuously satisfied.
pub fn check_role(context: &IdentityContext, required_roles: &RoleSet) -> Decision {
    if required_roles.is_empty() || required_roles.contains(context.role_name()) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::RoleNotPermitted)
    }
}

/// Conjunctive coverage: every required permission must be granted.
pub fn permissions_cover(granted: &PermissionSet, required: &PermissionSet) -> bool {
    required.is_subset(granted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Requirements and gates
// ─────────────────────────────────────────────────────────────────────────────

/// Authorization requirement declared by a protected operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    roles: RoleSet,
    permissions: PermissionSet,
}

/// Requirement accepting only the given roles.
pub fn require_roles<I, R>(roles: I) -> Requirement
where
    I: IntoIterator<Item = R>,
    R: Into<RoleName>,
{
    Requirement::default().with_roles(roles)
}

/// Requirement demanding all of the given permissions.
pub fn require_permissions<I, P>(permissions: I) -> Requirement
where
    I: IntoIterator<Item = P>,
    P: Into<Permission>,
{
    Requirement::default().with_permissions(permissions)
}

impl Requirement {
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleName>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Gates in evaluation order: the static role gate first, so a cheap
    /// refusal never costs a store lookup.
    pub fn gates(&self) -> Vec<Gate<'_>> {
        let mut gates = Vec::with_capacity(2);
        if !self.roles.is_empty() {
            gates.push(Gate::Role(&self.roles));
        }
        gates.push(Gate::Permissions(&self.permissions));
        gates
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate<'a> {
    Role(&'a RoleSet),
    Permissions(&'a PermissionSet),
}

// ─────────────────────────────────────────────────────────────────────────────
// Permission resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Resolves a role's granted permissions from the credential store, with an
/// optional read-through cache in front of it.
pub struct PermissionResolver {
    store: Arc<dyn CredentialStore>,
    cache: Option<PermissionCache>,
}

impl PermissionResolver {
    /// Resolver that re-reads the store on every check.
    pub fn uncached(store: Arc<dyn CredentialStore>) -> Self {
        Self { store, cache: None }
    }

    /// Resolver caching grants for `ttl`; a zero TTL disables caching.
    pub fn cached(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| PermissionCache::new(ttl));
        Self { store, cache }
    }

    pub async fn role_grants(&self, role_id: RoleId) -> Result<Option<Arc<RoleGrants>>, StoreError> {
        let Some(cache) = &self.cache else {
            return Ok(self.store.find_role_with_permissions(role_id).await?.map(Arc::new));
        };

        if let Some(hit) = cache.get(role_id) {
            return Ok(Some(hit));
        }

        let generation = cache.begin_load();
        let loaded = self.store.find_role_with_permissions(role_id).await?.map(Arc::new);
        if let Some(grants) = &loaded {
            cache.insert(grants.clone(), generation);
        }
        Ok(loaded)
    }

    /// Permission gate.
    ///
    /// Store failures surface as [`AuthError::Internal`], never as a denial.
    pub async fn check_permissions(
        &self,
        context: &IdentityContext,
        required: &PermissionSet,
    ) -> Result<Decision, AuthError> {
        if required.is_empty() {
            return Ok(Decision::Allow);
        }

        let grants = self.role_grants(context.role_id()).await.map_err(|e| {
            tracing::error!(role_id = %context.role_id(), error = %e, "permission lookup failed");
            AuthError::from(e)
        })?;

        let Some(grants) = grants else {
            return Ok(Decision::Deny(DenyReason::RoleNotFound));
        };

        if permissions_cover(&grants.permissions, required) {
            Ok(Decision::Allow)
        } else {
            Ok(Decision::Deny(DenyReason::MissingPermission))
        }
    }

    /// Drop any cached grants for `role_id`. Call after every grant mutation.
    pub fn invalidate(&self, role_id: RoleId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(role_id);
        }
    }

    /// Evaluate every gate of `requirement` in order; the first denial wins
    /// and later gates are not evaluated.
    pub async fn authorize(
        &self,
        context: &IdentityContext,
        requirement: &Requirement,
    ) -> Result<Decision, AuthError> {
        for gate in requirement.gates() {
            let decision = match gate {
                Gate::Role(roles) => check_role(context, roles),
                Gate::Permissions(permissions) => self.check_permissions(context, permissions).await?,
            };
            if let Decision::Deny(reason) = decision {
                tracing::warn!(
                    identity_id = %context.identity_id(),
                    role = %context.role_name(),
                    %reason,
                    "authorization denied"
                );
                return Ok(decision);
            }
        }
        Ok(Decision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Utc;
    use labtrack_core::UserId;
    use proptest::prelude::*;

    use super::*;
    use crate::permissions::{MANAGE_INTERFACES, READ_INTERFACES, READ_USERS};
    use crate::testing::FixtureStore;

    fn context(role_id: RoleId, role_name: RoleName) -> IdentityContext {
        IdentityContext::new(UserId::new(), role_id, role_name, Utc::now())
    }

    fn perms(names: &[&'static str]) -> PermissionSet {
        names.iter().copied().map(Permission::from).collect()
    }

    #[test]
    fn empty_role_requirement_always_allows() {
        let ctx = context(RoleId::new(), RoleName::new("Anything"));
        assert_eq!(check_role(&ctx, &RoleSet::new()), Decision::Allow);
    }

    #[test]
    fn role_gate_is_membership() {
        let ctx = context(RoleId::new(), RoleName::USER);
        let admins = RoleSet::from([RoleName::ADMIN]);
        let everyone = RoleSet::from([RoleName::ADMIN, RoleName::USER]);
        assert_eq!(check_role(&ctx, &admins), Decision::Deny(DenyReason::RoleNotPermitted));
        assert_eq!(check_role(&ctx, &everyone), Decision::Allow);
    }

    #[test]
    fn coverage_is_conjunctive() {
        let required = perms(&["a", "b"]);
        assert!(!permissions_cover(&perms(&["a"]), &required));
        assert!(permissions_cover(&perms(&["a", "b", "c"]), &required));
    }

    #[tokio::test]
    async fn permission_gate_resolves_grants_from_store() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        let resolver = PermissionResolver::uncached(store.clone());
        let ctx = context(role_id, RoleName::USER);

        let read = PermissionSet::from([READ_INTERFACES]);
        let manage = PermissionSet::from([MANAGE_INTERFACES]);
        assert_eq!(resolver.check_permissions(&ctx, &read).await.unwrap(), Decision::Allow);
        assert_eq!(
            resolver.check_permissions(&ctx, &manage).await.unwrap(),
            Decision::Deny(DenyReason::MissingPermission)
        );
    }

    #[tokio::test]
    async fn deleted_role_is_denied_not_allowed() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        store.remove_role(role_id);
        let resolver = PermissionResolver::uncached(store);
        let decision = resolver
            .check_permissions(&context(role_id, RoleName::USER), &PermissionSet::from([READ_INTERFACES]))
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::RoleNotFound));
    }

    #[tokio::test]
    async fn store_failure_is_an_internal_error() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        store.fail.store(true, Ordering::SeqCst);
        let resolver = PermissionResolver::uncached(store);
        let result = resolver
            .check_permissions(&context(role_id, RoleName::USER), &PermissionSet::from([READ_INTERFACES]))
            .await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn uncached_resolver_sees_revocation_on_next_check() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        let resolver = PermissionResolver::uncached(store.clone());
        let ctx = context(role_id, RoleName::USER);
        let required = PermissionSet::from([READ_INTERFACES]);

        assert!(resolver.check_permissions(&ctx, &required).await.unwrap().is_allowed());
        store.set_permissions(role_id, PermissionSet::new());
        assert!(!resolver.check_permissions(&ctx, &required).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn cached_resolver_sees_revocation_after_invalidation() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        let resolver = PermissionResolver::cached(store.clone(), Duration::from_secs(300));
        let ctx = context(role_id, RoleName::USER);
        let required = PermissionSet::from([READ_INTERFACES]);

        assert!(resolver.check_permissions(&ctx, &required).await.unwrap().is_allowed());
        assert!(resolver.check_permissions(&ctx, &required).await.unwrap().is_allowed());
        assert_eq!(store.role_lookups.load(Ordering::SeqCst), 1);

        store.set_permissions(role_id, PermissionSet::new());
        resolver.invalidate(role_id);
        assert!(!resolver.check_permissions(&ctx, &required).await.unwrap().is_allowed());
        assert_eq!(store.role_lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn role_denial_short_circuits_store_lookup() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_USERS]);
        let resolver = PermissionResolver::uncached(store.clone());
        let requirement = require_roles([RoleName::ADMIN]).with_permissions([READ_USERS]);

        let decision = resolver
            .authorize(&context(role_id, RoleName::USER), &requirement)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::RoleNotPermitted));
        assert_eq!(store.role_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn both_gates_must_allow() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        let resolver = PermissionResolver::uncached(store);
        let ctx = context(role_id, RoleName::USER);

        let ok = require_roles([RoleName::ADMIN, RoleName::USER]).with_permissions([READ_INTERFACES]);
        let missing = require_roles([RoleName::USER]).with_permissions([READ_INTERFACES, MANAGE_INTERFACES]);
        assert_eq!(resolver.authorize(&ctx, &ok).await.unwrap(), Decision::Allow);
        assert_eq!(
            resolver.authorize(&ctx, &missing).await.unwrap(),
            Decision::Deny(DenyReason::MissingPermission)
        );
    }

    #[test]
    fn role_gate_precedes_permission_gate() {
        let requirement = require_permissions([READ_USERS]).with_roles([RoleName::ADMIN]);
        let gates = requirement.gates();
        assert!(matches!(gates[0], Gate::Role(_)));
        assert!(matches!(gates[1], Gate::Permissions(_)));
        assert_eq!(require_permissions([READ_USERS]).gates().len(), 1);
    }

    proptest! {
        /// Allow iff required ⊆ granted, for arbitrary small permission universes.
        #[test]
        fn coverage_matches_subset(
            granted in prop::collection::btree_set(0u8..8, 0..8),
            required in prop::collection::btree_set(0u8..8, 0..8),
        ) {
            let to_set = |s: &std::collections::BTreeSet<u8>| -> PermissionSet {
                s.iter().map(|n| Permission::new(format!("perm_{n}"))).collect()
            };
            let expected = required.iter().all(|r| granted.contains(r));
            prop_assert_eq!(permissions_cover(&to_set(&granted), &to_set(&required)), expected);
        }
    }
}
