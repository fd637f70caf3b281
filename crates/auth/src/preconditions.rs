//! Self-protection rules attached to specific user-management transitions.
//!
//! These are evaluated by the operation itself, with the target record in
//! hand, before anything is mutated. They complement, not replace, the role
//! and permission gates.

use labtrack_core::{RoleId, UserId};

use crate::{Decision, DenyReason, IdentityContext};

/// No identity may delete its own account, whatever its role.
pub fn ensure_not_self_deletion(actor: &IdentityContext, target: UserId) -> Decision {
    if actor.identity_id() == target {
        Decision::Deny(DenyReason::SelfDeletion)
    } else {
        Decision::Allow
    }
}

/// Non-privileged identities may only act on their own record.
pub fn ensure_self_or_admin(actor: &IdentityContext, target: UserId) -> Decision {
    if actor.is_admin() || actor.identity_id() == target {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotOwner)
    }
}

/// Non-privileged identities may not move a record (their own) to another role.
///
/// Re-submitting the current role is not a change and is allowed.
pub fn ensure_role_change_allowed(
    actor: &IdentityContext,
    current_role: RoleId,
    requested_role: Option<RoleId>,
) -> Decision {
    match requested_role {
        Some(requested) if requested != current_role && !actor.is_admin() => {
            Decision::Deny(DenyReason::SelfRoleChange)
        }
        _ => Decision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::RoleName;

    fn actor(role: RoleName) -> IdentityContext {
        IdentityContext::new(UserId::new(), RoleId::new(), role, Utc::now())
    }

    #[test]
    fn admin_cannot_delete_self() {
        let admin = actor(RoleName::ADMIN);
        assert_eq!(
            ensure_not_self_deletion(&admin, admin.identity_id()),
            Decision::Deny(DenyReason::SelfDeletion)
        );
        assert_eq!(ensure_not_self_deletion(&admin, UserId::new()), Decision::Allow);
    }

    #[test]
    fn user_may_only_touch_own_record() {
        let user = actor(RoleName::USER);
        assert_eq!(ensure_self_or_admin(&user, user.identity_id()), Decision::Allow);
        assert_eq!(
            ensure_self_or_admin(&user, UserId::new()),
            Decision::Deny(DenyReason::NotOwner)
        );
        assert_eq!(ensure_self_or_admin(&actor(RoleName::ADMIN), UserId::new()), Decision::Allow);
    }

    #[test]
    fn non_admin_cannot_self_promote() {
        let user = actor(RoleName::USER);
        let current = user.role_id();
        assert_eq!(
            ensure_role_change_allowed(&user, current, Some(RoleId::new())),
            Decision::Deny(DenyReason::SelfRoleChange)
        );
        assert_eq!(ensure_role_change_allowed(&user, current, Some(current)), Decision::Allow);
        assert_eq!(ensure_role_change_allowed(&user, current, None), Decision::Allow);
    }

    #[test]
    fn admin_may_reassign_roles() {
        let admin = actor(RoleName::ADMIN);
        assert_eq!(
            ensure_role_change_allowed(&admin, RoleId::new(), Some(RoleId::new())),
            Decision::Allow
        );
    }
}
