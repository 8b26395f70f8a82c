//! Pure authorization rules over the closed role set, kept free of HTTP
//! concerns so the policy matrix can be tested in isolation.

use uuid::Uuid;

use crate::database::models::Role;

/// Capability level a route group demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reading transactions, categories, analytics.
    Read,
    /// Creating/updating/deleting owned resources.
    Write,
    /// Category management and `/api/admin` operations.
    Admin,
}

/// Whether `role` may perform `action` at all (ownership checked separately).
pub fn permits(role: Role, action: Action) -> bool {
    match action {
        Action::Read => true,
        Action::Write => matches!(role, Role::Admin | Role::User),
        Action::Admin => matches!(role, Role::Admin),
    }
}

/// Ownership rule for a resource owned by `owner`: admins may act on any
/// resource, everyone else only on their own.
pub fn owns_or_admin(role: Role, caller: Uuid, owner: Uuid) -> bool {
    role == Role::Admin || caller == owner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_matrix() {
        let cases = [
            (Role::Admin, Action::Read, true),
            (Role::Admin, Action::Write, true),
            (Role::Admin, Action::Admin, true),
            (Role::User, Action::Read, true),
            (Role::User, Action::Write, true),
            (Role::User, Action::Admin, false),
            (Role::ReadOnly, Action::Read, true),
            (Role::ReadOnly, Action::Write, false),
            (Role::ReadOnly, Action::Admin, false),
        ];
        for (role, action, expected) in cases {
            assert_eq!(permits(role, action), expected, "{role:?} {action:?}");
        }
    }

    #[test]
    fn test_ownership_rule() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(owns_or_admin(Role::User, me, me));
        assert!(!owns_or_admin(Role::User, me, other));
        assert!(!owns_or_admin(Role::ReadOnly, me, other));
        assert!(owns_or_admin(Role::Admin, me, other));
    }
}
