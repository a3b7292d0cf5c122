//! Role-set permission checks
//!
//! An actor is authorized when it holds at least one role from the set the
//! command requires. The check is a pure predicate over two sets.

use crate::config::Configuration;
use crate::types::RoleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Permission classes used by the command surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Anyone may invoke
    Public,
    /// Requires a role from `warnPermissionRoles`
    Warn,
    /// Requires a role from `resetPermissionRoles`
    Reset,
    /// Requires a role from `configPermissionRoles`
    Config,
}

impl Permission {
    /// Role set that grants this permission; `None` for public commands
    #[must_use]
    pub fn required_roles(self, config: &Configuration) -> Option<&BTreeSet<RoleId>> {
        match self {
            Permission::Public => None,
            Permission::Warn => Some(&config.warn_permission_roles),
            Permission::Reset => Some(&config.reset_permission_roles),
            Permission::Config => Some(&config.config_permission_roles),
        }
    }

    /// Fixed reply for actors lacking this permission
    #[inline]
    #[must_use]
    pub fn denial_message(self) -> &'static str {
        match self {
            Permission::Public => "❌ You do not have permission to use this command.",
            Permission::Warn => "❌ You do not have permission to issue warnings.",
            Permission::Reset => "❌ You do not have permission to reset warnings.",
            Permission::Config => "❌ You do not have permission to change config.",
        }
    }
}

/// True when the two role sets share at least one role
#[inline]
#[must_use]
pub fn intersects(actor_roles: &BTreeSet<RoleId>, required: &BTreeSet<RoleId>) -> bool {
    // iterate the smaller set
    let (small, large) = if actor_roles.len() <= required.len() {
        (actor_roles, required)
    } else {
        (required, actor_roles)
    };
    small.iter().any(|role| large.contains(role))
}

/// Check an actor's roles against a permission under the given configuration
#[must_use]
pub fn is_authorized(
    permission: Permission,
    actor_roles: &BTreeSet<RoleId>,
    config: &Configuration,
) -> bool {
    permission
        .required_roles(config)
        .map_or(true, |required| intersects(actor_roles, required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roles(ids: &[&str]) -> BTreeSet<RoleId> {
        ids.iter().map(|id| RoleId::new(*id)).collect()
    }

    #[test]
    fn public_needs_no_roles() {
        let config = Configuration::new();
        assert!(is_authorized(Permission::Public, &BTreeSet::new(), &config));
    }

    #[test]
    fn empty_required_set_denies_everyone() {
        let config = Configuration::new();
        assert!(!is_authorized(Permission::Warn, &roles(&["1", "2"]), &config));
    }

    #[test]
    fn any_shared_role_authorizes() {
        let mut config = Configuration::new();
        config.reset_permission_roles = roles(&["10", "20"]);

        assert!(is_authorized(Permission::Reset, &roles(&["5", "20"]), &config));
        assert!(!is_authorized(Permission::Reset, &roles(&["5"]), &config));
        assert!(!is_authorized(Permission::Warn, &roles(&["20"]), &config));
    }

    proptest! {
        #[test]
        fn prop_intersects_matches_set_intersection(
            a in proptest::collection::btree_set("[0-9]{1,3}", 0..8),
            b in proptest::collection::btree_set("[0-9]{1,3}", 0..8),
        ) {
            let a: BTreeSet<RoleId> = a.into_iter().map(RoleId::from).collect();
            let b: BTreeSet<RoleId> = b.into_iter().map(RoleId::from).collect();
            let expected = a.intersection(&b).next().is_some();
            prop_assert_eq!(intersects(&a, &b), expected);
            prop_assert_eq!(intersects(&b, &a), expected);
        }
    }
}
