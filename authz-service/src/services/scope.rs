//! Data-scope filter construction.
//!
//! Converts (roles, factory memberships, resource type) into a descriptor
//! the business layer translates into storage predicates. The descriptor
//! is advisory metadata; the only guarantee here is its correctness.
//! Filters are recomputed per request so they always reflect the current
//! membership set.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::models::role::{
    ROLE_AUDITOR, ROLE_FACTORY_ADMIN, ROLE_INSPECTOR, ROLE_MAINTAINER, ROLE_SUPER_ADMIN,
    ROLE_VIEWER,
};
use crate::models::Principal;

/// Resource families the scope policy table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Equipment,
    Inspection,
    Issue,
    Report,
    UserAccount,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Equipment => "equipment",
            ResourceKind::Inspection => "inspection",
            ResourceKind::Issue => "issue",
            ResourceKind::Report => "report",
            ResourceKind::UserAccount => "user_account",
        }
    }
}

/// Scope breadth, ordered narrowest to widest so multi-role principals can
/// take the widest scope their roles allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ScopeKind {
    SelfOnly,
    Own,
    Factory,
    All,
}

/// Per-request visibility constraint handed to the business layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataScopeFilter {
    /// No constraint.
    Unrestricted,
    /// Restrict to records whose owner field equals the principal.
    OwnerOnly { owner_id: Uuid },
    /// Restrict to records belonging to any visible factory. The set is
    /// authoritative; `factory_id` is a convenience for single-membership
    /// callers and is only present when the set has exactly one element.
    FactorySet {
        factory_ids: BTreeSet<Uuid>,
        #[serde(skip_serializing_if = "Option::is_none")]
        factory_id: Option<Uuid>,
    },
    /// Restrict to the principal's own record.
    SelfOnly { user_id: Uuid },
}

impl DataScopeFilter {
    fn factory_set(factory_ids: BTreeSet<Uuid>) -> Self {
        let factory_id = if factory_ids.len() == 1 {
            factory_ids.iter().next().copied()
        } else {
            None
        };
        DataScopeFilter::FactorySet {
            factory_ids,
            factory_id,
        }
    }

    /// Whether records of the given factory pass this filter. Owner- and
    /// self-scoped filters constrain by principal, not factory, so they
    /// admit nothing on this axis.
    pub fn admits_factory(&self, factory_id: Uuid) -> bool {
        match self {
            DataScopeFilter::Unrestricted => true,
            DataScopeFilter::FactorySet { factory_ids, .. } => factory_ids.contains(&factory_id),
            DataScopeFilter::OwnerOnly { .. } | DataScopeFilter::SelfOnly { .. } => false,
        }
    }
}

/// The fixed scope policy table.
///
/// Rows not listed fall back to the factory constraint - never to "all",
/// so an unrecognized combination can only under-expose data.
fn scope_rule(role_code: &str, resource: ResourceKind) -> ScopeKind {
    match (role_code, resource) {
        (ROLE_AUDITOR, _) => ScopeKind::All,

        (ROLE_FACTORY_ADMIN, _) => ScopeKind::Factory,

        (ROLE_INSPECTOR, ResourceKind::Equipment) => ScopeKind::Factory,
        (ROLE_INSPECTOR, ResourceKind::Inspection) => ScopeKind::Own,
        (ROLE_INSPECTOR, ResourceKind::Issue) => ScopeKind::Own,
        (ROLE_INSPECTOR, ResourceKind::Report) => ScopeKind::Own,
        (ROLE_INSPECTOR, ResourceKind::UserAccount) => ScopeKind::SelfOnly,

        (ROLE_MAINTAINER, ResourceKind::UserAccount) => ScopeKind::SelfOnly,
        (ROLE_MAINTAINER, _) => ScopeKind::Factory,

        (ROLE_VIEWER, ResourceKind::UserAccount) => ScopeKind::SelfOnly,
        (ROLE_VIEWER, _) => ScopeKind::Factory,

        _ => ScopeKind::Factory,
    }
}

/// Build the visibility filter for one principal and resource type.
///
/// The unrestricted system role bypasses the table entirely. A principal
/// with several roles gets the widest scope any of them allows, matching
/// the additive semantics of role permission grants.
pub fn build_filter(principal: &Principal, resource: ResourceKind) -> DataScopeFilter {
    let role_codes = principal.role_codes();
    build_filter_from_parts(
        principal.user_id(),
        &role_codes,
        &principal.visible_factory_ids(),
        resource,
    )
}

/// Same as [`build_filter`], for callers that hold the request context
/// rather than the full principal aggregate.
pub fn build_filter_from_parts(
    user_id: Uuid,
    role_codes: &[String],
    visible_factory_ids: &BTreeSet<Uuid>,
    resource: ResourceKind,
) -> DataScopeFilter {
    if role_codes.iter().any(|r| r == ROLE_SUPER_ADMIN) {
        return DataScopeFilter::Unrestricted;
    }

    let widest = role_codes
        .iter()
        .map(|code| scope_rule(code, resource))
        .max()
        // No roles at all: factory-bounded, not open
        .unwrap_or(ScopeKind::Factory);

    match widest {
        ScopeKind::All => DataScopeFilter::Unrestricted,
        ScopeKind::Factory => DataScopeFilter::factory_set(visible_factory_ids.clone()),
        ScopeKind::Own => DataScopeFilter::OwnerOnly { owner_id: user_id },
        ScopeKind::SelfOnly => DataScopeFilter::SelfOnly { user_id },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::role::Role;
    use crate::models::{RoleWithPermissions, UserRecord};

    fn principal_with_roles(codes: &[&str], primary: Uuid, extra: Vec<Uuid>) -> Principal {
        Principal {
            user: UserRecord {
                user_id: Uuid::new_v4(),
                display_name: "Zhang Min".to_string(),
                active: true,
                primary_factory_id: primary,
                created_utc: Utc::now(),
            },
            factory_ids: extra,
            roles: codes
                .iter()
                .map(|c| RoleWithPermissions::new(Role::new(c.to_string(), c.to_string())))
                .collect(),
            overrides: vec![],
        }
    }

    #[test]
    fn test_super_admin_is_unconstrained() {
        let p = principal_with_roles(&[ROLE_SUPER_ADMIN], Uuid::new_v4(), vec![]);
        assert_eq!(
            build_filter(&p, ResourceKind::Equipment),
            DataScopeFilter::Unrestricted
        );
    }

    #[test]
    fn test_factory_scope_never_admits_foreign_factory() {
        let f5 = Uuid::from_u128(5);
        let f9 = Uuid::from_u128(9);
        let f7 = Uuid::from_u128(7);
        let p = principal_with_roles(&[ROLE_FACTORY_ADMIN], f5, vec![f9]);

        let filter = build_filter(&p, ResourceKind::Equipment);
        assert!(filter.admits_factory(f5));
        assert!(filter.admits_factory(f9));
        assert!(!filter.admits_factory(f7));
    }

    #[test]
    fn test_singular_convenience_field_only_for_single_membership() {
        let f5 = Uuid::from_u128(5);
        let single = principal_with_roles(&[ROLE_FACTORY_ADMIN], f5, vec![]);
        match build_filter(&single, ResourceKind::Issue) {
            DataScopeFilter::FactorySet { factory_id, .. } => assert_eq!(factory_id, Some(f5)),
            other => panic!("expected factory filter, got {other:?}"),
        }

        let multi = principal_with_roles(&[ROLE_FACTORY_ADMIN], f5, vec![Uuid::from_u128(9)]);
        match build_filter(&multi, ResourceKind::Issue) {
            DataScopeFilter::FactorySet {
                factory_id,
                factory_ids,
            } => {
                assert_eq!(factory_id, None);
                assert_eq!(factory_ids.len(), 2);
            }
            other => panic!("expected factory filter, got {other:?}"),
        }
    }

    #[test]
    fn test_inspector_owns_their_inspections_but_sees_factory_equipment() {
        let p = principal_with_roles(&[ROLE_INSPECTOR], Uuid::new_v4(), vec![]);

        match build_filter(&p, ResourceKind::Inspection) {
            DataScopeFilter::OwnerOnly { owner_id } => assert_eq!(owner_id, p.user_id()),
            other => panic!("expected owner filter, got {other:?}"),
        }
        assert!(matches!(
            build_filter(&p, ResourceKind::Equipment),
            DataScopeFilter::FactorySet { .. }
        ));
        assert!(matches!(
            build_filter(&p, ResourceKind::UserAccount),
            DataScopeFilter::SelfOnly { .. }
        ));
    }

    #[test]
    fn test_auditor_reads_across_factories() {
        let p = principal_with_roles(&[ROLE_AUDITOR], Uuid::new_v4(), vec![]);
        assert_eq!(
            build_filter(&p, ResourceKind::Report),
            DataScopeFilter::Unrestricted
        );
    }

    #[test]
    fn test_multi_role_takes_widest_scope() {
        let p = principal_with_roles(&[ROLE_INSPECTOR, ROLE_MAINTAINER], Uuid::new_v4(), vec![]);
        // Inspector alone would be Own for issues; maintainer widens to factory.
        assert!(matches!(
            build_filter(&p, ResourceKind::Issue),
            DataScopeFilter::FactorySet { .. }
        ));
    }

    #[test]
    fn test_unknown_role_falls_back_to_factory_constraint() {
        let p = principal_with_roles(&["NIGHT_SHIFT_LEAD"], Uuid::from_u128(5), vec![]);
        let filter = build_filter(&p, ResourceKind::Report);
        assert!(matches!(filter, DataScopeFilter::FactorySet { .. }));
        assert!(!filter.admits_factory(Uuid::from_u128(7)));
    }

    #[test]
    fn test_roleless_principal_stays_factory_bounded() {
        let p = principal_with_roles(&[], Uuid::from_u128(5), vec![]);
        assert!(matches!(
            build_filter(&p, ResourceKind::Equipment),
            DataScopeFilter::FactorySet { .. }
        ));
    }
}
