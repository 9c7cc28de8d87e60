//! Permission matching.
//!
//! Codes are exactly two colon-delimited segments, `<module>:<action>`.
//! `*:*` matches anything; `<module>:*` matches any action within the
//! module. Matching is case-sensitive. Deliberately not a glob engine:
//! the format is fixed, so a handful of set lookups is the whole story.

use std::collections::HashSet;

/// Grants every permission unconditionally.
pub const UNIVERSAL_WILDCARD: &str = "*:*";

/// Composition operator for multi-code requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequireOp {
    /// Every required code must be satisfied.
    And,
    /// At least one required code must be satisfied.
    Or,
}

/// A well-formed code has exactly two non-empty segments. Required codes
/// are compile-time constants in practice; a malformed one is a bug in the
/// caller, not a runtime condition.
pub fn is_well_formed(code: &str) -> bool {
    let mut parts = code.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(module), Some(action), None) => !module.is_empty() && !action.is_empty(),
        _ => false,
    }
}

/// Whether an effective set satisfies a single required code.
pub fn holds(effective: &HashSet<String>, required: &str) -> bool {
    debug_assert!(
        is_well_formed(required),
        "malformed required permission code: {required:?}"
    );

    if effective.contains(UNIVERSAL_WILDCARD) {
        return true;
    }
    if effective.contains(required) {
        return true;
    }

    match required.split_once(':') {
        Some((module, _)) => effective.contains(&format!("{module}:*")),
        None => false,
    }
}

/// Whether an effective set satisfies a required list under AND/OR.
///
/// An empty required list is satisfied under either operator.
pub fn satisfies<S: AsRef<str>>(
    effective: &HashSet<String>,
    required: &[S],
    op: RequireOp,
) -> bool {
    match op {
        RequireOp::And => required.iter().all(|code| holds(effective, code.as_ref())),
        RequireOp::Or => {
            required.is_empty() || required.iter().any(|code| holds(effective, code.as_ref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effective(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_exact_code_match() {
        let set = effective(&["equipment:read", "issue:create"]);
        assert!(holds(&set, "equipment:read"));
        assert!(!holds(&set, "equipment:delete"));
    }

    #[test]
    fn test_universal_wildcard_matches_everything() {
        let set = effective(&["*:*"]);
        assert!(holds(&set, "equipment:read"));
        assert!(holds(&set, "report:export"));
        assert!(holds(&set, "user:delete"));
    }

    #[test]
    fn test_module_wildcard_matches_module_actions_only() {
        let set = effective(&["equipment:*"]);
        assert!(holds(&set, "equipment:read"));
        assert!(holds(&set, "equipment:delete"));
        assert!(!holds(&set, "issue:read"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let set = effective(&["equipment:read"]);
        assert!(!holds(&set, "Equipment:read"));
        assert!(!holds(&set, "equipment:READ"));
    }

    #[test]
    fn test_and_requires_every_code() {
        let set = effective(&["equipment:read", "equipment:update"]);
        assert!(satisfies(
            &set,
            &["equipment:read", "equipment:update"],
            RequireOp::And
        ));
        assert!(!satisfies(
            &set,
            &["equipment:read", "equipment:delete"],
            RequireOp::And
        ));
    }

    #[test]
    fn test_or_requires_any_code() {
        let set = effective(&["issue:create"]);
        assert!(satisfies(
            &set,
            &["equipment:delete", "issue:create"],
            RequireOp::Or
        ));
        assert!(!satisfies(
            &set,
            &["equipment:delete", "report:export"],
            RequireOp::Or
        ));
    }

    #[test]
    fn test_wildcards_compose_with_operators() {
        let set = effective(&["equipment:*"]);
        assert!(satisfies(
            &set,
            &["equipment:read", "equipment:delete"],
            RequireOp::And
        ));
        assert!(satisfies(
            &set,
            &["report:export", "equipment:read"],
            RequireOp::Or
        ));
    }

    #[test]
    fn test_empty_requirement_is_satisfied() {
        let set = effective(&[]);
        let none: [&str; 0] = [];
        assert!(satisfies(&set, &none, RequireOp::And));
        assert!(satisfies(&set, &none, RequireOp::Or));
    }

    #[test]
    fn test_well_formedness() {
        assert!(is_well_formed("equipment:read"));
        assert!(is_well_formed("*:*"));
        assert!(is_well_formed("equipment:*"));
        assert!(!is_well_formed("equipment"));
        assert!(!is_well_formed("equipment:read:own"));
        assert!(!is_well_formed(":read"));
        assert!(!is_well_formed("equipment:"));
    }
}
