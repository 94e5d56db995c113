use std::collections::HashSet;

use crate::authz::matrix::{Effect, PermissionMatrix};
use crate::authz::types::{AccessRequest, Role};
use crate::authz::RoleStore;

/// Resolve a role into its full permission matrix: union of recursively
/// resolved subrole matrices, then the role's own permits, then its denies,
/// then a pruning pass. Subrole names missing from the store contribute
/// nothing. Terminates because the store is cycle-checked at load.
pub fn resolve_matrix(store: &RoleStore, role: &Role) -> PermissionMatrix {
    let mut matrix = PermissionMatrix::new();
    for name in &role.subroles {
        if let Some(subrole) = store.get(name) {
            matrix = PermissionMatrix::union(matrix, resolve_matrix(store, subrole));
        }
    }
    for rule in &role.permit {
        matrix.apply(rule, Effect::Permit);
    }
    for rule in &role.deny {
        matrix.apply(rule, Effect::Deny);
    }
    matrix.prune();
    matrix
}

/// Point query over the role graph, without materializing a matrix.
///
/// Deny rules are checked first and veto the whole level; permits are checked
/// next; otherwise the query recurses into each subrole, short-circuiting on
/// the first permitting branch. A deny in one subrole never poisons a sibling
/// branch. Unknown roles grant nothing.
///
/// `visited` is purely a termination guard: a role's answer does not depend
/// on the path taken to reach it, so skipping an already-visited role cannot
/// change the result.
pub fn has_permission(
    store: &RoleStore,
    role_name: &str,
    req: &AccessRequest,
    visited: &mut HashSet<String>,
) -> bool {
    let Some(role) = store.get(role_name) else {
        return false;
    };
    if !visited.insert(role_name.to_string()) {
        return false;
    }
    if role.deny.iter().any(|rule| rule.subsumes(req)) {
        return false;
    }
    if role.permit.iter().any(|rule| rule.subsumes(req)) {
        return true;
    }
    role.subroles
        .iter()
        .any(|sub| has_permission(store, sub, req, visited))
}

/// True if any of the caller's roles grants the operation. Each role is an
/// independent check; an empty role set grants nothing.
pub fn is_user_authorized(store: &RoleStore, roles: &[String], req: &AccessRequest) -> bool {
    roles
        .iter()
        .any(|role| has_permission(store, role, req, &mut HashSet::new()))
}

/// Union of the resolved matrices of every role the caller holds, for the
/// session-status permission summary. Callers prune before serializing.
pub fn get_all_permissions(store: &RoleStore, roles: &[String]) -> PermissionMatrix {
    let mut matrix = PermissionMatrix::new();
    for name in roles {
        if let Some(role) = store.get(name) {
            matrix = PermissionMatrix::union(matrix, resolve_matrix(store, role));
        }
    }
    matrix
}
