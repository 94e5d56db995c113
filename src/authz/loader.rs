use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::authz::errors::AuthzError;
use crate::authz::policy::parse_role_document;
use crate::authz::types::{Role, Rule, Verb, VerbSpec, WILDCARD};
use crate::authz::RoleStore;

/// Load all `.kdl` role files from the given directory and compile them into
/// a single immutable `RoleStore`.
pub fn load_roles(dir: &Path) -> Result<RoleStore, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidRole(format!(
            "roles directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut all_roles = Vec::new();
    let mut file_count = 0;

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AuthzError::RoleLoadError {
                path: path.display().to_string(),
                source,
            })?;
        all_roles.extend(parse_role_document(&contents)?);
        file_count += 1;
    }

    let store = compile_roles(all_roles)?;

    tracing::info!(files = file_count, roles = store.len(), "Loaded role definitions");

    Ok(store)
}

/// Merge parsed roles into a `RoleStore`, refusing cyclic subrole graphs.
/// Later definitions of the same role name replace earlier ones. This is the
/// only public constructor, so any store handed to the engine is acyclic.
pub fn compile_roles(roles: Vec<Role>) -> Result<RoleStore, AuthzError> {
    let mut map: HashMap<String, Role> = HashMap::new();
    for role in roles {
        map.insert(role.name.clone(), role);
    }

    if let Some(edge) = find_cycle(&map) {
        return Err(AuthzError::CyclicSubroles(edge));
    }

    Ok(RoleStore::new(map))
}

/// Pure boolean gate over the subrole graph.
pub fn has_cycle(roles: &HashMap<String, Role>) -> bool {
    find_cycle(roles).is_some()
}

/// Three-color DFS over the subrole edges, returning the back-edge that
/// closes a cycle. Unknown subrole names have no outgoing edges and cannot
/// close one. Each disconnected component is traversed independently.
fn find_cycle(roles: &HashMap<String, Role>) -> Option<String> {
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for name in roles.keys() {
        if !visited.contains(name.as_str()) {
            if let Some(edge) = dfs_cycle(name, roles, &mut visited, &mut in_stack) {
                return Some(edge);
            }
        }
    }
    None
}

fn dfs_cycle(
    name: &str,
    roles: &HashMap<String, Role>,
    visited: &mut HashSet<String>,
    in_stack: &mut HashSet<String>,
) -> Option<String> {
    visited.insert(name.to_string());
    in_stack.insert(name.to_string());

    if let Some(role) = roles.get(name) {
        for sub in &role.subroles {
            if in_stack.contains(sub.as_str()) {
                return Some(format!("{name} -> {sub}"));
            }
            if !visited.contains(sub.as_str()) {
                if let Some(edge) = dfs_cycle(sub, roles, visited, in_stack) {
                    return Some(edge);
                }
            }
        }
    }

    in_stack.remove(name);
    None
}

/// Placeholder roles used when no roles directory is configured, standing in
/// for a durable source. `admin` may do anything; `user` may read and list.
pub fn builtin_roles() -> Vec<Role> {
    vec![
        Role {
            name: "admin".to_string(),
            permit: vec![Rule::new(WILDCARD, WILDCARD, VerbSpec::All)],
            deny: vec![],
            subroles: vec![],
        },
        Role {
            name: "user".to_string(),
            permit: vec![
                Rule::new(WILDCARD, WILDCARD, VerbSpec::One(Verb::Read)),
                Rule::new(WILDCARD, WILDCARD, VerbSpec::One(Verb::List)),
            ],
            deny: vec![],
            subroles: vec![],
        },
    ]
}
