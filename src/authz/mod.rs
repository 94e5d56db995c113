pub mod engine;
pub mod errors;
pub mod loader;
pub mod matrix;
pub mod policy;
pub mod types;

use std::collections::HashMap;
use types::Role;

/// Immutable named-role configuration, built once at startup via
/// `loader::compile_roles` (which refuses cyclic subrole graphs) and shared
/// by reference for the process lifetime. All queries over it are pure reads.
#[derive(Debug)]
pub struct RoleStore {
    roles: HashMap<String, Role>,
}

impl RoleStore {
    pub(crate) fn new(roles: HashMap<String, Role>) -> Self {
        Self { roles }
    }

    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
