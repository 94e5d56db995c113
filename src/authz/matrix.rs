use std::collections::{BTreeMap, BTreeSet};

use crate::authz::types::{AccessRequest, PermissionEntry, Rule, Verb, WILDCARD};

/// Whether a rule adds verbs to matching cells or removes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Permit,
    Deny,
}

/// Resolved permission table: namespace -> resource-type -> allowed verbs.
///
/// Invariants, enforced by keeping every mutation path inside this type:
/// - the `*` row always exists and every row has a `*` column, so any
///   (namespace, resource) pair has a defined cell via wildcard fallback;
/// - the matrix is rectangular: every row carries the same column set. A
///   concrete key only ever enters the table by copying the wildcard
///   row/column it specializes, so new rows and columns start from the
///   wildcard baseline rather than empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionMatrix {
    rows: BTreeMap<String, BTreeMap<String, BTreeSet<Verb>>>,
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionMatrix {
    /// Minimal rectangular form: one `*` row with one empty `*` cell.
    pub fn new() -> Self {
        let mut row = BTreeMap::new();
        row.insert(WILDCARD.to_string(), BTreeSet::new());
        let mut rows = BTreeMap::new();
        rows.insert(WILDCARD.to_string(), row);
        Self { rows }
    }

    pub fn namespace_count(&self) -> usize {
        self.rows.len()
    }

    pub fn resource_count(&self) -> usize {
        self.rows.values().next().map(|r| r.len()).unwrap_or(0)
    }

    fn size(&self) -> usize {
        self.namespace_count() * self.resource_count()
    }

    /// Materialize a concrete namespace row by copying the `*` row.
    /// No-op for the wildcard itself or an already-present row.
    pub fn expand_namespace(&mut self, namespace: &str) {
        if namespace == WILDCARD || self.rows.contains_key(namespace) {
            return;
        }
        let base = self.rows.get(WILDCARD).cloned().unwrap_or_default();
        self.rows.insert(namespace.to_string(), base);
    }

    /// Materialize a concrete resource column in every row by copying each
    /// row's `*` cell. No-op for the wildcard or an already-present column.
    pub fn expand_resource(&mut self, resource: &str) {
        if resource == WILDCARD {
            return;
        }
        for row in self.rows.values_mut() {
            if !row.contains_key(resource) {
                let base = row.get(WILDCARD).cloned().unwrap_or_default();
                row.insert(resource.to_string(), base);
            }
        }
    }

    /// Apply a rule to every matching cell, expanding the rule's concrete
    /// keys first so specialization happens before mutation.
    pub fn apply(&mut self, rule: &Rule, effect: Effect) {
        self.expand_namespace(&rule.namespace);
        self.expand_resource(&rule.resource);

        for (namespace, row) in self.rows.iter_mut() {
            if rule.namespace != WILDCARD && *namespace != rule.namespace {
                continue;
            }
            for (resource, cell) in row.iter_mut() {
                if rule.resource != WILDCARD && *resource != rule.resource {
                    continue;
                }
                for verb in rule.verb.verbs() {
                    match effect {
                        Effect::Permit => {
                            cell.insert(*verb);
                        }
                        Effect::Deny => {
                            cell.remove(verb);
                        }
                    }
                }
            }
        }
    }

    /// Per-cell union of two matrices. The smaller matrix (by namespace-count
    /// times resource-count) is merged into the larger to avoid needless key
    /// expansion.
    pub fn union(a: Self, b: Self) -> Self {
        let (mut big, small) = if a.size() >= b.size() { (a, b) } else { (b, a) };
        big.absorb(&small);
        big
    }

    /// Union `other` into `self`: keys present in only one side are
    /// synthesized from the wildcard row/column, then every cell takes the
    /// set union, reading `other` through wildcard-fallback lookup.
    fn absorb(&mut self, other: &Self) {
        let namespaces: Vec<String> = other.rows.keys().cloned().collect();
        for namespace in &namespaces {
            self.expand_namespace(namespace);
        }
        if let Some(base) = other.rows.get(WILDCARD) {
            let resources: Vec<String> = base.keys().cloned().collect();
            for resource in &resources {
                self.expand_resource(resource);
            }
        }

        for (namespace, row) in self.rows.iter_mut() {
            for (resource, cell) in row.iter_mut() {
                cell.extend(other.cell(namespace, resource).iter().copied());
            }
        }
    }

    /// Collapse rows and columns that carry no information beyond their
    /// wildcard defaults. Rows first, then columns; returns the number of
    /// deleted cells.
    pub fn prune(&mut self) -> usize {
        let mut removed = 0;

        let base_row = self.rows.get(WILDCARD).cloned().unwrap_or_default();
        let redundant_rows: Vec<String> = self
            .rows
            .iter()
            .filter(|(namespace, row)| *namespace != WILDCARD && **row == base_row)
            .map(|(namespace, _)| namespace.clone())
            .collect();
        for namespace in redundant_rows {
            if let Some(row) = self.rows.remove(&namespace) {
                removed += row.len();
            }
        }

        let redundant_cols: Vec<String> = base_row
            .keys()
            .filter(|resource| {
                *resource != WILDCARD
                    && self.rows.values().all(|row| {
                        row.get(resource.as_str()) == row.get(WILDCARD)
                    })
            })
            .cloned()
            .collect();
        for resource in redundant_cols {
            for row in self.rows.values_mut() {
                if row.remove(&resource).is_some() {
                    removed += 1;
                }
            }
        }

        removed
    }

    /// Cell lookup with fallback: a missing row or column means the key was
    /// never specialized, so the wildcard row/column answers for it.
    pub fn cell(&self, namespace: &str, resource: &str) -> &BTreeSet<Verb> {
        static EMPTY: BTreeSet<Verb> = BTreeSet::new();
        let row = self
            .rows
            .get(namespace)
            .or_else(|| self.rows.get(WILDCARD));
        row.and_then(|r| r.get(resource).or_else(|| r.get(WILDCARD)))
            .unwrap_or(&EMPTY)
    }

    /// True if the matrix grants the requested operation.
    pub fn allows(&self, req: &AccessRequest) -> bool {
        self.cell(&req.namespace, &req.resource).contains(&req.verb)
    }

    /// Serializable (resource, namespace, operations) triples with verbs
    /// shortened to single-letter codes. Empty cells are skipped.
    pub fn entries(&self) -> Vec<PermissionEntry> {
        let mut entries = Vec::new();
        for (namespace, row) in &self.rows {
            for (resource, cell) in row {
                if cell.is_empty() {
                    continue;
                }
                entries.push(PermissionEntry {
                    resource: resource.clone(),
                    namespace: namespace.clone(),
                    operations: cell.iter().map(|v| v.code().to_string()).collect(),
                });
            }
        }
        entries
    }
}
