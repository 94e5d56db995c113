use serde::{Deserialize, Serialize};

/// Matches any concrete namespace or resource-type in a rule position.
pub const WILDCARD: &str = "*";

/// A concrete operation kind on a cluster resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Verb::Create,
        Verb::Read,
        Verb::Update,
        Verb::Delete,
        Verb::List,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Verb::Create),
            "read" => Some(Verb::Read),
            "update" => Some(Verb::Update),
            "delete" => Some(Verb::Delete),
            "list" => Some(Verb::List),
            _ => None,
        }
    }

    /// Single-letter code used in permission summaries.
    pub fn code(&self) -> char {
        match self {
            Verb::Create => 'c',
            Verb::Read => 'r',
            Verb::Update => 'u',
            Verb::Delete => 'd',
            Verb::List => 'l',
        }
    }
}

/// The operation field of a rule: a single verb, or `all` which expands to
/// every concrete verb when the rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbSpec {
    All,
    One(Verb),
}

impl VerbSpec {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "all" {
            Some(VerbSpec::All)
        } else {
            Verb::parse(s).map(VerbSpec::One)
        }
    }

    /// Concrete verbs this spec expands to.
    pub fn verbs(&self) -> &[Verb] {
        match self {
            VerbSpec::All => &Verb::ALL,
            VerbSpec::One(v) => std::slice::from_ref(v),
        }
    }

    /// True if this spec covers the given concrete verb.
    pub fn covers(&self, verb: Verb) -> bool {
        match self {
            VerbSpec::All => true,
            VerbSpec::One(v) => *v == verb,
        }
    }
}

/// A permit or deny rule: resource-type and namespace (each possibly `*`)
/// plus a verb spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub resource: String,
    pub namespace: String,
    pub verb: VerbSpec,
}

impl Rule {
    pub fn new(resource: &str, namespace: &str, verb: VerbSpec) -> Self {
        Self {
            resource: resource.to_string(),
            namespace: namespace.to_string(),
            verb,
        }
    }

    /// True if this rule subsumes the requested operation: `*` matches any
    /// key, `all` matches any verb, otherwise fields must be equal.
    pub fn subsumes(&self, req: &AccessRequest) -> bool {
        (self.resource == WILDCARD || self.resource == req.resource)
            && (self.namespace == WILDCARD || self.namespace == req.namespace)
            && self.verb.covers(req.verb)
    }
}

/// A named role: permit rules, deny rules, and references to subroles whose
/// permissions it inherits. Roles reference subroles by name, they do not own
/// them; the referenced roles live in the same store.
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub permit: Vec<Rule>,
    pub deny: Vec<Rule>,
    pub subroles: Vec<String>,
}

// ---------- API request/response types ----------

/// A concrete operation a caller wants to perform.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessRequest {
    /// e.g. "pods"
    pub resource: String,
    /// e.g. "default"
    pub namespace: String,
    pub verb: Verb,
}

impl AccessRequest {
    pub fn new(resource: &str, namespace: &str, verb: Verb) -> Self {
        Self {
            resource: resource.to_string(),
            namespace: namespace.to_string(),
            verb,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub allowed: bool,
}

/// One cell of a pruned permission summary, with verbs shortened to their
/// single-letter codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionEntry {
    pub resource: String,
    pub namespace: String,
    pub operations: Vec<String>,
}
