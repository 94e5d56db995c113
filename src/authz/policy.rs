use kdl::KdlDocument;

use crate::authz::errors::AuthzError;
use crate::authz::types::{Role, Rule, VerbSpec, WILDCARD};

/// Parse a KDL document string into role definitions.
///
/// ```kdl
/// role "viewer" {
///     permit resource="*" namespace="*" verb="read"
///     permit resource="*" namespace="*" verb="list"
/// }
///
/// role "admin" {
///     permit resource="*" namespace="*" verb="all"
///     deny resource="secrets" namespace="kube-system" verb="delete"
///     subroles {
///         - "viewer"
///     }
/// }
/// ```
pub fn parse_role_document(source: &str) -> Result<Vec<Role>, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut roles = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "role" => {
                let name = first_string_arg(node).ok_or_else(|| {
                    AuthzError::InvalidRole(
                        "role node requires a string argument (e.g. role \"admin\")".into(),
                    )
                })?;

                let mut permit = Vec::new();
                let mut deny = Vec::new();
                let mut subroles = Vec::new();

                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "permit" => {
                                permit.push(parse_rule(child, &name)?);
                            }
                            "deny" => {
                                deny.push(parse_rule(child, &name)?);
                            }
                            "subroles" => {
                                subroles = dash_list(child);
                            }
                            other => {
                                return Err(AuthzError::InvalidRole(format!(
                                    "unexpected child `{other}` in role `{name}` (expected `permit`, `deny`, or `subroles`)"
                                )));
                            }
                        }
                    }
                }

                roles.push(Role {
                    name,
                    permit,
                    deny,
                    subroles,
                });
            }
            other => {
                // Ignore comments and unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(roles)
}

/// Parse a `permit` or `deny` node. Resource and namespace default to the
/// wildcard when omitted; the verb is required.
fn parse_rule(node: &kdl::KdlNode, role: &str) -> Result<Rule, AuthzError> {
    let resource = node
        .get("resource")
        .and_then(|v| v.value().as_string())
        .unwrap_or(WILDCARD);
    let namespace = node
        .get("namespace")
        .and_then(|v| v.value().as_string())
        .unwrap_or(WILDCARD);
    let verb = node
        .get("verb")
        .and_then(|v| v.value().as_string())
        .ok_or_else(|| {
            AuthzError::InvalidRule(format!(
                "rule in role `{role}` missing `verb` property (e.g. verb=\"read\")"
            ))
        })?;

    let verb = VerbSpec::parse(verb).ok_or_else(|| {
        AuthzError::InvalidRule(format!(
            "unknown verb `{verb}` in role `{role}` (expected create, read, update, delete, list, or all)"
        ))
    })?;

    Ok(Rule::new(resource, namespace, verb))
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
fn dash_list(node: &kdl::KdlNode) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(first_string_arg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::types::{Verb, VerbSpec};

    #[test]
    fn test_parse_role_with_rules() {
        let kdl = r#"
role "viewer" {
    permit resource="*" namespace="*" verb="read"
    permit resource="*" namespace="*" verb="list"
}
"#;
        let roles = parse_role_document(kdl).unwrap();
        assert_eq!(roles.len(), 1);
        let viewer = &roles[0];
        assert_eq!(viewer.name, "viewer");
        assert_eq!(viewer.permit.len(), 2);
        assert_eq!(viewer.permit[0].verb, VerbSpec::One(Verb::Read));
        assert!(viewer.deny.is_empty());
        assert!(viewer.subroles.is_empty());
    }

    #[test]
    fn test_parse_role_with_deny_and_subroles() {
        let kdl = r#"
role "ops" {
    permit resource="*" namespace="*" verb="all"
    deny resource="secrets" namespace="kube-system" verb="delete"
    subroles {
        - "viewer"
        - "auditor"
    }
}
"#;
        let roles = parse_role_document(kdl).unwrap();
        let ops = &roles[0];
        assert_eq!(ops.permit[0].verb, VerbSpec::All);
        assert_eq!(ops.deny.len(), 1);
        assert_eq!(ops.deny[0].resource, "secrets");
        assert_eq!(ops.deny[0].namespace, "kube-system");
        assert_eq!(ops.subroles, vec!["viewer", "auditor"]);
    }

    #[test]
    fn test_rule_fields_default_to_wildcard() {
        let kdl = r#"
role "lister" {
    permit verb="list"
}
"#;
        let roles = parse_role_document(kdl).unwrap();
        let rule = &roles[0].permit[0];
        assert_eq!(rule.resource, WILDCARD);
        assert_eq!(rule.namespace, WILDCARD);
        assert_eq!(rule.verb, VerbSpec::One(Verb::List));
    }

    #[test]
    fn test_parse_missing_verb() {
        let kdl = r#"
role "broken" {
    permit resource="pods"
}
"#;
        let err = parse_role_document(kdl).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_unknown_verb() {
        let kdl = r#"
role "broken" {
    permit resource="pods" verb="watch"
}
"#;
        let err = parse_role_document(kdl).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRule(_)));
    }

    #[test]
    fn test_parse_unexpected_child() {
        let kdl = r#"
role "broken" {
    allow resource="pods" verb="read"
}
"#;
        let err = parse_role_document(kdl).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRole(_)));
    }

    #[test]
    fn test_parse_role_without_name() {
        let err = parse_role_document("role").unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRole(_)));
    }

    #[test]
    fn test_parse_multiple_roles() {
        let kdl = r#"
role "viewer" {
    permit verb="read"
    permit verb="list"
}

role "admin" {
    permit verb="all"
    subroles {
        - "viewer"
    }
}
"#;
        let roles = parse_role_document(kdl).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[1].subroles, vec!["viewer"]);
    }
}
