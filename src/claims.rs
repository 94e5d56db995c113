//! Turns verified token claims into role names and identity fields.
//!
//! Two independent, non-exclusive claim shapes carry roles:
//! `realm_access.roles` (a flat string array) and
//! `resource_access.<client>.roles` (one array per client). Console-internal
//! clients are excluded; everything else contributes. Extraction does not
//! deduplicate — downstream checks treat the role list as a set of
//! independent checks.

use serde::Serialize;
use serde_json::Value;

use crate::authz::errors::AuthzError;

/// Client whose `resource_access` entry carries product-console-internal
/// roles rather than application roles.
pub const DEFAULT_EXCLUDED_CLIENTS: &[&str] = &["account-console"];

/// Identity fields pulled from the claims payload. All optional; tokens from
/// different issuers carry different subsets.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub subject: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Extract every role name the claims payload carries.
///
/// Absence of either or both role sources yields an empty list; a roles field
/// that is present but not a string array, or a payload that is not a JSON
/// object, is a malformed-claims error.
pub fn extract_roles(claims: &Value, excluded_clients: &[String]) -> Result<Vec<String>, AuthzError> {
    let obj = claims
        .as_object()
        .ok_or_else(|| AuthzError::MalformedClaims("claims payload is not a JSON object".into()))?;

    let mut roles = Vec::new();

    if let Some(realm) = obj.get("realm_access") {
        let realm = realm.as_object().ok_or_else(|| {
            AuthzError::MalformedClaims("`realm_access` is not a JSON object".into())
        })?;
        if let Some(list) = realm.get("roles") {
            append_string_list(&mut roles, list, "realm_access.roles")?;
        }
    }

    if let Some(resource) = obj.get("resource_access") {
        let clients = resource.as_object().ok_or_else(|| {
            AuthzError::MalformedClaims("`resource_access` is not a JSON object".into())
        })?;
        for (client, access) in clients {
            if excluded_clients.iter().any(|c| c == client) {
                continue;
            }
            let access = access.as_object().ok_or_else(|| {
                AuthzError::MalformedClaims(format!(
                    "`resource_access.{client}` is not a JSON object"
                ))
            })?;
            if let Some(list) = access.get("roles") {
                append_string_list(&mut roles, list, &format!("resource_access.{client}.roles"))?;
            }
        }
    }

    Ok(roles)
}

/// Pull identity fields out of the claims payload. Never errors; missing
/// fields stay `None`.
pub fn extract_user(claims: &Value) -> UserInfo {
    let field = |key: &str| {
        claims
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    UserInfo {
        subject: field("sub"),
        username: field("preferred_username"),
        email: field("email"),
    }
}

fn append_string_list(
    roles: &mut Vec<String>,
    list: &Value,
    field: &str,
) -> Result<(), AuthzError> {
    let list = list
        .as_array()
        .ok_or_else(|| AuthzError::MalformedClaims(format!("`{field}` is not an array")))?;
    for item in list {
        let role = item.as_str().ok_or_else(|| {
            AuthzError::MalformedClaims(format!("`{field}` contains a non-string entry"))
        })?;
        roles.push(role.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn excluded() -> Vec<String> {
        DEFAULT_EXCLUDED_CLIENTS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merges_realm_and_resource_roles() {
        let claims = json!({
            "realm_access": { "roles": ["admin", "user"] },
            "resource_access": {
                "account": { "roles": ["manage-account"] },
                "account-console": { "roles": ["console-internal"] }
            }
        });

        let roles = extract_roles(&claims, &excluded()).unwrap();
        assert!(roles.contains(&"admin".to_string()));
        assert!(roles.contains(&"user".to_string()));
        assert!(roles.contains(&"manage-account".to_string()));
        assert!(!roles.contains(&"console-internal".to_string()));
        assert_eq!(roles.len(), 3);
    }

    #[test]
    fn test_absent_sources_yield_empty_list() {
        let roles = extract_roles(&json!({ "sub": "abc" }), &excluded()).unwrap();
        assert!(roles.is_empty());

        let roles = extract_roles(
            &json!({ "realm_access": {}, "resource_access": {} }),
            &excluded(),
        )
        .unwrap();
        assert!(roles.is_empty());
    }

    #[test]
    fn test_duplicates_across_sources_survive() {
        let claims = json!({
            "realm_access": { "roles": ["ops"] },
            "resource_access": { "gateway": { "roles": ["ops"] } }
        });
        let roles = extract_roles(&claims, &excluded()).unwrap();
        assert_eq!(roles.iter().filter(|r| *r == "ops").count(), 2);
    }

    #[test]
    fn test_non_array_roles_is_malformed() {
        let claims = json!({ "realm_access": { "roles": "admin" } });
        let err = extract_roles(&claims, &excluded()).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedClaims(_)));
    }

    #[test]
    fn test_non_string_entry_is_malformed() {
        let claims = json!({ "realm_access": { "roles": ["admin", 7] } });
        let err = extract_roles(&claims, &excluded()).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedClaims(_)));
    }

    #[test]
    fn test_non_object_payload_is_malformed() {
        let err = extract_roles(&json!("not an object"), &excluded()).unwrap_err();
        assert!(matches!(err, AuthzError::MalformedClaims(_)));
    }

    #[test]
    fn test_configurable_exclusion() {
        let claims = json!({
            "resource_access": { "internal-console": { "roles": ["hidden"] } }
        });
        let roles = extract_roles(&claims, &["internal-console".to_string()]).unwrap();
        assert!(roles.is_empty());
        let roles = extract_roles(&claims, &excluded()).unwrap();
        assert_eq!(roles, vec!["hidden"]);
    }

    #[test]
    fn test_extract_user_fields() {
        let claims = json!({
            "sub": "1234",
            "preferred_username": "alice",
            "email": "alice@example.com"
        });
        let user = extract_user(&claims);
        assert_eq!(user.subject.as_deref(), Some("1234"));
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));

        let user = extract_user(&json!({}));
        assert!(user.subject.is_none());
        assert!(user.username.is_none());
        assert!(user.email.is_none());
    }
}
