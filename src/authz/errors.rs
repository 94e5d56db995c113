use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load role file `{path}`")]
    #[diagnostic(
        code(kubegate::authz::role_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    RoleLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid role definition: {0}")]
    #[diagnostic(
        code(kubegate::authz::invalid_role),
        help("Each role file must contain `role` nodes with `permit`, `deny`, or `subroles` children")
    )]
    InvalidRole(String),

    #[error("Invalid rule: {0}")]
    #[diagnostic(
        code(kubegate::authz::invalid_rule),
        help("Rule syntax: permit resource=\"*\" namespace=\"*\" verb=\"read\" (verbs: create, read, update, delete, list, all)")
    )]
    InvalidRule(String),

    #[error("Cyclic subrole reference detected: {0}")]
    #[diagnostic(
        code(kubegate::authz::cyclic_subroles),
        help("Check the `subroles` lists in your role definitions for circular references")
    )]
    CyclicSubroles(String),

    #[error("Malformed token claims: {0}")]
    #[diagnostic(
        code(kubegate::authz::malformed_claims),
        help("Role-bearing claims must be string arrays under `realm_access.roles` or `resource_access.<client>.roles`")
    )]
    MalformedClaims(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(kubegate::authz::kdl_parse),
        help("Check your KDL file syntax — see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(kubegate::authz::io))]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthzError::MalformedClaims(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
