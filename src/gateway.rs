//! External collaborators: the cluster resource client and the Helm release
//! manager. Only their seams live here; real implementations wrap the
//! Kubernetes dynamic client and the Helm SDK and are injected at startup.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GatewayError {
    #[error("{kind} `{name}` not found")]
    #[diagnostic(code(kubegate::gateway::not_found))]
    NotFound { kind: String, name: String },

    #[error("Upstream error: {0}")]
    #[diagnostic(code(kubegate::gateway::upstream))]
    Upstream(String),

    #[error("No backend configured for {0}")]
    #[diagnostic(
        code(kubegate::gateway::not_configured),
        help("Wire a cluster/release backend into the router state at startup")
    )]
    NotConfigured(&'static str),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Thin seam over the Kubernetes dynamic client.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// List objects of a resource type; `None` namespace means all namespaces.
    async fn list(&self, resource: &str, namespace: Option<&str>) -> Result<Value, GatewayError>;
    async fn get(&self, resource: &str, namespace: &str, name: &str)
        -> Result<Value, GatewayError>;
    async fn create(
        &self,
        resource: &str,
        namespace: &str,
        body: Value,
    ) -> Result<Value, GatewayError>;
    async fn update(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<Value, GatewayError>;
    async fn delete(&self, resource: &str, namespace: &str, name: &str)
        -> Result<(), GatewayError>;
}

/// Thin seam over the Helm SDK.
#[async_trait]
pub trait ReleaseGateway: Send + Sync {
    /// List releases; `None` namespace means all namespaces.
    async fn list(&self, namespace: Option<&str>) -> Result<Value, GatewayError>;
    async fn get(&self, namespace: &str, name: &str) -> Result<Value, GatewayError>;
    async fn rollback(&self, namespace: &str, name: &str, revision: u32)
        -> Result<(), GatewayError>;
    async fn uninstall(&self, namespace: &str, name: &str) -> Result<(), GatewayError>;
}

/// Stand-in backend for deployments where no cluster or Helm connection has
/// been configured yet: every call fails with 503. Authorization decisions
/// still run in front of it, so the permission layer is fully exercisable.
pub struct Unconfigured;

#[async_trait]
impl ClusterGateway for Unconfigured {
    async fn list(&self, _resource: &str, _namespace: Option<&str>) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("cluster resources"))
    }

    async fn get(
        &self,
        _resource: &str,
        _namespace: &str,
        _name: &str,
    ) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("cluster resources"))
    }

    async fn create(
        &self,
        _resource: &str,
        _namespace: &str,
        _body: Value,
    ) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("cluster resources"))
    }

    async fn update(
        &self,
        _resource: &str,
        _namespace: &str,
        _name: &str,
        _body: Value,
    ) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("cluster resources"))
    }

    async fn delete(
        &self,
        _resource: &str,
        _namespace: &str,
        _name: &str,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured("cluster resources"))
    }
}

#[async_trait]
impl ReleaseGateway for Unconfigured {
    async fn list(&self, _namespace: Option<&str>) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("helm releases"))
    }

    async fn get(&self, _namespace: &str, _name: &str) -> Result<Value, GatewayError> {
        Err(GatewayError::NotConfigured("helm releases"))
    }

    async fn rollback(
        &self,
        _namespace: &str,
        _name: &str,
        _revision: u32,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured("helm releases"))
    }

    async fn uninstall(&self, _namespace: &str, _name: &str) -> Result<(), GatewayError> {
        Err(GatewayError::NotConfigured("helm releases"))
    }
}
