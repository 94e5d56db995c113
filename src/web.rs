//! HTTP surface of the gateway: every resource and release operation is
//! authorized against the caller's roles before it is dispatched to the
//! injected backend.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use miette::IntoDiagnostic;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::authz::engine;
use crate::authz::types::{AccessRequest, AuthorizeResponse, Verb, WILDCARD};
use crate::authz::RoleStore;
use crate::claims::{self, UserInfo};
use crate::gateway::{ClusterGateway, ReleaseGateway};
use crate::settings::Settings;
use crate::token::{self, TokenVerifier};

/// Resource-type under which Helm release operations are authorized.
pub const RELEASE_RESOURCE: &str = "releases";

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<RoleStore>,
    pub verifier: TokenVerifier,
    pub cluster: Arc<dyn ClusterGateway>,
    pub releases: Arc<dyn ReleaseGateway>,
}

/// Verified caller identity and role set, extracted from the bearer token on
/// every request that needs authorization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserInfo,
    pub roles: Vec<String>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = token::bearer_token(&parts.headers) else {
            return Err(unauthorized("missing bearer token"));
        };

        let claims = state.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "token verification failed");
            unauthorized("invalid token")
        })?;

        let roles = claims::extract_roles(&claims, &state.settings.auth.excluded_clients)
            .map_err(|e| e.into_response())?;
        let user = claims::extract_user(&claims);

        Ok(Self { user, roles })
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Gate a dispatch on the caller's roles; a denial is a normal 403, not an
/// error.
fn authorize(
    state: &AppState,
    auth: &AuthContext,
    resource: &str,
    namespace: &str,
    verb: Verb,
) -> Result<(), Response> {
    let req = AccessRequest::new(resource, namespace, verb);
    if engine::is_user_authorized(&state.store, &auth.roles, &req) {
        return Ok(());
    }
    tracing::debug!(
        user = auth.user.username.as_deref().unwrap_or("<unknown>"),
        resource,
        namespace,
        verb = ?verb,
        "permission denied"
    );
    Err((
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "permission denied" })),
    )
        .into_response())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/v1/session/status", get(session_status))
        .route("/v1/authorize", post(authorize_check))
        .route("/v1/resources/{resource}", get(list_all_namespaces))
        .route(
            "/v1/resources/{resource}/{namespace}",
            get(list_namespaced).post(create_resource),
        )
        .route(
            "/v1/resources/{resource}/{namespace}/{name}",
            get(get_resource)
                .put(update_resource)
                .delete(delete_resource),
        )
        .route("/v1/releases", get(list_releases))
        .route("/v1/releases/{namespace}", get(list_namespaced_releases))
        .route(
            "/v1/releases/{namespace}/{name}",
            get(get_release).delete(uninstall_release),
        )
        .route(
            "/v1/releases/{namespace}/{name}/rollback",
            post(rollback_release),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> miette::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    )
    .parse()
    .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    let router = router(state);

    tracing::info!(%addr, "Gateway API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Who-am-I: identity, role names, and the pruned permission summary.
async fn session_status(State(state): State<AppState>, auth: AuthContext) -> impl IntoResponse {
    let mut matrix = engine::get_all_permissions(&state.store, &auth.roles);
    let pruned = matrix.prune();
    tracing::debug!(pruned, "compacted permission summary");

    Json(json!({
        "user": auth.user,
        "roles": auth.roles,
        "permissions": matrix.entries(),
    }))
}

async fn authorize_check(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<AccessRequest>,
) -> impl IntoResponse {
    let allowed = engine::is_user_authorized(&state.store, &auth.roles, &req);
    Json(AuthorizeResponse { allowed })
}

// ---------- cluster resources ----------

async fn list_all_namespaces(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(resource): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, WILDCARD, Verb::List) {
        return denied;
    }
    match state.cluster.list(&resource, None).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_namespaced(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((resource, namespace)): Path<(String, String)>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, &namespace, Verb::List) {
        return denied;
    }
    match state.cluster.list(&resource, Some(&namespace)).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn create_resource(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((resource, namespace)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, &namespace, Verb::Create) {
        return denied;
    }
    match state.cluster.create(&resource, &namespace, body).await {
        Ok(v) => (StatusCode::CREATED, Json(v)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_resource(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((resource, namespace, name)): Path<(String, String, String)>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, &namespace, Verb::Read) {
        return denied;
    }
    match state.cluster.get(&resource, &namespace, &name).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn update_resource(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((resource, namespace, name)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, &namespace, Verb::Update) {
        return denied;
    }
    match state.cluster.update(&resource, &namespace, &name, body).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn delete_resource(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((resource, namespace, name)): Path<(String, String, String)>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, &resource, &namespace, Verb::Delete) {
        return denied;
    }
    match state.cluster.delete(&resource, &namespace, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

// ---------- helm releases ----------

#[derive(Debug, Deserialize)]
struct RollbackRequest {
    revision: u32,
}

async fn list_releases(State(state): State<AppState>, auth: AuthContext) -> Response {
    if let Err(denied) = authorize(&state, &auth, RELEASE_RESOURCE, WILDCARD, Verb::List) {
        return denied;
    }
    match state.releases.list(None).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_namespaced_releases(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(namespace): Path<String>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, RELEASE_RESOURCE, &namespace, Verb::List) {
        return denied;
    }
    match state.releases.list(Some(&namespace)).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_release(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, RELEASE_RESOURCE, &namespace, Verb::Read) {
        return denied;
    }
    match state.releases.get(&namespace, &name).await {
        Ok(v) => Json(v).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn rollback_release(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((namespace, name)): Path<(String, String)>,
    Json(req): Json<RollbackRequest>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, RELEASE_RESOURCE, &namespace, Verb::Update) {
        return denied;
    }
    match state
        .releases
        .rollback(&namespace, &name, req.revision)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn uninstall_release(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    if let Err(denied) = authorize(&state, &auth, RELEASE_RESOURCE, &namespace, Verb::Delete) {
        return denied;
    }
    match state.releases.uninstall(&namespace, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
