//! End-to-end flow: KDL role definitions -> role store -> signed bearer
//! token -> HTTP authorization decisions and permission summary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use josekit::jwk::Jwk;
use josekit::jws::{JwsHeader, RS256};
use josekit::jwt::{self, JwtPayload};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use kubegate::authz::loader::compile_roles;
use kubegate::authz::policy::parse_role_document;
use kubegate::gateway::{ClusterGateway, GatewayError, ReleaseGateway};
use kubegate::settings::Settings;
use kubegate::token::TokenVerifier;
use kubegate::web::{router, AppState};

const ROLE_DOC: &str = r#"
role "viewer" {
    permit resource="*" namespace="*" verb="read"
    permit resource="*" namespace="*" verb="list"
}

role "ops" {
    permit resource="*" namespace="*" verb="all"
    deny resource="secrets" namespace="kube-system" verb="read"
    subroles {
        - "viewer"
    }
}
"#;

/// Cluster fake: objects keyed by (resource, namespace, name).
#[derive(Default)]
struct InMemoryCluster {
    objects: Mutex<HashMap<(String, String, String), Value>>,
}

#[async_trait]
impl ClusterGateway for InMemoryCluster {
    async fn list(&self, resource: &str, namespace: Option<&str>) -> Result<Value, GatewayError> {
        let objects = self.objects.lock().unwrap();
        let items: Vec<Value> = objects
            .iter()
            .filter(|((r, ns, _), _)| {
                r == resource && namespace.map(|n| n == ns).unwrap_or(true)
            })
            .map(|(_, v)| v.clone())
            .collect();
        Ok(json!({ "items": items }))
    }

    async fn get(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Value, GatewayError> {
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(resource.into(), namespace.into(), name.into()))
            .cloned()
            .ok_or_else(|| GatewayError::NotFound {
                kind: resource.into(),
                name: name.into(),
            })
    }

    async fn create(
        &self,
        resource: &str,
        namespace: &str,
        body: Value,
    ) -> Result<Value, GatewayError> {
        let name = body["metadata"]["name"]
            .as_str()
            .unwrap_or("unnamed")
            .to_string();
        self.objects
            .lock()
            .unwrap()
            .insert((resource.into(), namespace.into(), name), body.clone());
        Ok(body)
    }

    async fn update(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
        body: Value,
    ) -> Result<Value, GatewayError> {
        self.objects
            .lock()
            .unwrap()
            .insert((resource.into(), namespace.into(), name.into()), body.clone());
        Ok(body)
    }

    async fn delete(
        &self,
        resource: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), GatewayError> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(resource.into(), namespace.into(), name.into()));
        Ok(())
    }
}

/// Release fake: records rollbacks, serves a fixed release list.
#[derive(Default)]
struct FakeReleases {
    rollbacks: Mutex<Vec<(String, String, u32)>>,
}

#[async_trait]
impl ReleaseGateway for FakeReleases {
    async fn list(&self, _namespace: Option<&str>) -> Result<Value, GatewayError> {
        Ok(json!({ "items": [{ "name": "ingress", "namespace": "infra", "revision": 3 }] }))
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Value, GatewayError> {
        Ok(json!({ "name": name, "namespace": namespace, "revision": 3 }))
    }

    async fn rollback(
        &self,
        namespace: &str,
        name: &str,
        revision: u32,
    ) -> Result<(), GatewayError> {
        self.rollbacks
            .lock()
            .unwrap()
            .push((namespace.into(), name.into(), revision));
        Ok(())
    }

    async fn uninstall(&self, _namespace: &str, _name: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct Harness {
    jwk: Jwk,
    state: AppState,
    releases: Arc<FakeReleases>,
}

fn harness() -> Harness {
    let roles = parse_role_document(ROLE_DOC).expect("role document parses");
    let store = compile_roles(roles).expect("role graph is acyclic");

    let mut jwk = Jwk::generate_rsa_key(2048).expect("generate key");
    jwk.set_key_id("it-key");
    jwk.set_algorithm("RS256");
    let public = jwk.to_public_key().expect("public key");
    let jwks = json!({ "keys": [serde_json::to_value(public).unwrap()] });
    let verifier = TokenVerifier::from_jwks_value(jwks, None).expect("verifier");

    let releases = Arc::new(FakeReleases::default());
    let state = AppState {
        settings: Arc::new(Settings::default()),
        store: Arc::new(store),
        verifier,
        cluster: Arc::new(InMemoryCluster::default()),
        releases: releases.clone(),
    };

    Harness {
        jwk,
        state,
        releases,
    }
}

fn sign_claims(jwk: &Jwk, claims: Value) -> String {
    let mut payload = JwtPayload::new();
    payload.set_subject("it-user");
    payload.set_expires_at(&(SystemTime::now() + Duration::from_secs(300)));
    if let Value::Object(map) = claims {
        for (k, v) in map {
            payload.set_claim(&k, Some(v)).expect("claim");
        }
    }
    let signer = RS256.signer_from_jwk(jwk).expect("signer");
    let mut header = JwsHeader::new();
    header.set_algorithm("RS256");
    jwt::encode_with_signer(&payload, &header, &signer).expect("sign")
}

fn token_for_roles(jwk: &Jwk, roles: &[&str]) -> String {
    sign_claims(jwk, json!({ "realm_access": { "roles": roles } }))
}

async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

#[tokio::test]
async fn health_needs_no_token() {
    let h = harness();
    let (status, _) = send(&h.state, "GET", "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let h = harness();
    let (status, body) = send(&h.state, "GET", "/v1/resources/pods", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing bearer token");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let h = harness();
    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods",
        Some("not.a.jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ops_can_create_and_read_back() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["ops"]);

    let pod = json!({ "metadata": { "name": "web-1" }, "spec": {} });
    let (status, _) = send(
        &h.state,
        "POST",
        "/v1/resources/pods/default",
        Some(&token),
        Some(pod),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/default/web-1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["name"], "web-1");
}

#[tokio::test]
async fn viewer_reads_but_cannot_mutate() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["viewer"]);

    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/default",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.state,
        "DELETE",
        "/v1/resources/pods/default/web-1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "permission denied");
}

#[tokio::test]
async fn deny_rule_carves_out_protected_cell() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["ops"]);

    // ops may read pods in kube-system but not secrets there; the deny is
    // scoped to the single cell.
    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/kube-system/coredns",
        Some(&token),
        None,
    )
    .await;
    assert_ne!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/secrets/kube-system/bootstrap-token",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/secrets/default/app-secret",
        Some(&token),
        None,
    )
    .await;
    assert_ne!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_role_grants_nothing() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["made-up-role"]);
    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/default",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn authorize_endpoint_reports_decision() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["viewer"]);

    let (status, body) = send(
        &h.state,
        "POST",
        "/v1/authorize",
        Some(&token),
        Some(json!({ "resource": "pods", "namespace": "default", "verb": "read" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (_, body) = send(
        &h.state,
        "POST",
        "/v1/authorize",
        Some(&token),
        Some(json!({ "resource": "pods", "namespace": "default", "verb": "delete" })),
    )
    .await;
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn session_status_reports_pruned_matrix() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["ops"]);

    let (status, body) = send(&h.state, "GET", "/v1/session/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["subject"], "it-user");
    assert_eq!(body["roles"][0], "ops");

    let entries = body["permissions"].as_array().unwrap();
    // The wildcard cell grants everything; the kube-system/secrets cell
    // differs (read carved out), so exactly those informative cells survive.
    let wildcard = entries
        .iter()
        .find(|e| e["resource"] == "*" && e["namespace"] == "*")
        .expect("wildcard entry present");
    assert_eq!(
        wildcard["operations"].as_array().unwrap().len(),
        5,
        "wildcard cell carries all verbs"
    );
    let carved = entries
        .iter()
        .find(|e| e["resource"] == "secrets" && e["namespace"] == "kube-system")
        .expect("carved cell present");
    assert!(!carved["operations"]
        .as_array()
        .unwrap()
        .contains(&json!("r")));
}

#[tokio::test]
async fn resource_access_roles_also_authorize() {
    let h = harness();
    let token = sign_claims(
        &h.jwk,
        json!({
            "resource_access": {
                "kubegate": { "roles": ["viewer"] },
                "account-console": { "roles": ["ops"] }
            }
        }),
    );

    // viewer from the application client applies; ops under the console
    // client is excluded, so mutation stays forbidden.
    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/default",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.state,
        "DELETE",
        "/v1/resources/pods/default/web-1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_roles_claim_is_bad_request() {
    let h = harness();
    let token = sign_claims(&h.jwk, json!({ "realm_access": { "roles": "ops" } }));

    let (status, _) = send(
        &h.state,
        "GET",
        "/v1/resources/pods/default",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn release_rollback_requires_update_permission() {
    let h = harness();

    let viewer = token_for_roles(&h.jwk, &["viewer"]);
    let (status, _) = send(
        &h.state,
        "POST",
        "/v1/releases/infra/ingress/rollback",
        Some(&viewer),
        Some(json!({ "revision": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(h.releases.rollbacks.lock().unwrap().is_empty());

    let ops = token_for_roles(&h.jwk, &["ops"]);
    let (status, _) = send(
        &h.state,
        "POST",
        "/v1/releases/infra/ingress/rollback",
        Some(&ops),
        Some(json!({ "revision": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        h.releases.rollbacks.lock().unwrap().as_slice(),
        &[("infra".to_string(), "ingress".to_string(), 2)]
    );
}

#[tokio::test]
async fn viewer_can_list_releases() {
    let h = harness();
    let token = token_for_roles(&h.jwk, &["viewer"]);
    let (status, body) = send(&h.state, "GET", "/v1/releases", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["name"], "ingress");
}
