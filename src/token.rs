//! Bearer token handling: JWKS loading and RS256 verification.
//!
//! Signature verification is deliberately thin — the interesting work happens
//! after it, when the verified claims are turned into roles.

use std::fs;
use std::sync::Arc;
use std::time::SystemTime;

use axum::http::HeaderMap;
use josekit::jwk::Jwk;
use josekit::jws::RS256;
use josekit::jwt;
use serde_json::Value;

use crate::errors::GateError;
use crate::settings::Auth;

#[derive(Clone, Debug)]
pub struct TokenVerifier {
    keys: Arc<Vec<Jwk>>,
    issuer: Option<String>,
}

impl TokenVerifier {
    /// Build a verifier from the configured JWKS source: a local file if
    /// `jwks_path` is set, otherwise fetched once from `jwks_url`.
    pub fn load(cfg: &Auth) -> Result<Self, GateError> {
        let jwks: Value = if let Some(path) = &cfg.jwks_path {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else if let Some(url) = &cfg.jwks_url {
            ureq::get(url)
                .call()
                .map_err(|e| GateError::JwksFetch {
                    url: url.clone(),
                    reason: e.to_string(),
                })?
                .into_json()
                .map_err(|e| GateError::JwksFetch {
                    url: url.clone(),
                    reason: e.to_string(),
                })?
        } else {
            return Err(GateError::Other(
                "no JWKS source configured: set auth.jwks_path or auth.jwks_url".into(),
            ));
        };
        Self::from_jwks_value(jwks, cfg.issuer.clone())
    }

    /// Build a verifier from an already-parsed JWKS document.
    pub fn from_jwks_value(jwks: Value, issuer: Option<String>) -> Result<Self, GateError> {
        let keys = jwks
            .get("keys")
            .and_then(|k| k.as_array())
            .ok_or_else(|| GateError::Other("JWKS document has no `keys` array".into()))?;
        let keys: Vec<Jwk> = keys
            .iter()
            .map(|k| serde_json::from_value(k.clone()))
            .collect::<Result<_, _>>()?;
        if keys.is_empty() {
            return Err(GateError::Other("JWKS document contains no keys".into()));
        }

        tracing::info!(keys = keys.len(), "Loaded JWKS");

        Ok(Self {
            keys: Arc::new(keys),
            issuer,
        })
    }

    /// Verify an RS256 token against the key set and return its claims.
    /// Checks expiry and, when configured, the issuer.
    pub fn verify(&self, token: &str) -> Result<Value, GateError> {
        for jwk in self.keys.iter() {
            let Ok(verifier) = RS256.verifier_from_jwk(jwk) else {
                continue;
            };
            let Ok((payload, _header)) = jwt::decode_with_verifier(token, &verifier) else {
                continue;
            };

            if let Some(expires_at) = payload.expires_at() {
                if expires_at < SystemTime::now() {
                    return Err(GateError::InvalidToken("token is expired".into()));
                }
            }
            if let Some(expected) = &self.issuer {
                if payload.issuer() != Some(expected.as_str()) {
                    return Err(GateError::InvalidToken(format!(
                        "unexpected issuer `{}`",
                        payload.issuer().unwrap_or("<none>")
                    )));
                }
            }

            return Ok(Value::Object(payload.claims_set().clone()));
        }

        Err(GateError::InvalidToken(
            "signature did not match any known key".into(),
        ))
    }
}

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
