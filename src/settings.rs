use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub roles: Roles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// Path to a local JWKS file. Takes precedence over `jwks_url`.
    pub jwks_path: Option<PathBuf>,
    /// JWKS endpoint of the identity provider, fetched once at startup.
    pub jwks_url: Option<String>,
    /// Expected `iss` claim. Unchecked when unset.
    pub issuer: Option<String>,
    /// `resource_access` clients whose roles are console-internal and never
    /// contribute to application roles.
    #[serde(default = "default_excluded_clients")]
    pub excluded_clients: Vec<String>,
}

fn default_excluded_clients() -> Vec<String> {
    crate::claims::DEFAULT_EXCLUDED_CLIENTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Roles {
    /// Directory of `.kdl` role files. When unset, the builtin placeholder
    /// roles are used.
    pub dir: Option<PathBuf>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            jwks_path: None,
            jwks_url: None,
            issuer: None,
            excluded_clients: default_excluded_clients(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: KUBEGATE__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix("KUBEGATE").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        // Normalize relative paths against the current dir
        if let Some(dir) = &s.roles.dir {
            if dir.is_relative() {
                s.roles.dir = Some(std::env::current_dir().into_diagnostic()?.join(dir));
            }
        }
        if let Some(jwks) = &s.auth.jwks_path {
            if jwks.is_relative() {
                s.auth.jwks_path = Some(std::env::current_dir().into_diagnostic()?.join(jwks));
            }
        }

        Ok(s)
    }
}
