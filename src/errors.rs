use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GateError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(kubegate::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(kubegate::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(kubegate::serde))]
    Serde(#[from] serde_json::Error),

    #[error("JOSE error: {0}")]
    #[diagnostic(code(kubegate::jose))]
    Jose(String),

    #[error("Failed to fetch JWKS from `{url}`: {reason}")]
    #[diagnostic(
        code(kubegate::jwks_fetch),
        help("Check that the identity provider is reachable and `auth.jwks_url` is correct")
    )]
    JwksFetch { url: String, reason: String },

    #[error("Invalid token: {0}")]
    #[diagnostic(code(kubegate::invalid_token))]
    InvalidToken(String),

    #[error("{0}")]
    #[diagnostic(code(kubegate::other))]
    Other(String),
}

impl From<josekit::JoseError> for GateError {
    fn from(value: josekit::JoseError) -> Self {
        GateError::Jose(value.to_string())
    }
}
