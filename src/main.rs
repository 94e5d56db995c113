use std::sync::Arc;

use clap::Parser;
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

use kubegate::authz::loader;
use kubegate::gateway::Unconfigured;
use kubegate::settings::Settings;
use kubegate::token::TokenVerifier;
use kubegate::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(
    name = "kubegate",
    version,
    about = "Kubernetes backend-for-frontend gateway with role-based authorization"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // Build the role store up front: a cyclic subrole graph must refuse to
    // serve, not fail per request.
    let store = match &settings.roles.dir {
        Some(dir) => loader::load_roles(dir)
            .map_err(|e| miette::miette!("failed to load role definitions: {e}"))?,
        None => {
            tracing::warn!("no roles directory configured, using builtin placeholder roles");
            loader::compile_roles(loader::builtin_roles())
                .map_err(|e| miette::miette!("builtin roles failed to compile: {e}"))?
        }
    };

    let verifier = TokenVerifier::load(&settings.auth)
        .map_err(|e| miette::miette!("failed to initialize token verification: {e}"))?;

    let state = AppState {
        settings: Arc::new(settings),
        store: Arc::new(store),
        verifier,
        cluster: Arc::new(Unconfigured),
        releases: Arc::new(Unconfigured),
    };

    web::serve(state).await
}
