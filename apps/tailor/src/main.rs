mod config;
mod credentials;
mod errors;
mod generation;
mod llm_client;
mod output;
mod pipeline;
mod render;
mod routes;
mod state;
mod templates;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::credentials::ConfiguredCredentialStore;
use crate::llm_client::AnthropicClient;
use crate::output::DirOutputStore;
use crate::pipeline::orchestrator::{Orchestrator, PipelineConfig};
use crate::pipeline::runner::RunSlot;
use crate::render::{CompilationDriver, LatexCompiler};
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::store::{DirTemplateStore, TemplateStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor v{}", env!("CARGO_PKG_VERSION"));

    // Templates
    let templates = Arc::new(DirTemplateStore::new(&config.template_dir));
    match templates.list().await {
        Ok(names) if names.is_empty() => warn!("No templates found in {}", config.template_dir),
        Ok(names) => info!("{} template(s) in {}", names.len(), config.template_dir),
        Err(e) => warn!("Could not read template directory {}: {e}", config.template_dir),
    }

    // Model client. A missing key is not fatal; runs fail with AUTH_ERROR until one is set.
    let credentials = Arc::new(ConfiguredCredentialStore::new(
        config.anthropic_api_key.clone(),
        config.anthropic_api_key_b64.clone(),
    ));
    if config.anthropic_api_key.is_none() && config.anthropic_api_key_b64.is_none() {
        warn!("No Anthropic API key configured");
    }
    let model = Arc::new(AnthropicClient::new(credentials));
    info!("Model client initialized (default model: {})", config.model);

    // Compilation
    let driver = CompilationDriver::new(Arc::new(LatexCompiler), config.compile_timeout);

    let orchestrator = Arc::new(Orchestrator::new(
        model.clone(),
        driver,
        PipelineConfig {
            model_timeout: config.model_timeout,
            max_model_attempts: config.max_model_attempts,
            max_output_tokens: config.max_output_tokens,
            ..PipelineConfig::default()
        },
    ));

    // Build app state
    let state = AppState {
        templates,
        outputs: Arc::new(DirOutputStore::new(&config.output_dir)),
        model,
        orchestrator,
        runs: RunSlot::default(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
