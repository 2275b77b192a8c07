use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::ModelClient;
use crate::output::OutputStore;
use crate::pipeline::orchestrator::Orchestrator;
use crate::pipeline::runner::RunSlot;
use crate::templates::store::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub templates: Arc<dyn TemplateStore>,
    pub outputs: Arc<dyn OutputStore>,
    /// Also held by the orchestrator; used directly for credential checks.
    pub model: Arc<dyn ModelClient>,
    pub orchestrator: Arc<Orchestrator>,
    /// At most one run in flight.
    pub runs: RunSlot,
}
