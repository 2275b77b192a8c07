//! Orchestrator: runs one tailoring request through the whole pipeline.
//!
//! Flow: classify → build prompt → call model (bounded retry on transient
//! failures) → merge → compile.
//!
//! Each stage emits a progress event before it starts. The first failing stage
//! ends the run; its error comes back tagged with that stage. Cancellation is
//! checked before every stage and interrupts a retry backoff. A model call or
//! compile already in flight finishes (or times out), and its result is
//! discarded if the run was cancelled meanwhile.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generation::job_context::JobContext;
use crate::generation::merger::{merge, MergeError, MergedDocument, SlotMap};
use crate::generation::prompt_builder::{self, Prompt, PromptError};
use crate::llm_client::{ModelClient, ModelError, RawResponse};
use crate::pipeline::progress::{CancelFlag, ProgressEvent, ProgressObserver, Stage};
use crate::render::{Artifact, CompilationDriver, CompilationError, EnginePlan};
use crate::templates::classifier::classify;
use crate::templates::TemplateCategory;

/// Longest wait between two model attempts, however many retries are allowed.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Per-run tuning, taken from `Config` at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model_timeout: Duration,
    pub max_model_attempts: u32,
    /// First retry delay; doubles on every further retry up to [`MAX_BACKOFF`].
    pub backoff_base: Duration,
    pub max_output_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(120),
            max_model_attempts: 3,
            backoff_base: Duration::from_secs(1),
            max_output_tokens: prompt_builder::DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// One user action. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub run_id: Uuid,
    pub template_identifier: String,
    pub template_text: String,
    pub job: JobContext,
    pub company_name: String,
    pub model_id: String,
}

impl GenerationRequest {
    pub fn new(
        template_identifier: impl Into<String>,
        template_text: impl Into<String>,
        job_description: &str,
        company_name: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            template_identifier: template_identifier.into(),
            template_text: template_text.into(),
            job: JobContext::infer(job_description),
            company_name: company_name.into(),
            model_id: model_id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable failure kind for callers to branch on or display.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Prompt(PromptError::Configuration { .. }) => "CONFIGURATION_ERROR",
            PipelineError::Model(ModelError::Auth(_)) => "AUTH_ERROR",
            PipelineError::Model(ModelError::Transient(_)) => "TRANSIENT_ERROR",
            PipelineError::Model(ModelError::Protocol(_)) => "PROTOCOL_ERROR",
            PipelineError::Merge(MergeError::SlotCountMismatch { .. }) => "SLOT_COUNT_MISMATCH",
            PipelineError::Merge(MergeError::MissingContent { .. }) => "MISSING_CONTENT",
            PipelineError::Merge(MergeError::UnsafeContent { .. }) => "UNSAFE_CONTENT",
            PipelineError::Compilation(_) => "COMPILATION_ERROR",
            PipelineError::Cancelled => "CANCELLED",
        }
    }

    /// Underlying diagnostic text (the compiler log), when there is one.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            PipelineError::Compilation(e) => e.log(),
            _ => None,
        }
    }
}

/// Terminal failure of a run: what went wrong and where.
#[derive(Debug, Error)]
#[error("{stage:?} failed: {error}")]
pub struct StageFailure {
    pub run_id: Uuid,
    pub stage: Stage,
    pub error: PipelineError,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub run_id: Uuid,
    pub category: TemplateCategory,
    pub slot_map: SlotMap,
    pub document: MergedDocument,
    pub artifact: Artifact,
    pub model_attempts: u32,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub type GenerationResult = Result<GenerationOutput, StageFailure>;

pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    driver: CompilationDriver,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelClient>, driver: CompilationDriver, config: PipelineConfig) -> Self {
        Self {
            model,
            driver,
            config,
        }
    }

    pub async fn run(
        &self,
        request: &GenerationRequest,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> GenerationResult {
        let run_id = request.run_id;
        let fail = |stage: Stage, error: PipelineError| {
            warn!("Run {run_id} stopped at {}: {error}", stage.as_str());
            StageFailure {
                run_id,
                stage,
                error,
            }
        };
        let enter = |stage: Stage, status: &str| {
            if cancel.is_cancelled() {
                return Err(fail(stage, PipelineError::Cancelled));
            }
            observer.on_progress(ProgressEvent::new(run_id, stage, status));
            Ok(())
        };

        // Stage 1: classify
        enter(Stage::Classify, "Classifying template")?;
        let template = classify(&request.template_identifier, &request.template_text);
        info!(
            "Run {run_id}: template '{}' is {} with {} slots",
            template.identifier,
            template.category.as_str(),
            template.slots.len()
        );

        // Stage 2: prompt
        enter(Stage::BuildPrompt, "Building prompt")?;
        let prompt = prompt_builder::build(&template, &request.job, &request.company_name)
            .map_err(|e| fail(Stage::BuildPrompt, e.into()))?
            .with_max_output_tokens(self.config.max_output_tokens);

        // Stage 3: model
        enter(Stage::CallModel, &format!("Optimizing resume with {}", request.model_id))?;
        info!(
            "Run {run_id}: asking {} for {} segment(s)",
            request.model_id, prompt.slot_count
        );
        let (response, model_attempts) = self
            .call_model_with_retry(&prompt, request, observer, cancel)
            .await
            .map_err(|e| fail(Stage::CallModel, e))?;

        // Stage 4: merge
        enter(Stage::Merge, "Merging model output into template")?;
        let (slot_map, document) = merge(&template, &response.text, &prompt.delimiter)
            .map_err(|e| fail(Stage::Merge, e.into()))?;

        // Stage 5: compile
        enter(Stage::Compile, "Compiling PDF")?;
        let plan = EnginePlan::for_document(&document.text);
        let artifact = self
            .driver
            .compile(run_id, &document.text, plan)
            .await
            .map_err(|e| fail(Stage::Compile, e.into()))?;

        if cancel.is_cancelled() {
            return Err(fail(Stage::Compile, PipelineError::Cancelled));
        }

        info!("Run {run_id} succeeded ({model_attempts} model attempt(s))");
        Ok(GenerationOutput {
            run_id,
            category: template.category,
            slot_map,
            document,
            artifact,
            model_attempts,
            usage: TokenUsage {
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            },
        })
    }

    /// Calls the model, retrying transient failures with exponential backoff.
    /// Returns the response and the number of attempts made.
    async fn call_model_with_retry(
        &self,
        prompt: &Prompt,
        request: &GenerationRequest,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> Result<(RawResponse, u32), PipelineError> {
        let max_attempts = self.config.max_model_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .model
                .send(prompt, &request.model_id, self.config.model_timeout)
                .await;

            match result {
                Ok(response) => return Ok((response, attempt)),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = backoff_delay(self.config.backoff_base, attempt);
                    warn!(
                        "Model attempt {attempt}/{max_attempts} failed ({e}), retrying after {}ms",
                        delay.as_millis()
                    );
                    observer.on_progress(ProgressEvent::new(
                        request.run_id,
                        Stage::CallModel,
                        format!("Model service busy, retry {attempt}/{} in {}s", max_attempts - 1, delay.as_secs_f32()),
                    ));
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Delay before retrying after failed attempt number `attempt` (1-based).
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
