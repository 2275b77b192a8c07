//! Run management: at most one generation in flight, executed off the request path.
//!
//! `RunSlot` hands out a `RunTicket` for the active run; dropping the ticket
//! frees the slot. Status for the latest run (events + outcome) stays readable
//! after it finishes, until the next run replaces it.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::output::{OutputStore, SavedFiles};
use crate::pipeline::orchestrator::{
    GenerationOutput, GenerationRequest, Orchestrator, StageFailure, TokenUsage,
};
use crate::pipeline::progress::{CancelFlag, ProgressEvent, ProgressObserver, Stage};
use crate::render::Engine;
use crate::templates::TemplateCategory;

#[derive(Debug, Error)]
#[error("A generation run is already in progress ({0})")]
pub struct RunInProgress(pub Uuid);

/// Terminal result of a run as shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded {
        category: TemplateCategory,
        engine: Engine,
        compile_attempts: usize,
        model_attempts: u32,
        slots: Vec<String>,
        usage: TokenUsage,
        /// Merged LaTeX source that was compiled.
        tex: String,
        compile_log: String,
        files: SavedFiles,
    },
    Failed {
        stage: Stage,
        code: &'static str,
        message: String,
        /// Compiler log for compilation failures, kept even if saving it failed.
        diagnostic: Option<String>,
        files: SavedFiles,
    },
}

/// Progress sink and outcome holder for one run.
pub struct RunRecord {
    pub run_id: Uuid,
    pub template: String,
    pub company_name: String,
    pub started_at: DateTime<Utc>,
    events: Mutex<Vec<ProgressEvent>>,
    outcome: Mutex<Option<RunOutcome>>,
}

impl RunRecord {
    pub fn new(request: &GenerationRequest) -> Self {
        Self {
            run_id: request.run_id,
            template: request.template_identifier.clone(),
            company_name: request.company_name.clone(),
            started_at: Utc::now(),
            events: Mutex::new(Vec::new()),
            outcome: Mutex::new(None),
        }
    }

    fn finish(&self, outcome: RunOutcome) {
        *lock(&self.outcome) = Some(outcome);
    }

    pub fn snapshot(&self, running: bool) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            template: self.template.clone(),
            company_name: self.company_name.clone(),
            started_at: self.started_at,
            running,
            events: lock(&self.events).clone(),
            outcome: lock(&self.outcome).clone(),
        }
    }
}

impl ProgressObserver for RunRecord {
    fn on_progress(&self, event: ProgressEvent) {
        info!("[{}] {}: {}", event.run_id, event.stage.as_str(), event.status);
        lock(&self.events).push(event);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub template: String,
    pub company_name: String,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub events: Vec<ProgressEvent>,
    pub outcome: Option<RunOutcome>,
}

#[derive(Default)]
struct SlotState {
    active: Option<(Uuid, CancelFlag)>,
    latest: Option<Arc<RunRecord>>,
}

/// Single-flight gate shared through `AppState`.
#[derive(Clone, Default)]
pub struct RunSlot {
    state: Arc<Mutex<SlotState>>,
}

impl RunSlot {
    /// Claims the slot for `record`, or reports the run already holding it.
    pub fn try_start(&self, record: Arc<RunRecord>) -> Result<RunTicket, RunInProgress> {
        let mut state = lock(&*self.state);
        if let Some((active_id, _)) = &state.active {
            return Err(RunInProgress(*active_id));
        }

        let cancel = CancelFlag::default();
        state.active = Some((record.run_id, cancel.clone()));
        state.latest = Some(record.clone());

        Ok(RunTicket {
            slot: self.clone(),
            run_id: record.run_id,
            cancel,
        })
    }

    /// Requests cancellation of the active run. Returns its ID if there was one.
    pub fn cancel(&self) -> Option<Uuid> {
        let state = lock(&*self.state);
        state.active.as_ref().map(|(id, flag)| {
            flag.cancel();
            *id
        })
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        lock(&*self.state).active.is_some()
    }

    pub fn latest(&self) -> Option<RunSnapshot> {
        let state = lock(&*self.state);
        let running = state.active.is_some();
        state.latest.as_ref().map(|r| r.snapshot(running))
    }
}

/// Held by the task executing a run. Dropping it frees the slot.
pub struct RunTicket {
    slot: RunSlot,
    run_id: Uuid,
    cancel: CancelFlag,
}

impl RunTicket {
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        let mut state = lock(&*self.slot.state);
        if matches!(&state.active, Some((id, _)) if *id == self.run_id) {
            state.active = None;
        }
    }
}

/// Claims the slot and runs `request` on a background task.
pub fn start_run(
    slot: &RunSlot,
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn OutputStore>,
    request: GenerationRequest,
) -> Result<Uuid, RunInProgress> {
    let record = Arc::new(RunRecord::new(&request));
    let ticket = slot.try_start(record.clone())?;
    let run_id = request.run_id;

    info!(
        "Starting run {run_id} (template '{}', company '{}', model {})",
        request.template_identifier, request.company_name, request.model_id
    );

    tokio::spawn(async move {
        let result = orchestrator
            .run(&request, &*record, ticket.cancel_flag())
            .await;
        let outcome = match result {
            Ok(output) => persist_success(store.as_ref(), &request, output).await,
            Err(failure) => persist_failure(store.as_ref(), &request, failure).await,
        };
        record.finish(outcome);
        drop(ticket);
    });

    Ok(run_id)
}

async fn persist_success(
    store: &dyn OutputStore,
    request: &GenerationRequest,
    output: GenerationOutput,
) -> RunOutcome {
    let files = store
        .save_success(
            output.run_id,
            &request.company_name,
            &output.artifact.pdf,
            &output.document.text,
        )
        .await
        .unwrap_or_else(|e| {
            error!("Failed to save output for run {}: {e:#}", output.run_id);
            SavedFiles::default()
        });

    RunOutcome::Succeeded {
        category: output.category,
        engine: output.artifact.engine,
        compile_attempts: output.artifact.attempts,
        model_attempts: output.model_attempts,
        slots: output.slot_map.entries.into_iter().map(|e| e.slot).collect(),
        usage: output.usage,
        tex: output.document.text,
        compile_log: output.artifact.log,
        files,
    }
}

async fn persist_failure(
    store: &dyn OutputStore,
    request: &GenerationRequest,
    failure: StageFailure,
) -> RunOutcome {
    let mut files = SavedFiles::default();
    let diagnostic = failure.error.diagnostic();
    if let Some(log) = &diagnostic {
        match store
            .save_failure_log(failure.run_id, &request.company_name, log)
            .await
        {
            Ok(saved) => files = saved,
            Err(e) => error!("Failed to save compiler log for run {}: {e:#}", failure.run_id),
        }
    }

    RunOutcome::Failed {
        stage: failure.stage,
        code: failure.error.kind(),
        message: failure.error.to_string(),
        diagnostic,
        files,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
