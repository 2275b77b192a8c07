//! Compilation Driver: compiles a merged document with engine fallback.
//!
//! State machine: Pending -> Running(primary) -> Succeeded | Running(fallback) -> Succeeded | Failed.
//! At most two attempts per document. Each run writes into its own temporary
//! directory named after the run ID, so concurrent runs never share a path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::render::compiler::{DocumentCompiler, Engine};

/// Packages and commands that mark a document as color-rich.
const COLOR_HINTS: &[&str] = &["{xcolor}", "{color}", "{fontspec}", "\\definecolor"];

pub const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnginePlan {
    pub primary: Engine,
    pub fallback: Engine,
}

impl EnginePlan {
    /// XeLaTeX first for color-rich documents, pdfLaTeX first otherwise.
    pub fn for_document(text: &str) -> Self {
        if COLOR_HINTS.iter().any(|h| text.contains(h)) {
            Self {
                primary: Engine::XeLatex,
                fallback: Engine::PdfLatex,
            }
        } else {
            Self {
                primary: Engine::PdfLatex,
                fallback: Engine::XeLatex,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Pending,
    Running(Engine),
    Succeeded(Engine),
    Failed,
}

impl CompileState {
    /// Legal edges: start an engine, fall back to the other one, or finish.
    pub fn can_become(self, next: CompileState) -> bool {
        match (self, next) {
            (CompileState::Pending, CompileState::Running(_)) => true,
            (CompileState::Running(current), CompileState::Running(fallback)) => current != fallback,
            (CompileState::Running(current), CompileState::Succeeded(engine)) => current == engine,
            (CompileState::Running(_), CompileState::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileAttempt {
    pub engine: Engine,
    pub exit_code: Option<i32>,
    pub log: String,
}

/// A compiled PDF with the engine that produced it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub pdf: Bytes,
    pub engine: Engine,
    pub attempts: usize,
    pub log: String,
}

#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("Compilation failed with {} engine attempt(s)", attempts.len())]
    Failed { attempts: Vec<CompileAttempt> },

    #[error("Could not prepare compilation workspace: {0}")]
    Workspace(#[from] std::io::Error),
}

impl CompilationError {
    /// Raw compiler output of every attempt, for the caller to persist or show.
    pub fn log(&self) -> Option<String> {
        match self {
            CompilationError::Failed { attempts } => Some(
                attempts
                    .iter()
                    .map(|a| format!("=== {} (exit {:?}) ===\n{}", a.engine.program(), a.exit_code, a.log))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            CompilationError::Workspace(_) => None,
        }
    }
}

pub struct CompilationDriver {
    compiler: Arc<dyn DocumentCompiler>,
    timeout: Duration,
}

impl CompilationDriver {
    pub fn new(compiler: Arc<dyn DocumentCompiler>, timeout: Duration) -> Self {
        Self { compiler, timeout }
    }

    pub async fn compile(
        &self,
        run_id: Uuid,
        document: &str,
        plan: EnginePlan,
    ) -> Result<Artifact, CompilationError> {
        let workspace = tempfile::Builder::new()
            .prefix(&format!("tailor-{run_id}-"))
            .tempdir()?;
        let source = workspace.path().join(format!("resume-{run_id}.tex"));
        tokio::fs::write(&source, document).await?;

        let mut state = CompileState::Pending;
        let mut attempts = Vec::with_capacity(MAX_ATTEMPTS);

        for engine in [plan.primary, plan.fallback] {
            advance(&mut state, CompileState::Running(engine));
            let output = self.compiler.compile(&source, engine, self.timeout).await;

            if let (true, Some(path)) = (output.succeeded(), output.artifact_path.as_ref()) {
                let pdf = tokio::fs::read(path).await?;
                attempts.push(CompileAttempt {
                    engine,
                    exit_code: output.exit_code,
                    log: String::new(),
                });
                advance(&mut state, CompileState::Succeeded(engine));
                info!(
                    "Compiled run {run_id} with {} ({} bytes, {} attempt(s))",
                    engine.program(),
                    pdf.len(),
                    attempts.len()
                );
                return Ok(Artifact {
                    pdf: Bytes::from(pdf),
                    engine,
                    attempts: attempts.len(),
                    log: output.log,
                });
            }

            warn!(
                "{} failed for run {run_id} (exit {:?})",
                engine.program(),
                output.exit_code
            );
            attempts.push(CompileAttempt {
                engine,
                exit_code: output.exit_code,
                log: output.log,
            });
        }

        advance(&mut state, CompileState::Failed);
        Err(CompilationError::Failed { attempts })
    }
}

fn advance(state: &mut CompileState, to: CompileState) {
    debug_assert!(state.can_become(to), "illegal compilation transition {state:?} -> {to:?}");
    debug!("Compilation state {state:?} -> {to:?}");
    *state = to;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::render::compiler::CompilerOutput;

    /// Compiler stub: engines in `succeeds` write a fake PDF, others fail.
    pub struct StubCompiler {
        pub succeeds: Vec<Engine>,
        pub calls: AtomicUsize,
        pub engines_seen: Mutex<Vec<Engine>>,
    }

    impl StubCompiler {
        pub fn new(succeeds: Vec<Engine>) -> Self {
            Self {
                succeeds,
                calls: AtomicUsize::new(0),
                engines_seen: Mutex::new(vec![]),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentCompiler for StubCompiler {
        async fn compile(&self, source: &Path, engine: Engine, _timeout: Duration) -> CompilerOutput {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.engines_seen.lock().unwrap().push(engine);
            if self.succeeds.contains(&engine) {
                let pdf = source.with_extension("pdf");
                std::fs::write(&pdf, b"%PDF-1.5 stub").unwrap();
                CompilerOutput {
                    exit_code: Some(0),
                    log: "Output written".into(),
                    artifact_path: Some(pdf),
                }
            } else {
                CompilerOutput {
                    exit_code: Some(1),
                    log: format!("! {} error", engine.program()),
                    artifact_path: None,
                }
            }
        }
    }

    fn driver(stub: Arc<StubCompiler>) -> CompilationDriver {
        CompilationDriver::new(stub, Duration::from_secs(5))
    }

    const PLAIN: &str = "\\documentclass{article}\\begin{document}x\\end{document}";
    const COLORFUL: &str = "\\documentclass{article}\\usepackage{xcolor}\\begin{document}x\\end{document}";

    #[test]
    fn test_engine_plan_prefers_xelatex_for_color() {
        assert_eq!(EnginePlan::for_document(COLORFUL).primary, Engine::XeLatex);
        assert_eq!(EnginePlan::for_document(PLAIN).primary, Engine::PdfLatex);
        assert_eq!(
            EnginePlan::for_document("\\usepackage[usenames,dvipsnames]{color}").primary,
            Engine::XeLatex
        );
    }

    #[test]
    fn test_compile_state_edges() {
        use CompileState::*;
        assert!(Pending.can_become(Running(Engine::XeLatex)));
        assert!(Running(Engine::XeLatex).can_become(Running(Engine::PdfLatex)));
        assert!(Running(Engine::PdfLatex).can_become(Succeeded(Engine::PdfLatex)));
        assert!(Running(Engine::PdfLatex).can_become(Failed));

        assert!(!Pending.can_become(Succeeded(Engine::PdfLatex)));
        assert!(!Pending.can_become(Failed));
        assert!(!Running(Engine::XeLatex).can_become(Running(Engine::XeLatex)));
        assert!(!Running(Engine::XeLatex).can_become(Succeeded(Engine::PdfLatex)));
        assert!(!Succeeded(Engine::XeLatex).can_become(Running(Engine::PdfLatex)));
        assert!(!Failed.can_become(Running(Engine::XeLatex)));
    }

    #[test]
    fn test_advance_records_final_state() {
        let mut state = CompileState::Pending;
        advance(&mut state, CompileState::Running(Engine::PdfLatex));
        advance(&mut state, CompileState::Running(Engine::XeLatex));
        advance(&mut state, CompileState::Succeeded(Engine::XeLatex));
        assert_eq!(state, CompileState::Succeeded(Engine::XeLatex));
    }

    #[tokio::test]
    async fn test_primary_success_uses_one_attempt() {
        let stub = Arc::new(StubCompiler::new(vec![Engine::PdfLatex]));
        let artifact = driver(stub.clone())
            .compile(Uuid::new_v4(), PLAIN, EnginePlan::for_document(PLAIN))
            .await
            .unwrap();
        assert_eq!(artifact.engine, Engine::PdfLatex);
        assert_eq!(artifact.attempts, 1);
        assert_eq!(stub.calls(), 1);
        assert!(artifact.pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_fallback_succeeds_in_exactly_two_attempts() {
        let stub = Arc::new(StubCompiler::new(vec![Engine::PdfLatex]));
        let artifact = driver(stub.clone())
            .compile(Uuid::new_v4(), COLORFUL, EnginePlan::for_document(COLORFUL))
            .await
            .unwrap();
        assert_eq!(artifact.engine, Engine::PdfLatex);
        assert_eq!(artifact.attempts, 2);
        assert_eq!(stub.calls(), 2);
        assert_eq!(
            *stub.engines_seen.lock().unwrap(),
            vec![Engine::XeLatex, Engine::PdfLatex]
        );
    }

    #[tokio::test]
    async fn test_both_engines_fail_with_logs() {
        let stub = Arc::new(StubCompiler::new(vec![]));
        let err = driver(stub.clone())
            .compile(Uuid::new_v4(), PLAIN, EnginePlan::for_document(PLAIN))
            .await
            .unwrap_err();
        assert_eq!(stub.calls(), MAX_ATTEMPTS);
        let log = err.log().unwrap();
        assert!(log.contains("! pdflatex error"));
        assert!(log.contains("! xelatex error"));
        match err {
            CompilationError::Failed { attempts } => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_source_file_named_after_run() {
        struct PathRecorder(Mutex<Option<String>>);

        #[async_trait]
        impl DocumentCompiler for PathRecorder {
            async fn compile(&self, source: &Path, _: Engine, _: Duration) -> CompilerOutput {
                *self.0.lock().unwrap() = Some(std::fs::read_to_string(source).unwrap());
                assert!(source.file_name().unwrap().to_string_lossy().starts_with("resume-"));
                CompilerOutput {
                    exit_code: Some(1),
                    log: String::new(),
                    artifact_path: None,
                }
            }
        }

        let recorder = Arc::new(PathRecorder(Mutex::new(None)));
        let driver = CompilationDriver::new(recorder.clone(), Duration::from_secs(1));
        let _ = driver
            .compile(Uuid::new_v4(), PLAIN, EnginePlan::for_document(PLAIN))
            .await;
        assert_eq!(recorder.0.lock().unwrap().as_deref(), Some(PLAIN));
    }
}
