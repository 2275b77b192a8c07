//! Document Compiler: runs one LaTeX engine over one source file.
//!
//! Every outcome is a `CompilerOutput`: a missing binary, a timeout, and a
//! LaTeX error all come back as a failed run with a log, never as a panic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Engine {
    XeLatex,
    PdfLatex,
}

impl Engine {
    pub fn program(&self) -> &'static str {
        match self {
            Engine::XeLatex => "xelatex",
            Engine::PdfLatex => "pdflatex",
        }
    }
}

/// Result of a single compiler invocation.
#[derive(Debug, Clone)]
pub struct CompilerOutput {
    /// `None` when the process never ran to completion (spawn failure, timeout, signal).
    pub exit_code: Option<i32>,
    pub log: String,
    pub artifact_path: Option<PathBuf>,
}

impl CompilerOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.artifact_path.is_some()
    }
}

#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, source: &Path, engine: Engine, timeout: Duration) -> CompilerOutput;
}

/// Runs `xelatex` / `pdflatex` from `PATH` in the source file's directory.
pub struct LatexCompiler;

#[async_trait]
impl DocumentCompiler for LatexCompiler {
    async fn compile(&self, source: &Path, engine: Engine, timeout: Duration) -> CompilerOutput {
        let workdir = source.parent().unwrap_or_else(|| Path::new("."));
        let mut command = Command::new(engine.program());
        command
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(format!("-output-directory={}", workdir.display()))
            .arg(source)
            .current_dir(workdir)
            .kill_on_drop(true);

        debug!("Running {} on {}", engine.program(), source.display());

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => {
                warn!("{} timed out after {}s", engine.program(), timeout.as_secs());
                return CompilerOutput {
                    exit_code: None,
                    log: format!("{} timed out after {}s", engine.program(), timeout.as_secs()),
                    artifact_path: None,
                };
            }
            Ok(Err(e)) => {
                warn!("Failed to launch {}: {e}", engine.program());
                return CompilerOutput {
                    exit_code: None,
                    log: format!("failed to launch {}: {e}", engine.program()),
                    artifact_path: None,
                };
            }
            Ok(Ok(output)) => output,
        };

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log.push_str("\n--- stderr ---\n");
            log.push_str(&stderr);
        }

        let pdf = source.with_extension("pdf");
        let artifact_path = (output.status.success() && pdf.exists()).then_some(pdf);

        CompilerOutput {
            exit_code: output.status.code(),
            log,
            artifact_path,
        }
    }
}
