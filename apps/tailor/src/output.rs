//! Output Store: persists what a run produced into `OUTPUT_DIR`.
//!
//! File stem: `optimized_resume_<company>_<YYYYmmdd_HHMM>_<run8>`, where
//! `<run8>` is the first eight characters of the run ID.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Paths written for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SavedFiles {
    pub pdf: Option<PathBuf>,
    pub tex: Option<PathBuf>,
    pub log: Option<PathBuf>,
}

#[async_trait]
pub trait OutputStore: Send + Sync {
    async fn save_success(
        &self,
        run_id: Uuid,
        company_name: &str,
        pdf: &[u8],
        tex: &str,
    ) -> Result<SavedFiles>;

    async fn save_failure_log(&self, run_id: Uuid, company_name: &str, log: &str) -> Result<SavedFiles>;
}

pub struct DirOutputStore {
    root: PathBuf,
}

impl DirOutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn prepare(&self, run_id: Uuid, company_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.root.display()))?;
        Ok(self.root.join(file_stem(company_name, run_id, Utc::now())))
    }
}

#[async_trait]
impl OutputStore for DirOutputStore {
    async fn save_success(
        &self,
        run_id: Uuid,
        company_name: &str,
        pdf: &[u8],
        tex: &str,
    ) -> Result<SavedFiles> {
        let stem = self.prepare(run_id, company_name).await?;
        let pdf_path = stem.with_extension("pdf");
        let tex_path = stem.with_extension("tex");

        tokio::fs::write(&pdf_path, pdf)
            .await
            .with_context(|| format!("Failed to write {}", pdf_path.display()))?;
        tokio::fs::write(&tex_path, tex)
            .await
            .with_context(|| format!("Failed to write {}", tex_path.display()))?;

        info!("Saved {} ({} bytes)", pdf_path.display(), pdf.len());
        Ok(SavedFiles {
            pdf: Some(pdf_path),
            tex: Some(tex_path),
            log: None,
        })
    }

    async fn save_failure_log(&self, run_id: Uuid, company_name: &str, log: &str) -> Result<SavedFiles> {
        let log_path = self.prepare(run_id, company_name).await?.with_extension("log");
        tokio::fs::write(&log_path, log)
            .await
            .with_context(|| format!("Failed to write {}", log_path.display()))?;

        info!("Saved compiler log to {}", log_path.display());
        Ok(SavedFiles {
            log: Some(log_path),
            ..SavedFiles::default()
        })
    }
}

pub fn file_stem(company_name: &str, run_id: Uuid, at: DateTime<Utc>) -> String {
    let run = run_id.simple().to_string();
    format!(
        "optimized_resume_{}_{}_{}",
        sanitize_company(company_name),
        at.format("%Y%m%d_%H%M"),
        &run[..8]
    )
}

/// Keeps `[A-Za-z0-9_-]`, maps spaces to `_`, drops everything else.
pub fn sanitize_company(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            ' ' => Some('_'),
            _ => None,
        })
        .collect();

    if cleaned.is_empty() {
        "company".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_sanitize_company() {
        assert_eq!(sanitize_company("Acme Corp."), "Acme_Corp");
        assert_eq!(sanitize_company("../../etc"), "etc");
        assert_eq!(sanitize_company("  "), "company");
        assert_eq!(sanitize_company("Jane-Street_LLC"), "Jane-Street_LLC");
    }

    #[test]
    fn test_file_stem_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let run_id = Uuid::parse_str("1234abcd-0000-4000-8000-000000000000").unwrap();
        assert_eq!(
            file_stem("Acme", run_id, at),
            "optimized_resume_Acme_20240309_1405_1234abcd"
        );
    }

    #[tokio::test]
    async fn test_save_success_writes_pdf_and_tex() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirOutputStore::new(dir.path().join("out"));

        let saved = store
            .save_success(Uuid::new_v4(), "Acme", b"%PDF-1.5", "\\documentclass{article}")
            .await
            .unwrap();

        let pdf = saved.pdf.unwrap();
        assert_eq!(std::fs::read(&pdf).unwrap(), b"%PDF-1.5");
        assert_eq!(
            std::fs::read_to_string(saved.tex.unwrap()).unwrap(),
            "\\documentclass{article}"
        );
        assert!(pdf.file_name().unwrap().to_string_lossy().starts_with("optimized_resume_Acme_"));
        assert!(saved.log.is_none());
    }

    #[tokio::test]
    async fn test_same_minute_runs_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirOutputStore::new(dir.path());
        let a = store.save_success(Uuid::new_v4(), "Acme", b"a", "a").await.unwrap();
        let b = store.save_success(Uuid::new_v4(), "Acme", b"b", "b").await.unwrap();
        assert_ne!(a.pdf, b.pdf);
    }

    #[tokio::test]
    async fn test_failure_log_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirOutputStore::new(dir.path());
        let saved = store
            .save_failure_log(Uuid::new_v4(), "Acme", "! Undefined control sequence")
            .await
            .unwrap();
        assert!(saved.pdf.is_none());
        let log = saved.log.unwrap();
        assert_eq!(log.extension().unwrap(), "log");
        assert!(std::fs::read_to_string(log).unwrap().contains("Undefined control"));
    }
}
