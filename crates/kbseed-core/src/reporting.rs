//! Per-run output directory and report rendering.
//!
//! Layout under `<artifacts_root>/<run_id>/`:
//!
//! ```text
//! ingest/0001.json          one artifact per completed input
//! ingest/0001.txt           raw-text snapshot, only when non-empty
//! analysis/analysis_summary.json
//! run_manifest.json
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::RunSummary;
use crate::cache::{BlobStore, CacheError, FsBlobStore};
use crate::domain::{AnalysisFinding, Artifact, FileAnalysis, KbseedError, Result, StrategyKind};
use crate::ingest::ArtifactSink;

pub const ANALYSIS_SUMMARY_FILE: &str = "analysis/analysis_summary.json";
pub const MANIFEST_FILE: &str = "run_manifest.json";

/// `YYYYMMDDTHHMMSSZ-<8 hex>`, sortable by start time.
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"), &suffix[..8])
}

/// Contents of `analysis/analysis_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummaryFile {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub cancelled: bool,
    /// Inputs submitted, completed or not.
    pub total_inputs: usize,
    pub summary: RunSummary,
    /// Tool availability as checked once at the start of analysis.
    pub tool_availability: BTreeMap<StrategyKind, bool>,
    pub files: Vec<FileAnalysis>,
    pub findings: Vec<AnalysisFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub origins: Vec<String>,
    pub completed_inputs: usize,
    pub solidity_files: usize,
    pub analysis_summary_path: PathBuf,
    pub cancelled: bool,
}

/// A run's output directory. Creating it is the first fatal checkpoint.
pub struct RunDirectory {
    root: PathBuf,
    store: FsBlobStore,
}

impl RunDirectory {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["ingest", "analysis"] {
            std::fs::create_dir_all(root.join(sub)).map_err(|source| KbseedError::RunDirectory {
                path: root.clone(),
                source,
            })?;
        }
        let store = FsBlobStore::new(&root).map_err(|e| KbseedError::RunDirectory {
            path: root.clone(),
            source: into_io(e),
        })?;
        Ok(Self { root, store })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_json_path(index: usize) -> String {
        format!("ingest/{:04}.json", index + 1)
    }

    pub fn artifact_text_path(index: usize) -> String {
        format!("ingest/{:04}.txt", index + 1)
    }

    pub fn write_artifact(&self, index: usize, artifact: &Artifact) -> Result<()> {
        let json = serde_json::to_vec_pretty(artifact)?;
        self.write(&Self::artifact_json_path(index), &json)?;
        if !artifact.raw_text.is_empty() {
            self.write(&Self::artifact_text_path(index), artifact.raw_text.as_bytes())?;
        }
        Ok(())
    }

    pub fn write_analysis_summary(&self, summary: &AnalysisSummaryFile) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(summary)?;
        self.write(ANALYSIS_SUMMARY_FILE, &json)?;
        Ok(self.root.join(ANALYSIS_SUMMARY_FILE))
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> Result<PathBuf> {
        let json = serde_json::to_vec_pretty(manifest)?;
        self.write(MANIFEST_FILE, &json)?;
        Ok(self.root.join(MANIFEST_FILE))
    }

    fn write(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.store
            .write(Path::new(rel), bytes)
            .map_err(|e| KbseedError::Persist {
                what: rel.to_string(),
                source: into_io(e),
            })
    }
}

impl ArtifactSink for RunDirectory {
    fn record(&self, index: usize, artifact: &Artifact) -> Result<()> {
        self.write_artifact(index, artifact)
    }
}

fn into_io(err: CacheError) -> io::Error {
    match err {
        CacheError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// Plain-text summary table for terminal output.
pub fn render_summary_table(summary: &RunSummary, cancelled: bool) -> String {
    let a = &summary.artifacts;
    let s = &summary.findings_by_severity;
    let k = &summary.findings_by_strategy;

    let mut out = String::new();
    out.push_str(&format!("Run {}{}\n\n", summary.run_id, if cancelled { " (cancelled)" } else { "" }));
    out.push_str(&format!("{:<22} {:>6}\n", "artifacts ok", a.ok));
    out.push_str(&format!("{:<22} {:>6}\n", "artifacts skipped", a.skipped));
    out.push_str(&format!("{:<22} {:>6}\n", "artifacts failed", a.failed));
    out.push_str(&format!("{:<22} {:>6}\n", "files analyzed", summary.analyzed_files));
    out.push('\n');
    out.push_str(&format!(
        "{:<22} {:>6} {:>6} {:>6} {:>6}\n",
        "findings", "info", "low", "medium", "high"
    ));
    out.push_str(&format!(
        "{:<22} {:>6} {:>6} {:>6} {:>6}\n",
        "", s.info, s.low, s.medium, s.high
    ));
    out.push_str(&format!(
        "{:<22} {:>6}\n{:<22} {:>6}\n{:<22} {:>6}\n",
        "  compiler_ast", k.compiler_ast, "  security_scanner", k.security_scanner, "  regex_fallback", k.regex_fallback
    ));

    if !summary.not_ok.is_empty() {
        out.push_str("\nNot ingested:\n");
        for n in &summary.not_ok {
            out.push_str(&format!("  [{}] {} ({})\n", n.status, n.origin, n.reason));
        }
    }
    out
}
