//! Run aggregation: tallies over artifacts and findings.
//!
//! Pure and order-independent. Any permutation of the inputs yields an
//! equal [`RunSummary`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisFinding, Artifact, ArtifactStatus, Severity, SourceKind, StrategyKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.ok + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.info + self.low + self.medium + self.high
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCounts {
    pub compiler_ast: usize,
    pub security_scanner: usize,
    pub regex_fallback: usize,
}

/// An origin that did not end `ok`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonOkOrigin {
    pub origin: String,
    pub source_kind: SourceKind,
    pub status: String,
    pub reason: String,
}

/// Aggregate over one run. Written once at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub artifacts: StatusCounts,
    pub findings_by_severity: SeverityCounts,
    pub findings_by_strategy: StrategyCounts,
    /// Distinct files that carry at least one finding.
    pub analyzed_files: usize,
    /// Skipped and failed origins, sorted by origin.
    pub not_ok: Vec<NonOkOrigin>,
}

pub fn aggregate(run_id: &str, artifacts: &[Artifact], findings: &[AnalysisFinding]) -> RunSummary {
    let mut status = StatusCounts::default();
    let mut not_ok = Vec::new();
    for a in artifacts {
        match a.status {
            ArtifactStatus::Ok => status.ok += 1,
            ArtifactStatus::Skipped => status.skipped += 1,
            ArtifactStatus::Failed => status.failed += 1,
        }
        if !a.is_ok() {
            not_ok.push(NonOkOrigin {
                origin: a.origin.clone(),
                source_kind: a.source_kind(),
                status: a.status.to_string(),
                reason: a.reason().unwrap_or_default().to_string(),
            });
        }
    }
    not_ok.sort();

    let mut severity = SeverityCounts::default();
    let mut strategy = StrategyCounts::default();
    let mut files = BTreeSet::new();
    for f in findings {
        match f.severity {
            Severity::Info => severity.info += 1,
            Severity::Low => severity.low += 1,
            Severity::Medium => severity.medium += 1,
            Severity::High => severity.high += 1,
        }
        match f.strategy_used {
            StrategyKind::CompilerAst => strategy.compiler_ast += 1,
            StrategyKind::SecurityScanner => strategy.security_scanner += 1,
            StrategyKind::RegexFallback => strategy.regex_fallback += 1,
        }
        files.insert(&f.file_ref);
    }

    RunSummary {
        run_id: run_id.to_string(),
        artifacts: status,
        findings_by_severity: severity,
        findings_by_strategy: strategy,
        analyzed_files: files.len(),
        not_ok,
    }
}
