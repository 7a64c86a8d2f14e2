//! Structured lifecycle events for kbseed runs.
//!
//! Every event carries an `event` field (`run.started`, `ingest.completed`,
//! ...) so JSON log consumers can filter on it. Use [`run_span`] to tag
//! async work with the run id, or [`RunSpan`] in synchronous code.

use tracing::{info, warn};

use crate::domain::{ArtifactStatus, SourceKind, StrategyKind};

/// Span tagging everything inside a run with `run_id`.
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("kbseed.run", run_id = %run_id)
}

/// RAII guard that enters [`run_span`] until dropped.
///
/// ```ignore
/// let _span = RunSpan::enter("20260101T000000Z-deadbeef");
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str) -> Self {
        Self {
            _span: run_span(run_id).entered(),
        }
    }
}

pub fn emit_run_started(run_id: &str, inputs: usize) {
    info!(event = "run.started", run_id = %run_id, inputs = inputs);
}

/// One input reached a terminal state.
pub fn emit_ingest_completed(index: usize, origin: &str, kind: SourceKind, status: ArtifactStatus) {
    info!(
        event = "ingest.completed",
        index = index,
        origin = %origin,
        kind = %kind,
        status = %status,
    );
}

pub fn emit_ingest_finished(total: usize, completed: usize, cancelled: bool) {
    info!(
        event = "ingest.finished",
        total = total,
        completed = completed,
        cancelled = cancelled,
    );
}

pub fn emit_strategy_selected(strategy: StrategyKind, files: usize) {
    info!(event = "analysis.strategy_selected", strategy = %strategy, files = files);
}

/// A strategy failed on one file and the next one takes over.
pub fn emit_file_fallback(file: &str, from: StrategyKind, to: StrategyKind, error: &dyn std::fmt::Display) {
    warn!(
        event = "analysis.file_fallback",
        file = %file,
        from = %from,
        to = %to,
        error = %error,
    );
}

pub fn emit_analysis_finished(files: usize, findings: usize, duration_ms: u64) {
    info!(
        event = "analysis.finished",
        files = files,
        findings = findings,
        duration_ms = duration_ms,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, artifacts: usize, findings: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        artifacts = artifacts,
        findings = findings,
    );
}

pub fn emit_run_cancelled(run_id: &str, completed: usize, total: usize) {
    warn!(
        event = "run.cancelled",
        run_id = %run_id,
        completed = completed,
        total = total,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_span_enter_and_emit() {
        let _span = RunSpan::enter("20260101T000000Z-00000000");
        emit_run_started("20260101T000000Z-00000000", 3);
        emit_ingest_completed(0, "https://x.test", SourceKind::Html, ArtifactStatus::Ok);
        emit_file_fallback("o/r:A.sol", StrategyKind::CompilerAst, StrategyKind::RegexFallback, &"exit 1");
    }
}
