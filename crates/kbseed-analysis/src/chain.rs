//! Ordered strategy chain over the Solidity cache.
//!
//! Availability is probed once per run. The first available strategy is the
//! run's primary; a per-file error hands that file to the next available
//! strategy. The regex fallback closes every chain, so each file ends up
//! with findings from exactly one strategy.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use kbseed_core::obs;
use kbseed_core::{AnalysisFinding, FileAnalysis, PipelineConfig, SolidityCache, StrategyKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::ToolRunner;
use crate::strategies::{
    AnalysisStrategy, CompilerAstStrategy, RegexFallbackStrategy, SecurityScannerStrategy, SourceUnit,
};

/// Output of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Findings grouped by file, files in input order.
    pub findings: Vec<AnalysisFinding>,
    pub files: Vec<FileAnalysis>,
    pub availability: BTreeMap<StrategyKind, bool>,
}

pub struct StrategyChain {
    strategies: Vec<Arc<dyn AnalysisStrategy>>,
    max_concurrency: usize,
}

impl StrategyChain {
    /// Chain over `strategies` in the given order. A regex fallback is
    /// appended when none is present.
    pub fn new(mut strategies: Vec<Arc<dyn AnalysisStrategy>>, max_concurrency: usize) -> Self {
        if !strategies
            .iter()
            .any(|s| s.kind() == StrategyKind::RegexFallback)
        {
            strategies.push(Arc::new(RegexFallbackStrategy::new()));
        }
        Self {
            strategies,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// compiler_ast, then security_scanner, then regex_fallback.
    pub fn standard(runner: Arc<dyn ToolRunner>, config: &PipelineConfig) -> Self {
        Self::new(
            vec![
                Arc::new(CompilerAstStrategy::new(Arc::clone(&runner), &config.compiler_tool)),
                Arc::new(SecurityScannerStrategy::new(runner, &config.scanner_tool)),
                Arc::new(RegexFallbackStrategy::new()),
            ],
            config.analysis_concurrency,
        )
    }

    pub fn availability(&self) -> BTreeMap<StrategyKind, bool> {
        self.strategies
            .iter()
            .map(|s| (s.kind(), s.is_available()))
            .collect()
    }

    /// Analyze every file. Output order follows `units`.
    pub async fn analyze(&self, units: Vec<SourceUnit>) -> AnalysisReport {
        let start = Instant::now();

        let mut availability = BTreeMap::new();
        let mut active: Vec<Arc<dyn AnalysisStrategy>> = Vec::new();
        for strategy in &self.strategies {
            let available = strategy.is_available();
            availability.insert(strategy.kind(), available);
            if available {
                active.push(Arc::clone(strategy));
            } else {
                info!(strategy = %strategy.kind(), "analysis tool not present, skipped for this run");
            }
        }
        let primary = active
            .first()
            .map(|s| s.kind())
            .unwrap_or(StrategyKind::RegexFallback);
        obs::emit_strategy_selected(primary, units.len());

        let per_file: Vec<(FileAnalysis, Vec<AnalysisFinding>)> = stream::iter(units.iter())
            .map(|unit| analyze_file(&active, unit))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut report = AnalysisReport {
            availability,
            ..AnalysisReport::default()
        };
        for (file, findings) in per_file {
            report.files.push(file);
            report.findings.extend(findings);
        }

        obs::emit_analysis_finished(
            report.files.len(),
            report.findings.len(),
            start.elapsed().as_millis() as u64,
        );
        report
    }

    /// Analyze the cache's current contents. Unreadable entries are skipped.
    pub async fn analyze_cache(&self, cache: &SolidityCache) -> AnalysisReport {
        let mut units = Vec::new();
        for entry in cache.list() {
            match cache.read_text(&entry) {
                Ok(text) => units.push(SourceUnit::new(entry.repo_identity, entry.local_path, text)),
                Err(err) => {
                    warn!(file = %entry.repo_identity, error = %err, "cached source unreadable, not analyzed");
                }
            }
        }
        self.analyze(units).await
    }
}

async fn analyze_file(
    active: &[Arc<dyn AnalysisStrategy>],
    unit: &SourceUnit,
) -> (FileAnalysis, Vec<AnalysisFinding>) {
    let file = unit.identity.to_string();
    let mut fell_back_from = Vec::new();

    for (i, strategy) in active.iter().enumerate() {
        match strategy.analyze(unit).await {
            Ok(findings) => {
                debug!(file = %file, strategy = %strategy.kind(), findings = findings.len(), "file analyzed");
                return (
                    FileAnalysis {
                        file_ref: unit.identity.clone(),
                        strategy_used: strategy.kind(),
                        fell_back_from,
                        findings: findings.len(),
                    },
                    findings,
                );
            }
            Err(err) => {
                let next = active
                    .get(i + 1)
                    .map(|s| s.kind())
                    .unwrap_or(StrategyKind::RegexFallback);
                obs::emit_file_fallback(&file, strategy.kind(), next, &err);
                fell_back_from.push(strategy.kind());
            }
        }
    }

    // Only reachable when a custom chain ends in a failing strategy.
    let findings = RegexFallbackStrategy::new().scan(unit);
    (
        FileAnalysis {
            file_ref: unit.identity.clone(),
            strategy_used: StrategyKind::RegexFallback,
            fell_back_from,
            findings: findings.len(),
        },
        findings,
    )
}
