//! Security scanner strategy: `slither <file> --json -`.
//!
//! Slither exits non-zero whenever it reports detector results, so the exit
//! code is ignored and the JSON `success` flag decides.

use std::sync::Arc;

use async_trait::async_trait;
use kbseed_core::{AnalysisFinding, Location, Severity, StrategyKind};
use serde::Deserialize;

use super::{first_line, json_object, AnalysisStrategy, SourceUnit};
use crate::error::ToolError;
use crate::runner::ToolRunner;

pub struct SecurityScannerStrategy {
    runner: Arc<dyn ToolRunner>,
    tool: String,
}

impl SecurityScannerStrategy {
    pub fn new(runner: Arc<dyn ToolRunner>, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScanReport {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: ScanResults,
}

#[derive(Debug, Default, Deserialize)]
struct ScanResults {
    #[serde(default)]
    detectors: Vec<Detector>,
}

#[derive(Debug, Deserialize)]
struct Detector {
    check: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(default)]
    source_mapping: Option<SourceMapping>,
}

#[derive(Debug, Deserialize)]
struct SourceMapping {
    #[serde(default)]
    lines: Vec<usize>,
}

impl Detector {
    fn first_line(&self) -> Option<usize> {
        self.elements
            .iter()
            .filter_map(|e| e.source_mapping.as_ref())
            .find_map(|m| m.lines.first().copied())
    }
}

fn impact_severity(impact: &str) -> Severity {
    match impact.to_ascii_lowercase().as_str() {
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

#[async_trait]
impl AnalysisStrategy for SecurityScannerStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SecurityScanner
    }

    fn is_available(&self) -> bool {
        self.runner.is_present(&self.tool)
    }

    async fn analyze(&self, unit: &SourceUnit) -> Result<Vec<AnalysisFinding>, ToolError> {
        let args = vec![
            unit.path.display().to_string(),
            "--json".to_string(),
            "-".to_string(),
        ];
        let out = self.runner.invoke(&self.tool, &args).await?;

        let value = json_object(&self.tool, &out.stdout).map_err(|err| {
            if out.success() {
                err
            } else {
                ToolError::NonZeroExit {
                    tool: self.tool.clone(),
                    code: out.exit_code,
                    stderr: first_line(&out.stderr),
                }
            }
        })?;
        let report: ScanReport =
            serde_json::from_value(value).map_err(|e| ToolError::unparseable(&self.tool, e.to_string()))?;

        if !report.success {
            let message = report
                .error
                .map(|e| first_line(&e))
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| first_line(&out.stderr));
            return Err(ToolError::NonZeroExit {
                tool: self.tool.clone(),
                code: out.exit_code,
                stderr: message,
            });
        }

        if report.results.detectors.is_empty() {
            return Ok(vec![AnalysisFinding::new(
                unit.identity.clone(),
                StrategyKind::SecurityScanner,
                Severity::Info,
                "no-detector-results",
                format!("{} reported no issues", self.tool),
            )]);
        }

        Ok(report
            .results
            .detectors
            .iter()
            .map(|d| {
                let finding = AnalysisFinding::new(
                    unit.identity.clone(),
                    StrategyKind::SecurityScanner,
                    impact_severity(&d.impact),
                    d.check.clone(),
                    d.description.trim(),
                );
                match d.first_line() {
                    Some(line) => finding.at(Location::line(line)),
                    None => finding,
                }
            })
            .collect())
    }
}
