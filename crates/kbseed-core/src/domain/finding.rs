//! Analysis findings surfaced about cached Solidity files.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::identity::RepoIdentity;

/// Which analysis strategy produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CompilerAst,
    SecurityScanner,
    RegexFallback,
}

impl StrategyKind {
    /// Fixed priority order, most precise first.
    pub const PRIORITY: [StrategyKind; 3] = [
        StrategyKind::CompilerAst,
        StrategyKind::SecurityScanner,
        StrategyKind::RegexFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompilerAst => "compiler_ast",
            Self::SecurityScanner => "security_scanner",
            Self::RegexFallback => "regex_fallback",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl Severity {
    /// Clamp to at most `ceiling`.
    pub fn capped_at(self, ceiling: Severity) -> Severity {
        self.min(ceiling)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// 1-based line/column hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Location {
    pub fn line(line: usize) -> Self {
        Self { line, column: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFinding {
    pub file_ref: RepoIdentity,
    pub strategy_used: StrategyKind,
    pub severity: Severity,
    /// Short machine-readable rule id, e.g. `low-level-call`.
    pub rule: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl AnalysisFinding {
    pub fn new(
        file_ref: RepoIdentity,
        strategy_used: StrategyKind,
        severity: Severity,
        rule: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            file_ref,
            strategy_used,
            severity,
            rule: rule.into(),
            description: description.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// How one cached file was analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_ref: RepoIdentity,
    /// Strategy whose findings were kept for this file.
    pub strategy_used: StrategyKind,
    /// Strategies that errored on this file first, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fell_back_from: Vec<StrategyKind>,
    pub findings: usize,
}
