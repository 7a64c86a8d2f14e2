//! Analysis strategies, most precise first.
//!
//! Each strategy reports whether it can run at all ([`AnalysisStrategy::is_available`])
//! and analyzes one file at a time. A per-file error sends that file to the
//! next strategy in the chain.

pub mod compiler_ast;
pub mod regex_fallback;
pub mod security_scanner;

use std::path::PathBuf;

use async_trait::async_trait;
use kbseed_core::{AnalysisFinding, RepoIdentity, StrategyKind};

use crate::error::ToolError;

pub use compiler_ast::CompilerAstStrategy;
pub use regex_fallback::RegexFallbackStrategy;
pub use security_scanner::SecurityScannerStrategy;

/// One cached Solidity file handed to a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub identity: RepoIdentity,
    /// On-disk location, passed to external tools.
    pub path: PathBuf,
    pub text: String,
}

impl SourceUnit {
    pub fn new(identity: RepoIdentity, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            identity,
            path: path.into(),
            text: text.into(),
        }
    }

    /// 1-based line of a byte offset into `text`.
    pub fn line_of(&self, offset: usize) -> usize {
        let end = offset.min(self.text.len());
        self.text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }
}

/// The JSON object embedded in tool output: first `{` through last `}`.
pub(crate) fn json_object(tool: &str, stdout: &str) -> Result<serde_json::Value, ToolError> {
    let (Some(start), Some(end)) = (stdout.find('{'), stdout.rfind('}')) else {
        return Err(ToolError::unparseable(tool, "no JSON object in output"));
    };
    if end < start {
        return Err(ToolError::unparseable(tool, "no JSON object in output"));
    }
    serde_json::from_str(&stdout[start..=end]).map_err(|e| ToolError::unparseable(tool, e.to_string()))
}

/// First non-empty line of tool stderr, for error messages.
pub(crate) fn first_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
pub trait AnalysisStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether the strategy's tool is present. Checked once per run.
    fn is_available(&self) -> bool;

    async fn analyze(&self, unit: &SourceUnit) -> Result<Vec<AnalysisFinding>, ToolError>;
}
