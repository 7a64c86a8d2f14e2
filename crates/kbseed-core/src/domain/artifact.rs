//! Canonical artifact record produced for every ingested origin.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of origin kinds the classifier can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Html,
    Markdown,
    Pdf,
    GithubRepo,
    GoogleDoc,
    Slite,
    LocalFile,
    /// Origin whose shape matched none of the known kinds.
    Unclassified,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::GithubRepo => "github_repo",
            Self::GoogleDoc => "google_doc",
            Self::Slite => "slite",
            Self::LocalFile => "local_file",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of one ingested origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Ok,
    Skipped,
    Failed,
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Well-known skip/failure reasons.
pub mod reasons {
    pub const AUTH_REQUIRED: &str = "auth_required";
    pub const RESTRICTED: &str = "restricted";
    pub const UNCLASSIFIED: &str = "unclassified";
    pub const FETCH_ERROR: &str = "fetch_error";
}

/// One extracted code fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language tag, when the source declared one.
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn new(language: Option<String>, code: impl Into<String>) -> Self {
        Self {
            language,
            code: code.into(),
        }
    }

    pub fn solidity(code: impl Into<String>) -> Self {
        Self::new(Some("solidity".to_string()), code)
    }
}

/// Normalized record of one ingested origin.
///
/// `source_kind` is fixed at construction; there is no setter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    source_kind: SourceKind,
    pub origin: String,
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub raw_text: String,
    pub code_blocks: Vec<CodeBlock>,
}

impl Artifact {
    /// Successful artifact. Callers go through the normalizer.
    pub(crate) fn ok(
        source_kind: SourceKind,
        origin: impl Into<String>,
        metadata: BTreeMap<String, Value>,
        raw_text: String,
        code_blocks: Vec<CodeBlock>,
    ) -> Self {
        Self {
            source_kind,
            origin: origin.into(),
            status: ArtifactStatus::Ok,
            skip_reason: None,
            failure_reason: None,
            metadata,
            raw_text,
            code_blocks,
        }
    }

    pub fn skipped(
        source_kind: SourceKind,
        origin: impl Into<String>,
        reason: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            source_kind,
            origin: origin.into(),
            status: ArtifactStatus::Skipped,
            skip_reason: Some(reason.into()),
            failure_reason: None,
            metadata,
            raw_text: String::new(),
            code_blocks: Vec::new(),
        }
    }

    pub fn failed(
        source_kind: SourceKind,
        origin: impl Into<String>,
        reason: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            source_kind,
            origin: origin.into(),
            status: ArtifactStatus::Failed,
            skip_reason: None,
            failure_reason: Some(reason.into()),
            metadata,
            raw_text: String::new(),
            code_blocks: Vec::new(),
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn is_ok(&self) -> bool {
        self.status == ArtifactStatus::Ok
    }

    /// The skip or failure reason, whichever applies.
    pub fn reason(&self) -> Option<&str> {
        self.skip_reason
            .as_deref()
            .or(self.failure_reason.as_deref())
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }
}
