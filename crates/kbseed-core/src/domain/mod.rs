//! Core data model: artifacts, findings, identities and errors.

pub mod artifact;
pub mod error;
pub mod finding;
pub mod identity;

pub use artifact::{reasons, Artifact, ArtifactStatus, CodeBlock, SourceKind};
pub use error::{FetchError, KbseedError, Result};
pub use finding::{AnalysisFinding, FileAnalysis, Location, Severity, StrategyKind};
pub use identity::RepoIdentity;
