//! kbseed core library
//!
//! Ingests heterogeneous documents (web pages, Markdown, PDFs, GitHub
//! repositories, Google Docs, Slite pages, local files) into a uniform
//! [`Artifact`] record, caching every Solidity source it meets.
//!
//! Flow: [`classify`] picks a [`SourceKind`], the matching fetcher in
//! [`FetcherSet`] retrieves raw content, [`normalize`](normalize::normalize)
//! turns it into an artifact, and [`IngestOrchestrator`] runs the batch with
//! bounded parallelism. [`aggregate`](aggregate::aggregate) and
//! [`RunDirectory`] produce the run outputs.

pub mod aggregate;
pub mod cache;
pub mod classify;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod fetch;
pub mod ingest;
pub mod normalize;
pub mod obs;
pub mod reporting;
pub mod telemetry;

/// Crate version, used in the default user agent and the run manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use aggregate::{aggregate, RunSummary, SeverityCounts, StatusCounts, StrategyCounts};
pub use cache::{BlobStore, CacheError, Digest, FsBlobStore, SolidityCache, SolidityCacheEntry};
pub use classify::{classify, GithubTarget};
pub use config::PipelineConfig;
pub use domain::{
    reasons, AnalysisFinding, Artifact, ArtifactStatus, CodeBlock, FetchError, FileAnalysis,
    KbseedError, Location, RepoIdentity, Result, Severity, SourceKind, StrategyKind,
};
pub use fetch::{Collaborators, FetchOutcome, Fetcher, FetcherSet, HttpClient, ReqwestHttpClient};
pub use ingest::{ArtifactSink, DiscardSink, IngestOrchestrator, IngestReport};
pub use reporting::{new_run_id, AnalysisSummaryFile, RunDirectory, RunManifest};
pub use telemetry::init_tracing;
