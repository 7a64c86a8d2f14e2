//! One end-to-end run: ingest, analyze the cache, aggregate, persist.
//!
//! Fatal errors (run directory, cache, persistence) abort with
//! [`KbseedError`]. Cancellation is not an error: the run stops ingesting,
//! skips analysis and still writes a partial summary and manifest.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use kbseed_core::obs;
use kbseed_core::{
    aggregate, new_run_id, AnalysisFinding, AnalysisSummaryFile, Artifact, Collaborators, FetcherSet,
    FileAnalysis, FsBlobStore, IngestOrchestrator, KbseedError, PipelineConfig, ReqwestHttpClient, Result,
    RunDirectory, RunManifest, RunSummary, SolidityCache, VERSION,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::chain::{AnalysisReport, StrategyChain};
use crate::runner::{ProcessToolRunner, ToolRunner};

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub origins: Vec<String>,
    /// Generated when absent.
    pub run_id: Option<String>,
    /// Defaults to `<artifacts_root>/<run_id>`.
    pub run_dir: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(origins: Vec<String>) -> Self {
        Self {
            origins,
            ..Self::default()
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }
}

/// Result of a finished (or cancelled) run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    /// Completed artifacts in input order.
    pub artifacts: Vec<Artifact>,
    pub findings: Vec<AnalysisFinding>,
    pub files: Vec<FileAnalysis>,
    pub summary: RunSummary,
    pub cancelled: bool,
    pub summary_path: PathBuf,
    pub manifest_path: PathBuf,
}

pub struct RunPipeline {
    config: PipelineConfig,
    cache: Arc<SolidityCache>,
    fetchers: Arc<FetcherSet>,
    chain: StrategyChain,
}

impl RunPipeline {
    /// Production wiring: filesystem cache, reqwest client, child-process tools.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let store = FsBlobStore::new(&config.cache_dir)?;
        let cache = Arc::new(SolidityCache::open(Arc::new(store))?);
        let http = ReqwestHttpClient::from_config(&config).map_err(|e| KbseedError::Config(e.to_string()))?;
        let runner = ProcessToolRunner::new(Duration::from_secs(config.tool_timeout_secs));

        Ok(Self::with_parts(
            config,
            Collaborators::new(Arc::new(http), cache),
            Arc::new(runner),
        ))
    }

    /// Wire explicit collaborators. The cache is taken from `collaborators`.
    pub fn with_parts(config: PipelineConfig, collaborators: Collaborators, runner: Arc<dyn ToolRunner>) -> Self {
        let chain = StrategyChain::standard(runner, &config);
        Self {
            cache: Arc::clone(&collaborators.cache),
            fetchers: Arc::new(FetcherSet::new(&collaborators)),
            chain,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &SolidityCache {
        &self.cache
    }

    pub fn chain(&self) -> &StrategyChain {
        &self.chain
    }

    pub async fn execute(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunOutcome> {
        let run_id = request.run_id.clone().unwrap_or_else(new_run_id);
        let span = obs::run_span(&run_id);
        self.execute_run(run_id, request, cancel).instrument(span).await
    }

    async fn execute_run(&self, run_id: String, request: RunRequest, cancel: &CancellationToken) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let RunRequest { origins, run_dir, .. } = request;

        let run_dir = run_dir.unwrap_or_else(|| self.config.artifacts_root.join(&run_id));
        let dir = RunDirectory::create(&run_dir)?;
        obs::emit_run_started(&run_id, origins.len());

        let token = cancel.child_token();
        let orchestrator = IngestOrchestrator::new(Arc::clone(&self.fetchers), self.config.ingest_concurrency);
        let ingest = orchestrator.run_with(&origins, &token, &dir);
        let report = match self.config.run_timeout_secs {
            Some(secs) => {
                tokio::pin!(ingest);
                tokio::select! {
                    report = &mut ingest => report?,
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        warn!(timeout_secs = secs, "run deadline reached, cancelling");
                        token.cancel();
                        ingest.await?
                    }
                }
            }
            None => ingest.await?,
        };

        let cancelled = report.cancelled;
        let total_inputs = report.total();
        let artifacts = report.into_artifacts();

        let analysis = if cancelled {
            info!("run cancelled, analysis skipped");
            AnalysisReport {
                availability: self.chain.availability(),
                ..AnalysisReport::default()
            }
        } else {
            self.chain.analyze_cache(&self.cache).await
        };

        let summary = aggregate(&run_id, &artifacts, &analysis.findings);
        let summary_path = dir.write_analysis_summary(&AnalysisSummaryFile {
            run_id: run_id.clone(),
            generated_at: Utc::now(),
            cancelled,
            total_inputs,
            summary: summary.clone(),
            tool_availability: analysis.availability.clone(),
            files: analysis.files.clone(),
            findings: analysis.findings.clone(),
        })?;
        let manifest_path = dir.write_manifest(&RunManifest {
            run_id: run_id.clone(),
            version: VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
            origins,
            completed_inputs: artifacts.len(),
            solidity_files: analysis.files.len(),
            analysis_summary_path: summary_path.clone(),
            cancelled,
        })?;

        if cancelled {
            obs::emit_run_cancelled(&run_id, artifacts.len(), total_inputs);
        } else {
            obs::emit_run_finished(
                &run_id,
                clock.elapsed().as_millis() as u64,
                artifacts.len(),
                analysis.findings.len(),
            );
        }

        Ok(RunOutcome {
            run_id,
            run_dir,
            artifacts,
            findings: analysis.findings,
            files: analysis.files,
            summary,
            cancelled,
            summary_path,
            manifest_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedToolRunner;
    use kbseed_core::fakes::{MemoryBlobStore, StaticHttpClient};

    fn pipeline(root: &std::path::Path, http: StaticHttpClient) -> RunPipeline {
        let config = PipelineConfig {
            artifacts_root: root.to_path_buf(),
            ..PipelineConfig::default()
        };
        let cache = Arc::new(SolidityCache::open(Arc::new(MemoryBlobStore::new())).unwrap());
        RunPipeline::with_parts(
            config,
            Collaborators::new(Arc::new(http), cache),
            Arc::new(ScriptedToolRunner::new()),
        )
    }

    #[tokio::test]
    async fn run_dir_defaults_under_artifacts_root() {
        let tmp = tempfile::tempdir().unwrap();
        let http = StaticHttpClient::new().with_html("https://docs.test/a", "<title>A</title><p>hello</p>");
        let outcome = pipeline(tmp.path(), http)
            .execute(
                RunRequest::new(vec!["https://docs.test/a".into()]).with_run_id("r1"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.run_id, "r1");
        assert_eq!(outcome.run_dir, tmp.path().join("r1"));
        assert!(outcome.run_dir.join("ingest/0001.json").exists());
        assert!(outcome.manifest_path.exists());
        assert!(!outcome.cancelled);
        assert_eq!(outcome.summary.artifacts.ok, 1);
    }

    #[tokio::test]
    async fn explicit_run_dir_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("custom");
        let outcome = pipeline(tmp.path(), StaticHttpClient::new())
            .execute(RunRequest::new(Vec::new()).with_run_dir(&target), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.run_dir, target);
        assert!(target.join("analysis/analysis_summary.json").exists());
        assert!(outcome.artifacts.is_empty());
    }

    #[tokio::test]
    async fn unwritable_run_directory_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = pipeline(tmp.path(), StaticHttpClient::new())
            .execute(
                RunRequest::new(vec!["https://docs.test/a".into()]).with_run_dir(blocker.join("run")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KbseedError::RunDirectory { .. }));
    }

    #[test]
    fn zero_concurrency_config_is_rejected() {
        let config = PipelineConfig {
            ingest_concurrency: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(RunPipeline::from_config(config), Err(KbseedError::Config(_))));
    }
}
