//! Ingestion orchestrator.
//!
//! Drives classify → fetch → normalize for a batch of origins with bounded
//! parallelism. Each input carries its index so results can be reassembled
//! in input order. One input's failure, or panic, never affects another.
//!
//! Per input: `pending → classified → fetched → normalized`, with early exits
//! to `skipped` or `failed` at the classify or fetch stage.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::domain::{reasons, Artifact, Result, SourceKind};
use crate::fetch::{FetchOutcome, FetcherSet, Metadata};
use crate::normalize;
use crate::obs;

/// Receives each artifact the moment its input completes.
///
/// An error here is fatal for the run.
pub trait ArtifactSink: Send + Sync {
    fn record(&self, index: usize, artifact: &Artifact) -> Result<()>;
}

/// Sink that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ArtifactSink for DiscardSink {
    fn record(&self, _index: usize, _artifact: &Artifact) -> Result<()> {
        Ok(())
    }
}

/// What an ingestion pass produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    slots: Vec<Option<Artifact>>,
    pub cancelled: bool,
}

impl IngestReport {
    /// Number of inputs submitted.
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn completed(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Completed artifacts in input order, with their input index.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &Artifact)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|a| (i, a)))
    }

    /// Completed artifacts in input order.
    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.slots.into_iter().flatten().collect()
    }
}

pub struct IngestOrchestrator {
    fetchers: Arc<FetcherSet>,
    max_concurrency: usize,
}

impl IngestOrchestrator {
    pub fn new(fetchers: Arc<FetcherSet>, max_concurrency: usize) -> Self {
        Self {
            fetchers,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Ingest every origin. One artifact per input, in input order.
    pub async fn run(&self, origins: &[String]) -> Vec<Artifact> {
        match self
            .run_with(origins, &CancellationToken::new(), &DiscardSink)
            .await
        {
            Ok(report) => report.into_artifacts(),
            // DiscardSink never fails.
            Err(_) => Vec::new(),
        }
    }

    /// Ingest with cancellation and a per-completion sink.
    ///
    /// On cancellation in-flight fetches are dropped and the report holds
    /// only what completed before it.
    pub async fn run_with(
        &self,
        origins: &[String],
        cancel: &CancellationToken,
        sink: &dyn ArtifactSink,
    ) -> Result<IngestReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut pending: FuturesUnordered<_> = origins
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, origin)| {
                let semaphore = Arc::clone(&semaphore);
                let fetchers = Arc::clone(&self.fetchers);
                async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let artifact = ingest_one(&fetchers, &origin).await;
                    (index, artifact)
                }
            })
            .collect();

        let mut slots: Vec<Option<Artifact>> = vec![None; origins.len()];
        let mut cancelled = cancel.is_cancelled();

        while !cancelled {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                }
                next = pending.next() => match next {
                    Some((index, artifact)) => {
                        obs::emit_ingest_completed(index, &artifact.origin, artifact.source_kind(), artifact.status);
                        sink.record(index, &artifact)?;
                        slots[index] = Some(artifact);
                    }
                    None => break,
                },
            }
        }

        let report = IngestReport { slots, cancelled };
        obs::emit_ingest_finished(report.total(), report.completed(), cancelled);
        Ok(report)
    }
}

/// Classify, fetch and normalize one origin. Always yields an artifact.
pub async fn ingest_one(fetchers: &FetcherSet, origin: &str) -> Artifact {
    let kind = classify(origin);
    debug!(origin = %origin, kind = %kind, "classified");

    let Some(fetcher) = fetchers.for_kind(kind) else {
        warn!(origin = %origin, "origin could not be classified");
        let mut metadata = Metadata::new();
        metadata.insert("stage".into(), Value::from("classify"));
        return Artifact::failed(SourceKind::Unclassified, origin, reasons::UNCLASSIFIED, metadata);
    };

    let outcome = AssertUnwindSafe(fetcher.fetch(origin))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(origin = %origin, panic = %message, "fetcher panicked");
            FetchOutcome::failed(format!("fetcher panicked: {message}"))
        });
    debug!(origin = %origin, "fetched");

    normalize::from_outcome(kind, origin, outcome)
}
