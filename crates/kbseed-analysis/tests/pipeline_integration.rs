//! End-to-end runs over in-memory collaborators: fake HTTP, in-memory cache,
//! scripted tools. Run directories live in temp dirs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kbseed_analysis::fakes::ScriptedToolRunner;
use kbseed_analysis::{RunPipeline, RunRequest, ToolOutput, ToolRunner};
use kbseed_core::fakes::{MemoryBlobStore, StaticHttpClient};
use kbseed_core::fetch::github::{GITHUB_API, GITHUB_RAW};
use kbseed_core::{
    reasons, AnalysisSummaryFile, ArtifactStatus, Collaborators, PipelineConfig, RunManifest, Severity,
    SolidityCache, StrategyKind,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

const VAULT: &str = "pragma solidity ^0.8.0;\ncontract Vault {\n  function out(address to) external {\n    (bool ok, ) = to.call{value: 1}(\"\");\n    require(ok);\n  }\n}\n";

fn tree(paths: &[&str]) -> Value {
    json!({
        "tree": paths.iter().map(|p| json!({"path": p, "type": "blob"})).collect::<Vec<_>>(),
        "truncated": false
    })
}

fn github_repo(http: StaticHttpClient, repo: &str, files: &[&str]) -> StaticHttpClient {
    let mut http = http
        .with_json(&format!("{GITHUB_API}/repos/o/{repo}"), &json!({"default_branch": "main"}))
        .with_json(
            &format!("{GITHUB_API}/repos/o/{repo}/git/trees/main?recursive=1"),
            &tree(files),
        );
    for file in files.iter().filter(|f| f.ends_with(".sol")) {
        http = http.with_body(&format!("{GITHUB_RAW}/o/{repo}/main/{file}"), VAULT.as_bytes().to_vec());
    }
    http
}

fn pipeline(root: &Path, http: StaticHttpClient, runner: Arc<dyn ToolRunner>) -> RunPipeline {
    let config = PipelineConfig {
        artifacts_root: root.to_path_buf(),
        ingest_concurrency: 4,
        ..PipelineConfig::default()
    };
    let cache = Arc::new(SolidityCache::open(Arc::new(MemoryBlobStore::new())).unwrap());
    RunPipeline::with_parts(config, Collaborators::new(Arc::new(http), cache), runner)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn ingest_files(run_dir: &Path) -> usize {
    std::fs::read_dir(run_dir.join("ingest"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
        .count()
}

#[tokio::test]
async fn without_tools_every_cached_file_gets_regex_findings() {
    let tmp = tempfile::tempdir().unwrap();
    let http = github_repo(StaticHttpClient::new(), "vault", &["src/Vault.sol", "src/Token.sol", "README.md"]);
    let pipeline = pipeline(tmp.path(), http, Arc::new(ScriptedToolRunner::new()));

    let outcome = pipeline
        .execute(
            RunRequest::new(vec!["https://github.com/o/vault".into()]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].status, ArtifactStatus::Ok);
    assert_eq!(outcome.artifacts[0].code_blocks.len(), 2);
    assert_eq!(pipeline.cache().len(), 2);

    assert_eq!(outcome.files.len(), 2);
    for file in &outcome.files {
        assert_eq!(file.strategy_used, StrategyKind::RegexFallback);
        assert!(file.findings >= 1);
        assert!(outcome.findings.iter().any(|f| f.file_ref == file.file_ref));
    }
    assert!(outcome
        .findings
        .iter()
        .all(|f| f.strategy_used == StrategyKind::RegexFallback && f.severity <= Severity::Low));
    assert_eq!(outcome.summary.findings_by_strategy.regex_fallback, outcome.findings.len());
    assert_eq!(outcome.summary.findings_by_severity.medium + outcome.summary.findings_by_severity.high, 0);

    let written: AnalysisSummaryFile = read_json(&outcome.summary_path);
    assert_eq!(written.findings.len(), outcome.findings.len());
    assert_eq!(written.tool_availability.get(&StrategyKind::CompilerAst), Some(&false));
    assert!(!written.cancelled);
}

#[tokio::test]
async fn github_repo_without_solidity_is_ok_and_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let http = github_repo(StaticHttpClient::new(), "docs", &["README.md", "docs/intro.md"]);
    let outcome = pipeline(tmp.path(), http, Arc::new(ScriptedToolRunner::new()))
        .execute(
            RunRequest::new(vec!["https://github.com/o/docs".into()]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let artifact = &outcome.artifacts[0];
    assert_eq!(artifact.status, ArtifactStatus::Ok);
    assert!(artifact.code_blocks.is_empty());
    assert_eq!(artifact.metadata["sol_files"], 0);
    assert!(outcome.files.is_empty());
    assert_eq!(outcome.summary.analyzed_files, 0);
}

#[tokio::test]
async fn google_doc_auth_wall_is_skipped_and_run_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let http = StaticHttpClient::new()
        .with_status("https://docs.google.com/document/d/abc123/export?format=txt", 401)
        .with_html("https://docs.test/audit", "<title>Audit</title><main><p>Scope: Vault</p></main>")
        .with_transport_error("https://down.test/page", "connection refused");
    let origins = vec![
        "https://docs.google.com/document/d/abc123/edit".to_string(),
        "https://docs.test/audit".to_string(),
        "https://down.test/page".to_string(),
    ];
    let outcome = pipeline(tmp.path(), http, Arc::new(ScriptedToolRunner::new()))
        .execute(RunRequest::new(origins.clone()), &CancellationToken::new())
        .await
        .unwrap();

    let statuses: Vec<ArtifactStatus> = outcome.artifacts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![ArtifactStatus::Skipped, ArtifactStatus::Ok, ArtifactStatus::Failed]
    );
    assert_eq!(outcome.artifacts[0].skip_reason.as_deref(), Some(reasons::AUTH_REQUIRED));
    for (artifact, origin) in outcome.artifacts.iter().zip(&origins) {
        assert_eq!(&artifact.origin, origin);
    }

    assert_eq!(outcome.summary.artifacts.ok, 1);
    assert_eq!(outcome.summary.artifacts.skipped, 1);
    assert_eq!(outcome.summary.artifacts.failed, 1);
    assert_eq!(outcome.summary.not_ok.len(), 2);
    assert_eq!(ingest_files(&outcome.run_dir), 3);
    assert!(outcome.run_dir.join("ingest/0002.txt").exists());
}

#[tokio::test]
async fn cancelled_run_keeps_only_completed_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    let slow = Duration::from_secs(30);
    let http = StaticHttpClient::new()
        .with_html("https://fast.test/a", "<p>a</p>")
        .with_html("https://fast.test/b", "<p>b</p>")
        .with_html("https://slow.test/c", "<p>c</p>")
        .with_delay("https://slow.test/c", slow)
        .with_html("https://slow.test/d", "<p>d</p>")
        .with_delay("https://slow.test/d", slow);
    let origins: Vec<String> = ["https://fast.test/a", "https://slow.test/c", "https://fast.test/b", "https://slow.test/d"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let pipeline = pipeline(tmp.path(), http, Arc::new(ScriptedToolRunner::new()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let outcome = pipeline
        .execute(RunRequest::new(origins.clone()), &cancel)
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(outcome.summary.artifacts.total(), 2);
    assert_eq!(ingest_files(&outcome.run_dir), 2);
    assert!(outcome.run_dir.join("ingest/0001.json").exists());
    assert!(outcome.run_dir.join("ingest/0003.json").exists());
    assert!(outcome.files.is_empty(), "analysis is skipped on cancellation");

    let manifest: RunManifest = read_json(&outcome.manifest_path);
    assert!(manifest.cancelled);
    assert_eq!(manifest.completed_inputs, 2);
    assert_eq!(manifest.origins, origins);
    let summary: AnalysisSummaryFile = read_json(&outcome.summary_path);
    assert!(summary.cancelled);
    assert_eq!(summary.total_inputs, 4);
    assert_eq!(summary.summary.artifacts.total(), 2);
}

#[tokio::test]
async fn compiler_failure_on_one_file_falls_through_to_regex() {
    let tmp = tempfile::tempdir().unwrap();
    let ast = json!({
        "nodeType": "SourceUnit",
        "nodes": [{"nodeType": "ContractDefinition", "name": "Vault", "contractKind": "contract", "src": "24:10:0"}]
    });
    let runner = Arc::new(
        ScriptedToolRunner::new()
            .with_tool("solc", ToolOutput::new(0, ast.to_string(), ""))
            .with_failure_for("solc", "Broken.sol", "ParserError: Expected ';' but got '}'"),
    );
    let http = github_repo(StaticHttpClient::new(), "mixed", &["Good.sol", "Broken.sol"]);
    let outcome = pipeline(tmp.path(), http, runner.clone())
        .execute(
            RunRequest::new(vec!["https://github.com/o/mixed".into()]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let by_path = |p: &str| outcome.files.iter().find(|f| f.file_ref.path() == p).unwrap();
    assert_eq!(by_path("Good.sol").strategy_used, StrategyKind::CompilerAst);
    assert_eq!(by_path("Broken.sol").strategy_used, StrategyKind::RegexFallback);
    assert_eq!(by_path("Broken.sol").fell_back_from, vec![StrategyKind::CompilerAst]);
    assert_eq!(runner.calls_to("solc"), 2);

    assert!(outcome.summary.findings_by_strategy.compiler_ast >= 1);
    assert!(outcome.summary.findings_by_strategy.regex_fallback >= 1);
}

#[tokio::test]
async fn local_solidity_file_is_cached_and_analyzed() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("Local.sol");
    std::fs::write(&source, VAULT).unwrap();
    let origin = source.display().to_string();

    let outcome = pipeline(&tmp.path().join("runs"), StaticHttpClient::new(), Arc::new(ScriptedToolRunner::new()))
        .execute(RunRequest::new(vec![origin]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.artifacts[0].status, ArtifactStatus::Ok);
    assert_eq!(outcome.artifacts[0].code_blocks.len(), 1);
    assert_eq!(outcome.files.len(), 1);
    assert_eq!(outcome.files[0].file_ref.repository(), "local");
}
