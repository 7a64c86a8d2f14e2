//! Pipeline configuration.
//!
//! Defaults come from the environment (see [`PipelineConfig::from_env`]);
//! the CLI layers its flags on top and calls [`PipelineConfig::validate`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{KbseedError, Result};

pub const ENV_ARTIFACTS_DIR: &str = "KBSEED_ARTIFACTS_DIR";
pub const ENV_CACHE_DIR: &str = "KBSEED_CACHE_DIR";
pub const ENV_INGEST_CONCURRENCY: &str = "KBSEED_INGEST_CONCURRENCY";
pub const ENV_ANALYSIS_CONCURRENCY: &str = "KBSEED_ANALYSIS_CONCURRENCY";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "KBSEED_HTTP_TIMEOUT_SECS";
pub const ENV_TOOL_TIMEOUT_SECS: &str = "KBSEED_TOOL_TIMEOUT_SECS";
pub const ENV_RUN_TIMEOUT_SECS: &str = "KBSEED_RUN_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "KBSEED_USER_AGENT";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_SOLC: &str = "KBSEED_SOLC";
pub const ENV_SLITHER: &str = "KBSEED_SLITHER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parent of per-run directories.
    pub artifacts_root: PathBuf,
    /// Process-wide Solidity cache, shared across runs.
    pub cache_dir: PathBuf,
    pub ingest_concurrency: usize,
    pub analysis_concurrency: usize,
    pub http_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Whole-run deadline; on expiry the run is cancelled, not failed.
    pub run_timeout_secs: Option<u64>,
    pub user_agent: String,
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    /// Compiler binary used by the AST strategy.
    pub compiler_tool: String,
    /// Security scanner binary.
    pub scanner_tool: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifacts_root: PathBuf::from("artifacts"),
            cache_dir: PathBuf::from(".workspace_cache/solidity"),
            ingest_concurrency: 4,
            analysis_concurrency: 2,
            http_timeout_secs: 30,
            tool_timeout_secs: 120,
            run_timeout_secs: None,
            user_agent: format!("kbseed/{}", crate::VERSION),
            github_token: None,
            compiler_tool: "solc".to_string(),
            scanner_tool: "slither".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by any `KBSEED_*` variables that are set.
    ///
    /// Unparseable numeric values are rejected rather than ignored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ARTIFACTS_DIR) {
            config.artifacts_root = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_CACHE_DIR) {
            config.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_INGEST_CONCURRENCY) {
            config.ingest_concurrency = parse_var(ENV_INGEST_CONCURRENCY, &v)?;
        }
        if let Some(v) = get(ENV_ANALYSIS_CONCURRENCY) {
            config.analysis_concurrency = parse_var(ENV_ANALYSIS_CONCURRENCY, &v)?;
        }
        if let Some(v) = get(ENV_HTTP_TIMEOUT_SECS) {
            config.http_timeout_secs = parse_var(ENV_HTTP_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_TOOL_TIMEOUT_SECS) {
            config.tool_timeout_secs = parse_var(ENV_TOOL_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(ENV_RUN_TIMEOUT_SECS) {
            config.run_timeout_secs = Some(parse_var(ENV_RUN_TIMEOUT_SECS, &v)?);
        }
        if let Some(v) = get(ENV_USER_AGENT) {
            config.user_agent = v;
        }
        config.github_token = get(ENV_GITHUB_TOKEN);
        if let Some(v) = get(ENV_SOLC) {
            config.compiler_tool = v;
        }
        if let Some(v) = get(ENV_SLITHER) {
            config.scanner_tool = v;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest_concurrency == 0 {
            return Err(KbseedError::Config("ingest_concurrency must be > 0".into()));
        }
        if self.analysis_concurrency == 0 {
            return Err(KbseedError::Config("analysis_concurrency must be > 0".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(KbseedError::Config("http_timeout_secs must be > 0".into()));
        }
        if self.tool_timeout_secs == 0 {
            return Err(KbseedError::Config("tool_timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| KbseedError::Config(format!("{key}={value:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.ingest_concurrency, 4);
        assert_eq!(c.analysis_concurrency, 2);
        assert_eq!(c.cache_dir, PathBuf::from(".workspace_cache/solidity"));
        assert!(c.user_agent.starts_with("kbseed/"));
        assert!(c.run_timeout_secs.is_none());
        c.validate().unwrap();
    }

    #[test]
    fn env_overrides() {
        let c = PipelineConfig::from_lookup(lookup(&[
            (ENV_ARTIFACTS_DIR, "/tmp/runs"),
            (ENV_INGEST_CONCURRENCY, "8"),
            (ENV_RUN_TIMEOUT_SECS, "60"),
            (ENV_SOLC, "solc-0.8.24"),
            (ENV_GITHUB_TOKEN, "ghp_x"),
        ]))
        .unwrap();
        assert_eq!(c.artifacts_root, PathBuf::from("/tmp/runs"));
        assert_eq!(c.ingest_concurrency, 8);
        assert_eq!(c.run_timeout_secs, Some(60));
        assert_eq!(c.compiler_tool, "solc-0.8.24");
        assert_eq!(c.github_token.as_deref(), Some("ghp_x"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let c = PipelineConfig::from_lookup(lookup(&[(ENV_CACHE_DIR, "  ")])).unwrap();
        assert_eq!(c.cache_dir, PipelineConfig::default().cache_dir);
    }

    #[test]
    fn bad_number_is_config_error() {
        let err = PipelineConfig::from_lookup(lookup(&[(ENV_ANALYSIS_CONCURRENCY, "two")]))
            .unwrap_err();
        assert!(matches!(err, KbseedError::Config(_)));
        assert!(err.to_string().contains(ENV_ANALYSIS_CONCURRENCY));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let c = PipelineConfig {
            ingest_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(KbseedError::Config(_))));
    }

    #[test]
    fn token_is_not_serialized() {
        let c = PipelineConfig {
            github_token: Some("secret".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("secret"));
    }
}
