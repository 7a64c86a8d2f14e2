//! kbseed analysis and run pipeline
//!
//! Layered static analysis over the Solidity cache: a compiler AST pass, a
//! security scanner, and an in-process regex scan that always succeeds.
//! [`RunPipeline`] drives a whole run on top of `kbseed-core`.

pub mod chain;
pub mod error;
pub mod fakes;
pub mod pipeline;
pub mod runner;
pub mod strategies;

pub use chain::{AnalysisReport, StrategyChain};
pub use error::ToolError;
pub use pipeline::{RunOutcome, RunPipeline, RunRequest};
pub use runner::{ProcessToolRunner, ToolOutput, ToolRunner};
pub use strategies::{
    AnalysisStrategy, CompilerAstStrategy, RegexFallbackStrategy, SecurityScannerStrategy, SourceUnit,
};
