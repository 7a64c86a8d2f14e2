//! Scripted tool runner (testing only).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::runner::{ToolOutput, ToolRunner};

#[derive(Debug, Clone)]
enum Script {
    Output(ToolOutput),
    Fail(String),
}

/// Tool runner driven by a table instead of processes.
///
/// A tool is present once it has a default output. Per-file overrides match
/// when any argument contains the given substring; the first matching
/// override wins.
#[derive(Debug, Default)]
pub struct ScriptedToolRunner {
    present: HashSet<String>,
    defaults: HashMap<String, ToolOutput>,
    overrides: Vec<(String, String, Script)>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: &str, output: ToolOutput) -> Self {
        self.present.insert(tool.to_string());
        self.defaults.insert(tool.to_string(), output);
        self
    }

    /// Answer `tool` with `output` when an argument contains `needle`.
    pub fn with_output_for(mut self, tool: &str, needle: &str, output: ToolOutput) -> Self {
        self.overrides
            .push((tool.to_string(), needle.to_string(), Script::Output(output)));
        self
    }

    /// Make `tool` exit 1 with `stderr` when an argument contains `needle`.
    pub fn with_failure_for(mut self, tool: &str, needle: &str, stderr: &str) -> Self {
        self.overrides
            .push((tool.to_string(), needle.to_string(), Script::Fail(stderr.to_string())));
        self
    }

    /// Every `(tool, args)` invocation so far.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls().iter().filter(|(t, _)| t == tool).count()
    }
}

#[async_trait]
impl ToolRunner for ScriptedToolRunner {
    fn is_present(&self, tool: &str) -> bool {
        self.present.contains(tool)
    }

    async fn invoke(&self, tool: &str, args: &[String]) -> Result<ToolOutput, ToolError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((tool.to_string(), args.to_vec()));

        if !self.is_present(tool) {
            return Err(ToolError::NotFound {
                tool: tool.to_string(),
            });
        }

        let scripted = self
            .overrides
            .iter()
            .find(|(t, needle, _)| t == tool && args.iter().any(|a| a.contains(needle.as_str())))
            .map(|(_, _, script)| script.clone());

        match scripted {
            Some(Script::Output(out)) => Ok(out),
            Some(Script::Fail(stderr)) => Ok(ToolOutput::new(1, "", stderr)),
            None => Ok(self.defaults.get(tool).cloned().unwrap_or_else(|| ToolOutput::new(0, "", ""))),
        }
    }
}
