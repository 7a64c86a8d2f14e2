use thiserror::Error;

/// Why an external tool could not produce usable output for one file.
///
/// Inside the strategy chain these trigger fall-through to the next
/// strategy; they never abort a run.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} not found on PATH")]
    NotFound { tool: String },

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} exited with code {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} produced unusable output: {message}")]
    Unparseable { tool: String, message: String },
}

impl ToolError {
    pub fn unparseable(tool: &str, message: impl Into<String>) -> Self {
        Self::Unparseable {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_tool() {
        let err = ToolError::NonZeroExit {
            tool: "solc".into(),
            code: 1,
            stderr: "ParserError".into(),
        };
        assert_eq!(err.to_string(), "solc exited with code 1: ParserError");
        assert!(ToolError::unparseable("slither", "no JSON")
            .to_string()
            .starts_with("slither produced unusable output"));
    }
}
