//! Compiler AST strategy: `solc --ast-compact-json <file>` and a walk over
//! the resulting tree.

use std::sync::Arc;

use async_trait::async_trait;
use kbseed_core::{AnalysisFinding, Location, Severity, StrategyKind};
use serde_json::{Map, Value};

use super::{first_line, json_object, AnalysisStrategy, SourceUnit};
use crate::error::ToolError;
use crate::runner::ToolRunner;

const ERC_STANDARDS: [&str; 3] = ["ERC1155", "ERC721", "ERC20"];

pub struct CompilerAstStrategy {
    runner: Arc<dyn ToolRunner>,
    tool: String,
}

impl CompilerAstStrategy {
    pub fn new(runner: Arc<dyn ToolRunner>, tool: impl Into<String>) -> Self {
        Self {
            runner,
            tool: tool.into(),
        }
    }
}

#[async_trait]
impl AnalysisStrategy for CompilerAstStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CompilerAst
    }

    fn is_available(&self) -> bool {
        self.runner.is_present(&self.tool)
    }

    async fn analyze(&self, unit: &SourceUnit) -> Result<Vec<AnalysisFinding>, ToolError> {
        let args = vec![
            "--ast-compact-json".to_string(),
            unit.path.display().to_string(),
        ];
        let out = self.runner.invoke(&self.tool, &args).await?;
        if !out.success() || out.stderr.contains("Internal compiler error") {
            return Err(ToolError::NonZeroExit {
                tool: self.tool.clone(),
                code: out.exit_code,
                stderr: first_line(&out.stderr),
            });
        }

        let ast = json_object(&self.tool, &out.stdout)?;
        if ast.get("nodeType").and_then(Value::as_str) != Some("SourceUnit") {
            return Err(ToolError::unparseable(&self.tool, "output is not a SourceUnit AST"));
        }

        let mut walker = AstWalker {
            unit,
            findings: Vec::new(),
        };
        walker.walk(&ast);
        Ok(walker.findings)
    }
}

struct AstWalker<'a> {
    unit: &'a SourceUnit,
    findings: Vec<AnalysisFinding>,
}

impl AstWalker<'_> {
    fn walk(&mut self, node: &Value) {
        match node {
            Value::Object(map) => {
                if let Some(node_type) = map.get("nodeType").and_then(Value::as_str) {
                    self.visit(node_type, map);
                }
                for child in map.values() {
                    self.walk(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            _ => {}
        }
    }

    fn visit(&mut self, node_type: &str, node: &Map<String, Value>) {
        match node_type {
            "ContractDefinition" => self.contract(node),
            "MemberAccess" => self.member_access(node),
            "Identifier" => {
                if let Some(name @ ("selfdestruct" | "suicide")) = str_field(node, "name") {
                    self.push(node, Severity::High, "selfdestruct", format!("`{name}` can destroy the contract"));
                }
            }
            "InlineAssembly" => {
                self.push(node, Severity::Low, "inline-assembly", "Inline assembly bypasses compiler checks");
            }
            _ => {}
        }
    }

    fn contract(&mut self, node: &Map<String, Value>) {
        let name = str_field(node, "name").unwrap_or("<anonymous>");
        let kind = str_field(node, "contractKind").unwrap_or("contract");
        self.push(node, Severity::Info, "contract-definition", format!("{kind} {name}"));

        let bases = node
            .get("baseContracts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|b| b.get("baseName"))
            .filter_map(|b| b.get("name").or_else(|| b.get("namePath")))
            .filter_map(Value::as_str);
        for base in bases {
            if let Some(standard) = ERC_STANDARDS.iter().find(|s| base.contains(*s)) {
                self.push(
                    node,
                    Severity::Info,
                    "erc-standard",
                    format!("{name} inherits {base} ({standard})"),
                );
            }
        }
    }

    fn member_access(&mut self, node: &Map<String, Value>) {
        let Some(member) = str_field(node, "memberName") else {
            return;
        };
        match member {
            "call" | "delegatecall" | "staticcall" => self.push(
                node,
                Severity::Medium,
                "low-level-call",
                format!("Low-level `{member}`; return value and reentrancy must be handled"),
            ),
            "origin" => {
                let on_tx = node
                    .get("expression")
                    .and_then(|e| e.get("name"))
                    .and_then(Value::as_str)
                    == Some("tx");
                if on_tx {
                    self.push(node, Severity::Medium, "tx-origin", "`tx.origin` used; unsafe for authorization");
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, node: &Map<String, Value>, severity: Severity, rule: &str, description: impl Into<String>) {
        let mut finding = AnalysisFinding::new(
            self.unit.identity.clone(),
            StrategyKind::CompilerAst,
            severity,
            rule,
            description,
        );
        if let Some(offset) = src_offset(node) {
            finding = finding.at(Location::line(self.unit.line_of(offset)));
        }
        self.findings.push(finding);
    }
}

fn str_field<'a>(node: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    node.get(key).and_then(Value::as_str)
}

/// Byte offset from a `"start:length:file"` source range.
fn src_offset(node: &Map<String, Value>) -> Option<usize> {
    str_field(node, "src")?.split(':').next()?.parse().ok()
}
