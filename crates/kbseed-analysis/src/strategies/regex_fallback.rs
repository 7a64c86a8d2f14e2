//! In-process pattern scan. Always available, never fails, and never claims
//! more than `low` severity.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use kbseed_core::{AnalysisFinding, Location, Severity, StrategyKind};
use regex::Regex;

use super::{AnalysisStrategy, SourceUnit};
use crate::error::ToolError;

const CEILING: Severity = Severity::Low;

struct Rule {
    id: &'static str,
    severity: Severity,
    pattern: &'static str,
    description: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        id: "low-level-call",
        severity: Severity::Low,
        pattern: r"\.call\s*[({]",
        description: "Low-level call; check the return value",
    },
    Rule {
        id: "delegatecall",
        severity: Severity::Low,
        pattern: r"\.delegatecall\s*\(",
        description: "delegatecall executes foreign code in this contract's storage",
    },
    Rule {
        id: "value-transfer",
        severity: Severity::Low,
        pattern: r"\.(transfer|send)\s*\(",
        description: "Ether transfer via transfer/send",
    },
    Rule {
        id: "tx-origin",
        severity: Severity::Low,
        pattern: r"\btx\.origin\b",
        description: "tx.origin used; unsafe for authorization",
    },
    Rule {
        id: "block-timestamp",
        severity: Severity::Info,
        pattern: r"\bblock\.timestamp\b|\bnow\b",
        description: "Block timestamp dependence",
    },
    Rule {
        id: "selfdestruct",
        severity: Severity::Low,
        pattern: r"\bselfdestruct\s*\(",
        description: "selfdestruct can remove the contract",
    },
    Rule {
        id: "deprecated-suicide",
        severity: Severity::Low,
        pattern: r"\bsuicide\s*\(",
        description: "Deprecated suicide(); use selfdestruct",
    },
    Rule {
        id: "deprecated-sha3",
        severity: Severity::Info,
        pattern: r"\bsha3\s*\(",
        description: "Deprecated sha3(); use keccak256",
    },
    Rule {
        id: "deprecated-throw",
        severity: Severity::Info,
        pattern: r"\bthrow\s*;",
        description: "Deprecated throw; use revert/require",
    },
    Rule {
        id: "deprecated-var",
        severity: Severity::Info,
        pattern: r"^\s*var\s+\w",
        description: "Deprecated untyped var declaration",
    },
    Rule {
        id: "deprecated-callcode",
        severity: Severity::Low,
        pattern: r"\bcallcode\b",
        description: "Deprecated callcode; use delegatecall",
    },
    Rule {
        id: "inline-assembly",
        severity: Severity::Info,
        pattern: r"\bassembly\s*(\(.*\)\s*)?\{",
        description: "Inline assembly block",
    },
];

static COMPILED: LazyLock<Vec<(&'static Rule, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| (rule, Regex::new(rule.pattern).expect("valid rule pattern")))
        .collect()
});

static MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*modifier\s+(\w+)").expect("valid modifier pattern"));
static ERC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bI?(?:ERC|EIP)-?(20|721|1155|777|4626)\b").expect("valid ERC pattern"));
static PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pragma\s+solidity\s+([^;]+);").expect("valid pragma pattern"));

#[derive(Default)]
pub struct RegexFallbackStrategy;

impl RegexFallbackStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Scan one file. Infallible.
    pub fn scan(&self, unit: &SourceUnit) -> Vec<AnalysisFinding> {
        let mut findings = Vec::new();
        let mut push = |severity: Severity, rule: &str, description: String, line: Option<usize>| {
            let finding = AnalysisFinding::new(
                unit.identity.clone(),
                StrategyKind::RegexFallback,
                severity.capped_at(CEILING),
                rule,
                description,
            );
            findings.push(match line {
                Some(line) => finding.at(Location::line(line)),
                None => finding,
            });
        };

        let mut in_block_comment = false;
        let mut value_calls = 0usize;
        let mut standards = BTreeSet::new();
        let mut line_count = 0usize;

        for (idx, raw) in unit.text.lines().enumerate() {
            line_count += 1;
            let lineno = idx + 1;
            let Some(line) = strip_comments(raw, &mut in_block_comment) else {
                continue;
            };

            for (rule, re) in COMPILED.iter() {
                if re.is_match(&line) {
                    if matches!(rule.id, "low-level-call" | "value-transfer") {
                        value_calls += 1;
                    }
                    push(rule.severity, rule.id, rule.description.to_string(), Some(lineno));
                }
            }
            if let Some(caps) = MODIFIER.captures(&line) {
                push(Severity::Info, "modifier", format!("Modifier `{}` declared", &caps[1]), Some(lineno));
            }
            for caps in ERC.captures_iter(&line) {
                let standard = format!("ERC{}", &caps[1]);
                if standards.insert(standard.clone()) {
                    push(Severity::Info, "erc-standard", format!("References {standard}"), Some(lineno));
                }
            }
        }

        if value_calls > 0 {
            push(
                Severity::Low,
                "reentrancy-hint",
                format!("{value_calls} value-transferring call(s); review state updates before external calls"),
                None,
            );
        }

        let pragma = PRAGMA
            .captures(&unit.text)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_else(|| "none".to_string());
        push(
            Severity::Info,
            "scanned",
            format!("Pattern scan of {line_count} lines (pragma {pragma})"),
            None,
        );

        findings
    }
}

/// Code portion of a line, or `None` when the line is entirely comment.
///
/// Comment markers inside string literals are kept as code.
fn strip_comments(line: &str, in_block: &mut bool) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if *in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                *in_block = false;
            }
            continue;
        }
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match (c, chars.peek().copied()) {
            ('/', Some('/')) => break,
            ('/', Some('*')) => {
                chars.next();
                *in_block = true;
            }
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[async_trait]
impl AnalysisStrategy for RegexFallbackStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RegexFallback
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn analyze(&self, unit: &SourceUnit) -> Result<Vec<AnalysisFinding>, ToolError> {
        Ok(self.scan(unit))
    }
}
