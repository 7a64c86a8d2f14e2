//! Fetch outcome → [`Artifact`].
//!
//! Pure: no I/O, no clock. Identical input yields an identical artifact.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::cache::Digest;
use crate::domain::{Artifact, CodeBlock, SourceKind};
use crate::fetch::{FetchOutcome, RawDocument, RawPayload};

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+\-]*)[^\n]*\n(.*?)```").expect("fenced block regex")
});
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("paragraph regex"));

/// Turn a fetcher outcome into the artifact recorded for `origin`.
pub fn from_outcome(kind: SourceKind, origin: &str, outcome: FetchOutcome) -> Artifact {
    match outcome {
        FetchOutcome::Fetched(doc) => normalize(kind, origin, doc),
        FetchOutcome::Skipped { reason, metadata } => Artifact::skipped(kind, origin, reason, metadata),
        FetchOutcome::Failed { reason, metadata } => Artifact::failed(kind, origin, reason, metadata),
    }
}

/// Split a fetched document into raw text and code blocks.
pub fn normalize(kind: SourceKind, origin: &str, doc: RawDocument) -> Artifact {
    let RawDocument { payload, mut metadata } = doc;

    let (raw_text, code_blocks, title) = match payload {
        RawPayload::Html(readable) => {
            let mut blocks = readable.code_blocks;
            blocks.extend(extract_code_blocks(&readable.text));
            (readable.text, dedupe(blocks), readable.title)
        }
        RawPayload::Markdown(text) => {
            let title = markdown_title(&text);
            let blocks = dedupe(extract_code_blocks(&text));
            (text, blocks, title)
        }
        RawPayload::Text(text) => {
            let blocks = dedupe(extract_code_blocks(&text));
            (text, blocks, None)
        }
        // One block per file, never merged.
        RawPayload::Solidity(files) => {
            let listing = files
                .iter()
                .map(|f| f.path.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let blocks = files.into_iter().map(|f| CodeBlock::solidity(f.code)).collect();
            (listing, blocks, None)
        }
    };

    if let Some(title) = title {
        metadata.entry("title".into()).or_insert(Value::from(title));
    }
    if raw_text.trim().is_empty() && code_blocks.is_empty() {
        metadata.insert("empty_document".into(), Value::Bool(true));
    }

    Artifact::ok(kind, origin, metadata, raw_text, code_blocks)
}

/// Fenced blocks first, then blank-line paragraphs mentioning `pragma solidity`.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks: Vec<CodeBlock> = FENCED
        .captures_iter(text)
        .filter_map(|cap| {
            let code = cap.get(2)?.as_str().trim_end_matches('\n');
            if code.trim().is_empty() {
                return None;
            }
            let lang = cap
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .filter(|l| !l.is_empty());
            Some(CodeBlock::new(lang, code))
        })
        .collect();

    let without_fences = FENCED.replace_all(text, "\n\n");
    blocks.extend(
        PARAGRAPH_BREAK
            .split(&without_fences)
            .map(str::trim)
            .filter(|p| p.contains("pragma solidity"))
            .map(CodeBlock::solidity),
    );
    blocks
}

/// Drop blocks whose code was already seen, keeping the first occurrence.
fn dedupe(blocks: Vec<CodeBlock>) -> Vec<CodeBlock> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter(|b| seen.insert(Digest::compute(b.code.as_bytes())))
        .collect()
}

fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
