//! Text extraction collaborators: readable HTML and PDF text.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::domain::{CodeBlock, FetchError};

/// Readable view of an HTML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readable {
    pub title: Option<String>,
    pub text: String,
    /// `<pre>`/`<code>` blocks in document order.
    pub code_blocks: Vec<CodeBlock>,
}

/// `extract(html_bytes) -> (title, text)`, plus any code blocks found.
pub trait ReadableExtractor: Send + Sync {
    fn extract(&self, html: &[u8]) -> Result<Readable, FetchError>;
}

/// `extract(pdf_bytes) -> text`.
pub trait PdfExtractor: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<String, FetchError>;
}

/// Run a PDF extractor on the blocking pool.
pub async fn extract_pdf(
    extractor: Arc<dyn PdfExtractor>,
    bytes: Vec<u8>,
) -> Result<String, FetchError> {
    tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| FetchError::Extraction(format!("pdf worker: {e}")))?
}

const MAIN_SELECTORS: [&str; 5] = ["main", "article", "[role='main']", "#content", "body"];
const BOILERPLATE: [&str; 7] = ["script", "style", "noscript", "nav", "header", "footer", "pre"];

/// `scraper`-based extractor.
#[derive(Debug, Default, Clone)]
pub struct ScraperExtractor;

impl ScraperExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_title(document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn main_element(document: &Html) -> Option<ElementRef<'_>> {
        MAIN_SELECTORS.iter().find_map(|s| {
            let selector = Selector::parse(s).ok()?;
            document.select(&selector).next()
        })
    }

    /// Visible text under `root`, one line per text node, boilerplate removed.
    fn visible_text(root: ElementRef<'_>) -> String {
        let mut lines: Vec<String> = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| BOILERPLATE.contains(&e.name()))
                    .unwrap_or(false)
            });
            if hidden {
                continue;
            }
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines.join("\n")
    }

    fn language_of(element: ElementRef<'_>) -> Option<String> {
        let own = element.value().classes();
        let child_classes = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == "code")
            .flat_map(|c| c.value().classes());
        own.chain(child_classes).find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
                .filter(|l| !l.is_empty())
                .map(|l| l.to_ascii_lowercase())
        })
    }

    fn code_blocks(document: &Html) -> Vec<CodeBlock> {
        let Ok(pre) = Selector::parse("pre") else {
            return Vec::new();
        };
        let Ok(code) = Selector::parse("code") else {
            return Vec::new();
        };

        let mut blocks: Vec<CodeBlock> = document
            .select(&pre)
            .map(|el| (el, el.text().collect::<String>()))
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(el, text)| CodeBlock::new(Self::language_of(el), text.trim_end()))
            .collect();

        // Multi-line <code> outside <pre>; inline snippets are prose.
        for el in document.select(&code) {
            let in_pre = el
                .ancestors()
                .any(|a| a.value().as_element().map(|e| e.name() == "pre").unwrap_or(false));
            if in_pre {
                continue;
            }
            let text = el.text().collect::<String>();
            if text.trim().contains('\n') {
                blocks.push(CodeBlock::new(Self::language_of(el), text.trim_end()));
            }
        }
        blocks
    }
}

impl ReadableExtractor for ScraperExtractor {
    fn extract(&self, html: &[u8]) -> Result<Readable, FetchError> {
        let source = String::from_utf8_lossy(html);
        let document = Html::parse_document(&source);

        let text = Self::main_element(&document)
            .map(Self::visible_text)
            .unwrap_or_default();

        Ok(Readable {
            title: Self::extract_title(&document),
            text,
            code_blocks: Self::code_blocks(&document),
        })
    }
}

/// `pdf-extract`-based extractor. Panics inside the parser become errors.
#[derive(Debug, Default, Clone)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PdfExtractor for PdfTextExtractor {
    fn extract(&self, pdf: &[u8]) -> Result<String, FetchError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(pdf)));
        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(FetchError::Extraction(e.to_string())),
            Err(_) => Err(FetchError::Extraction("pdf parser panicked".to_string())),
        }
    }
}
