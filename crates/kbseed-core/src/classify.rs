//! Source classification by origin shape.
//!
//! No network access. Every origin maps to exactly one [`SourceKind`];
//! shapes that match nothing map to [`SourceKind::Unclassified`], which the
//! orchestrator turns into a `failed` artifact.

use url::{ParseError, Url};

use crate::domain::SourceKind;

/// Classify an origin (URL or filesystem path).
pub fn classify(origin: &str) -> SourceKind {
    let origin = origin.trim();
    if origin.is_empty() {
        return SourceKind::Unclassified;
    }

    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => return SourceKind::LocalFile,
        Err(_) => return SourceKind::Unclassified,
    };

    match url.scheme() {
        "file" => SourceKind::LocalFile,
        "http" | "https" => classify_web(&url),
        // `C:\contracts\A.sol` parses with a one-letter scheme.
        s if s.len() == 1 => SourceKind::LocalFile,
        _ => SourceKind::Unclassified,
    }
}

fn classify_web(url: &Url) -> SourceKind {
    let host = match url.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => return SourceKind::Unclassified,
    };

    if is_github_host(&host) && GithubTarget::from_url(url).is_some() {
        return SourceKind::GithubRepo;
    }
    if host == "docs.google.com" && google_doc_id(url).is_some() {
        return SourceKind::GoogleDoc;
    }
    if host == "slite.com" || host.ends_with(".slite.com") {
        return SourceKind::Slite;
    }

    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".pdf") {
        SourceKind::Pdf
    } else if path.ends_with(".md") || path.ends_with(".markdown") {
        SourceKind::Markdown
    } else {
        SourceKind::Html
    }
}

fn is_github_host(host: &str) -> bool {
    host == "github.com" || host == "www.github.com"
}

/// A GitHub repository reference, optionally narrowed to a branch and subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubTarget {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    /// Directory or file prefix inside the repository, without slashes at the ends.
    pub subpath: String,
}

impl GithubTarget {
    /// Parse `https://github.com/<owner>/<repo>[/tree|blob/<branch>[/<path>]]`.
    pub fn parse(origin: &str) -> Option<Self> {
        let url = Url::parse(origin.trim()).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        if !is_github_host(&host) {
            return None;
        }
        Self::from_url(&url)
    }

    fn from_url(url: &Url) -> Option<Self> {
        let segments: Vec<&str> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 2 {
            return None;
        }

        let owner = segments[0].to_string();
        let repo = segments[1].trim_end_matches(".git").to_string();
        if repo.is_empty() {
            return None;
        }

        let (branch, subpath) = match segments.get(2) {
            Some(&"tree") | Some(&"blob") => (
                segments.get(3).map(|b| decode_segment(b)),
                segments
                    .get(4..)
                    .map(|rest| rest.iter().map(|s| decode_segment(s)).collect::<Vec<_>>().join("/"))
                    .unwrap_or_default(),
            ),
            _ => (None, String::new()),
        };

        Some(Self {
            owner,
            repo,
            branch,
            subpath,
        })
    }

    /// `owner/repo`, the repository half of a cache identity.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// URL path segments arrive percent-encoded; tree entries do not.
fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Document id from `https://docs.google.com/document/d/<id>/...`.
pub fn google_doc_id(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (Some("document"), Some("d"), Some(id)) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_hosts() {
        let cases = [
            ("https://github.com/OpenZeppelin/openzeppelin-contracts", SourceKind::GithubRepo),
            ("https://www.github.com/o/r/tree/dev/contracts", SourceKind::GithubRepo),
            ("https://docs.google.com/document/d/1AbC_d-9/edit", SourceKind::GoogleDoc),
            ("https://acme.slite.com/p/note/Overview", SourceKind::Slite),
            ("https://slite.com/app/docs/abc", SourceKind::Slite),
            ("https://example.com/whitepaper.PDF", SourceKind::Pdf),
            ("https://example.com/README.md", SourceKind::Markdown),
            ("https://example.com/notes.markdown", SourceKind::Markdown),
            ("https://docs.example.com/protocol/overview", SourceKind::Html),
        ];
        for (origin, expected) in cases {
            assert_eq!(classify(origin), expected, "origin: {origin}");
        }
    }

    #[test]
    fn github_without_repo_is_html() {
        assert_eq!(classify("https://github.com/OpenZeppelin"), SourceKind::Html);
    }

    #[test]
    fn google_non_document_is_html() {
        assert_eq!(
            classify("https://docs.google.com/spreadsheets/d/abc"),
            SourceKind::Html
        );
    }

    #[test]
    fn local_paths() {
        assert_eq!(classify("file:///tmp/audit.md"), SourceKind::LocalFile);
        assert_eq!(classify("./docs/whitepaper.pdf"), SourceKind::LocalFile);
        assert_eq!(classify("contracts/Vault.sol"), SourceKind::LocalFile);
        assert_eq!(classify("/abs/path/notes.txt"), SourceKind::LocalFile);
    }

    #[test]
    fn unclassified_shapes() {
        assert_eq!(classify(""), SourceKind::Unclassified);
        assert_eq!(classify("   "), SourceKind::Unclassified);
        assert_eq!(classify("ftp://example.com/a.sol"), SourceKind::Unclassified);
        assert_eq!(classify("mailto:sec@example.com"), SourceKind::Unclassified);
    }

    #[test]
    fn classification_is_deterministic() {
        let origin = "https://github.com/o/r";
        assert_eq!(classify(origin), classify(origin));
    }

    #[test]
    fn github_target_variants() {
        let t = GithubTarget::parse("https://github.com/o/r.git").unwrap();
        assert_eq!(t.repo, "r");
        assert_eq!(t.branch, None);
        assert_eq!(t.subpath, "");

        let t = GithubTarget::parse("https://github.com/o/r/tree/v2/contracts/token").unwrap();
        assert_eq!(t.branch.as_deref(), Some("v2"));
        assert_eq!(t.subpath, "contracts/token");

        let t = GithubTarget::parse("https://github.com/o/r/blob/main/src/A.sol").unwrap();
        assert_eq!(t.branch.as_deref(), Some("main"));
        assert_eq!(t.subpath, "src/A.sol");
        assert_eq!(t.repository(), "o/r");

        assert!(GithubTarget::parse("https://gitlab.com/o/r").is_none());
    }

    #[test]
    fn github_branch_and_subpath_are_decoded() {
        let t = GithubTarget::parse("https://github.com/o/r/tree/release%2Dv1/My%20Contracts/token").unwrap();
        assert_eq!(t.branch.as_deref(), Some("release-v1"));
        assert_eq!(t.subpath, "My Contracts/token");
    }

    #[test]
    fn google_doc_id_extraction() {
        let url = Url::parse("https://docs.google.com/document/d/XYZ123/edit#heading=h").unwrap();
        assert_eq!(google_doc_id(&url).as_deref(), Some("XYZ123"));
    }
}
