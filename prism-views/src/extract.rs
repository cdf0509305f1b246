use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<script\b[^>]*>.*?</script\s*>"));
static STYLE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<style\b[^>]*>.*?</style\s*>"));
static COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?s)<!--.*?-->"));
static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]*>"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<title\b[^>]*>(.*?)</title\s*>"));

const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    // last, so `&amp;quot;` stays literal text
    ("&amp;", "&"),
];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Readable text of an HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub url: Option<Url>,
    pub title: Option<String>,
    pub text: String,
    pub html_checksum: String,
}

pub fn extract_page(url: Option<&Url>, html: &str) -> ExtractedPage {
    ExtractedPage {
        url: url.cloned(),
        title: extract_title(html),
        text: html_to_text(html),
        html_checksum: blake3::hash(html.as_bytes()).to_hex().to_string(),
    }
}

/// Lexical tag stripper. Drops script and style blocks, comments and tags,
/// decodes a handful of common entities, then collapses whitespace.
///
/// Lossy and never fails. Malformed markup is handled best-effort: an
/// unclosed `<script>` block keeps its text, and stray angle brackets are dropped.
///
/// ```
/// use prism_views::extract::html_to_text;
///
/// let html = "<p>Hello <b>world</b></p><script>var x = 1;</script>";
/// assert_eq!(html_to_text(html), "Hello world");
/// ```
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT.replace_all(html, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = COMMENT.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");

    let mut text = text.into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }

    text.replace(['<', '>'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE.captures(html)?.get(1)?.as_str();
    let title = html_to_text(raw);
    (!title.is_empty()).then_some(title)
}
