//! Citation numbering across specialist answers.
//!
//! Specialists cite with markdown links, bare URLs, or local `[k]` markers
//! backed by their own Sources list. [`CitationIndex`] folds all of these into
//! one global numbering: each unique URL gets exactly one number, assigned in
//! order of first appearance, starting at 1 with no gaps.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use health_core::{AgentError, SourceRef};
use regex::{Captures, Regex};

pub const SOURCES_HEADING: &str = "### Sources";

/// Upper bound on the "Further reading" line.
pub const MAX_FURTHER_READING: usize = 5;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(?P<title>[^\]\n]+)\]\((?P<url>https?://(?:[^\s()]|\([^\s()]*\))+)\)(?:[ \t]*\[\d+\])*|\[(?P<num>\d+)\]|(?P<bare>https?://(?:[^\s<>()\[\]]|\([^\s<>()\[\]]*\))+)",
    )
    .expect("citation token regex")
});

static LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<title>[^\]\n]+)\]\((?P<url>https?://(?:[^\s()]|\([^\s()]*\))+)\)").expect("link regex")
});

static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://(?:[^\s<>()\[\]]|\([^\s<>()\[\]]*\))+").expect("url regex"));

static SOURCES_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#{1,6}\s*)?(?:\*\*)?(?:sources|references|citations)(?:\*\*)?:?(?:\*\*)?\s*$")
        .expect("sources heading regex")
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s").expect("heading regex"));

static ENTRY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]\s*)?(?:\[(?P<bracket>\d+)\]|(?P<plain>\d+)[.)])?\s*(?P<rest>.*)$")
        .expect("entry regex")
});

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(?P<num>\d+)\](?P<link>\()?").expect("marker regex"));

static RENDERED_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^- \[(?P<num>\d+)\] .+: \S+$").expect("rendered entry regex"));

/// Normalizes a URL for deduplication.
///
/// Trims whitespace, drops the fragment and any trailing slash, and lowercases
/// the scheme and host.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);

    let normalized = match without_fragment.find("://") {
        Some(scheme_end) => {
            let host_start = scheme_end + 3;
            let host_end = without_fragment[host_start..]
                .find(['/', '?'])
                .map(|i| host_start + i)
                .unwrap_or(without_fragment.len());
            format!(
                "{}{}",
                without_fragment[..host_end].to_lowercase(),
                &without_fragment[host_end..]
            )
        }
        None => without_fragment.to_string(),
    };

    normalized.trim_end_matches('/').to_string()
}

fn host_of(url: &str) -> &str {
    let rest = url.split("://").nth(1).unwrap_or(url);
    rest.split(['/', '?']).next().unwrap_or(rest)
}

fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned title, or the URL's host when the title is blank.
fn display_title(title: &str, url: &str) -> String {
    let cleaned = clean_title(title);
    if cleaned.is_empty() {
        host_of(url).to_string()
    } else {
        cleaned
    }
}

/// Splits a bare URL from the sentence punctuation that follows it.
fn split_trailing_punctuation(url: &str) -> (&str, &str) {
    let core = url.trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
    (core, &url[core.len()..])
}

/// Every markdown link and bare URL in `text`, in order of appearance.
pub fn extract_links(text: &str) -> Vec<SourceRef> {
    TOKEN
        .captures_iter(text)
        .filter_map(|caps| {
            if let (Some(title), Some(url)) = (caps.name("title"), caps.name("url")) {
                return Some(SourceRef::new(display_title(title.as_str(), url.as_str()), url.as_str()));
            }
            caps.name("bare").map(|bare| {
                let (url, _) = split_trailing_punctuation(bare.as_str());
                SourceRef::new(host_of(url), url)
            })
        })
        .collect()
}

/// A "Further reading" line listing up to [`MAX_FURTHER_READING`] unique sources.
pub fn further_reading(sources: &[SourceRef]) -> Option<String> {
    let mut seen = HashSet::new();
    let links: Vec<String> = sources
        .iter()
        .filter(|s| seen.insert(normalize_url(&s.url)))
        .take(MAX_FURTHER_READING)
        .map(|s| format!("[{}]({})", display_title(&s.title, &s.url), s.url.trim()))
        .collect();

    if links.is_empty() {
        return None;
    }
    Some(format!("Further reading: {}", links.join(", ")))
}

/// An entry from a specialist's own Sources list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    /// The number the specialist used for it, or its list position.
    pub number: usize,
    pub source: SourceRef,
}

fn parse_entry(line: &str, position: usize) -> Option<LocalSource> {
    let caps = ENTRY_NUMBER.captures(line)?;
    let explicit = caps
        .name("bracket")
        .or_else(|| caps.name("plain"))
        .and_then(|m| m.as_str().parse().ok());
    let rest = caps.name("rest").map_or("", |m| m.as_str());

    let source = if let Some(link) = LINK.captures(rest) {
        SourceRef::new(display_title(&link["title"], &link["url"]), &link["url"])
    } else {
        let url_match = BARE_URL.find(rest)?;
        let (url, _) = split_trailing_punctuation(url_match.as_str());
        let title = rest[..url_match.start()]
            .trim()
            .trim_end_matches([':', '-', '–', '—', '|'])
            .trim();
        SourceRef::new(display_title(title, url), url)
    };

    Some(LocalSource { number: explicit.unwrap_or(position), source })
}

/// Removes specialist-owned Sources/References sections.
///
/// Returns the remaining text and the entries those sections listed.
pub fn split_sources(text: &str) -> (String, Vec<LocalSource>) {
    let mut body = Vec::new();
    let mut entries = Vec::new();
    let mut in_sources = false;

    for line in text.lines() {
        if SOURCES_TITLE.is_match(line) {
            in_sources = true;
            continue;
        }
        if in_sources && HEADING.is_match(line) {
            in_sources = false;
        }
        if !in_sources {
            body.push(line);
            continue;
        }
        if let Some(entry) = parse_entry(line, entries.len() + 1) {
            entries.push(entry);
        }
    }

    (body.join("\n").trim_end().to_string(), entries)
}

/// Text rewritten against a [`CitationIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub text: String,
    /// Local numbers that were referenced, either by marker or by URL.
    pub used_local: HashSet<usize>,
}

/// Global numbering of unique source URLs.
#[derive(Debug, Default, Clone)]
pub struct CitationIndex {
    sources: Vec<SourceRef>,
    numbers: HashMap<String, usize>,
}

impl CitationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number for this URL, assigning the next one on first sight.
    pub fn register(&mut self, title: &str, url: &str) -> usize {
        let key = normalize_url(url);
        if let Some(&n) = self.numbers.get(&key) {
            return n;
        }
        self.sources.push(SourceRef::new(display_title(title, &key), key.clone()));
        let n = self.sources.len();
        self.numbers.insert(key, n);
        n
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources in citation order; entry `i` carries number `i + 1`.
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    /// Rewrites links, bare URLs and local markers to `[Title](URL) [n]`.
    ///
    /// Local markers with no matching entry in `local` are dropped.
    pub fn rewrite(&mut self, text: &str, local: &[LocalSource]) -> Rewritten {
        let by_number: HashMap<usize, &SourceRef> =
            local.iter().map(|l| (l.number, &l.source)).collect();
        let by_url: HashMap<String, usize> =
            local.iter().map(|l| (normalize_url(&l.source.url), l.number)).collect();
        let mut used_local = HashSet::new();

        let rewritten = TOKEN.replace_all(text, |caps: &Captures| {
            if let (Some(title), Some(url)) = (caps.name("title"), caps.name("url")) {
                let key = normalize_url(url.as_str());
                if let Some(&k) = by_url.get(&key) {
                    used_local.insert(k);
                }
                let n = self.register(title.as_str(), url.as_str());
                return format!("[{}]({}) [{}]", display_title(title.as_str(), &key), key, n);
            }

            if let Some(num) = caps.name("num") {
                let Some(k) = num.as_str().parse::<usize>().ok() else {
                    return String::new();
                };
                return match by_number.get(&k) {
                    Some(source) => {
                        used_local.insert(k);
                        format!("[{}]", self.register(&source.title, &source.url))
                    }
                    None => String::new(),
                };
            }

            let bare = caps.name("bare").map_or("", |m| m.as_str());
            let (url, trailing) = split_trailing_punctuation(bare);
            let key = normalize_url(url);
            let title = match by_url.get(&key) {
                Some(&k) => {
                    used_local.insert(k);
                    by_number.get(&k).map(|s| s.title.clone()).unwrap_or_default()
                }
                None => host_of(url).to_string(),
            };
            let title = display_title(&title, &key);
            let n = self.register(&title, url);
            format!("[{}]({}) [{}]{}", title, key, n, trailing)
        });

        Rewritten { text: rewritten.into_owned(), used_local }
    }

    /// The Sources block, or `None` when nothing was cited.
    pub fn render_sources(&self) -> Option<String> {
        if self.sources.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("- [{}] {}: {}", i + 1, s.title, s.url))
            .collect();
        Some(format!("{}\n\n{}", SOURCES_HEADING, lines.join("\n")))
    }
}

/// Byte offset of the last line that is exactly the Sources heading.
pub fn sources_block_start(document: &str) -> Option<usize> {
    document
        .match_indices(SOURCES_HEADING)
        .map(|(idx, _)| idx)
        .filter(|&idx| {
            let after = &document[idx + SOURCES_HEADING.len()..];
            (idx == 0 || document[..idx].ends_with('\n'))
                && (after.is_empty() || after.starts_with('\n') || after.starts_with("\r\n"))
        })
        .last()
}

/// Checks the citation contract of a finished document and returns the source count.
///
/// Every inline marker must fall within 1..=N, and the Sources list must be
/// present exactly when N > 0, numbered 1..=N without gaps.
pub fn validate_citations(document: &str) -> Result<usize, AgentError> {
    let (body, sources) = match sources_block_start(document) {
        Some(idx) => (&document[..idx], Some(&document[idx + SOURCES_HEADING.len()..])),
        None => (document, None),
    };

    let listed: Vec<usize> = sources
        .map(|s| {
            s.lines()
                .filter_map(|l| RENDERED_ENTRY.captures(l.trim()))
                .filter_map(|c| c["num"].parse().ok())
                .collect()
        })
        .unwrap_or_default();

    if sources.is_some() && listed.is_empty() {
        return Err(AgentError::MalformedOutput("Sources section has no entries".into()));
    }
    if let Some(pos) = listed.iter().enumerate().position(|(i, &n)| n != i + 1) {
        return Err(AgentError::MalformedOutput(format!(
            "Sources numbering breaks at entry {} (found [{}])",
            pos + 1,
            listed[pos]
        )));
    }

    let count = listed.len();
    for caps in MARKER.captures_iter(body) {
        if caps.name("link").is_some() {
            continue;
        }
        let n: usize = caps["num"].parse().unwrap_or(0);
        if n == 0 || n > count {
            return Err(AgentError::MalformedOutput(format!(
                "citation [{}] has no matching source ({} listed)",
                n, count
            )));
        }
    }

    Ok(count)
}
