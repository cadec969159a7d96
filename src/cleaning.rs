//! Text cleaning pipeline executed before chunking.
//!
//! Cleaning is deliberately lossy: the goal is text that embeds well, not
//! text that round-trips. [`PageCleaner`] runs an ordered cascade of total,
//! deterministic transforms over one page of extracted text. Each step is
//! idempotent on its own output; the cascade as a whole usually is too,
//! though stripping links after whitespace collapsing can leave a double
//! space that only a second pass would remove.

use std::sync::LazyLock;

use regex::Regex;

/// Trait for page cleaning strategies.
pub trait Cleaner: Send + Sync {
    /// Cleans one page of raw text. Total: never fails, worst case returns
    /// an empty string (the caller drops empty pages).
    fn clean(&self, raw: &str, page_number: u32) -> String;

    /// Returns the cleaner name.
    fn name(&self) -> &'static str;
}

/// Default cleaner tuned for PDF-extracted technical documents.
///
/// Applies, in order: line-ending/typographic canonicalization, early-page
/// front-matter filtering, extraction-artifact repair, boilerplate
/// stripping, whitespace collapsing, link stripping, and an ASCII filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCleaner;

/// Pages at or below this number are checked for front matter.
const FRONT_MATTER_MAX_PAGE: u32 = 5;
/// Minimum number of dotted-leader lines for a page to count as a table of
/// contents.
const DOT_LEADER_MIN_LINES: usize = 5;
/// Minimum share of dotted-leader lines on such a page.
const DOT_LEADER_MIN_RATIO: f64 = 0.8;

static FRONT_MATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(Table of Contents|Contents|目录|Acknowledgements?|致谢|Preface|Foreword|序言|前言|Index|Appendix|附录)\s*$",
    )
    .unwrap()
});

// A numbering token, a run of three or more dots, a trailing page number.
static DOT_LEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\d.]{1,7}.*\.{3,}.*\d+\s*$").unwrap());

// Isolated single letters separated by spaces, a common extraction artifact.
static SPLIT_LETTERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[a-zA-Z] ){2,}[a-zA-Z]\b").unwrap());

// Runs of three or more short lines.
static SHORT_LINE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^.{1,20}\n){3,}").unwrap());

static DOC_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"3GPP TS \d+\.\d+ V\d+\.\d+\.\d+ \(\d{4}-\d{2}\)").unwrap());
static RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Release \d+").unwrap());
static PAGE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Page \d+").unwrap());
static NUMERIC_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\d+[ \t]*$").unwrap());
static COPYRIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)Copyright Notification.*?All rights reserved\.").unwrap());
static CONTACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?si)Postal address.*?http://www\.3gpp\.org").unwrap());
static TRADEMARK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?si)UMTS™.*?GSM® and the GSM logo.*?GSM Association").unwrap()
});
static HEADING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:\d+\.){1,4}[^\n]*\d{1,4}[ \t]*$").unwrap());
static LEADING_NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:\d+\.){1,5}[ \t]*").unwrap());
static SECTION_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(Foreword|Contents|General|Scope|References|Introduction|Abbreviations|Definitions)[ \t]*$",
    )
    .unwrap()
});
static HRULE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[-=_]{3,}$").unwrap());

static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static TRAILING_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static WWW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"www\.\S+").unwrap());
static DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\S+\.(com|org|net|edu|gov|cn)\b").unwrap());
static FAX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Ff]ax[:：]?\s*[()\d \-–—]+").unwrap());

// Everything outside printable ASCII, keeping tab and newline.
static NON_ASCII_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\x09\x0A\x20-\x7E]+").unwrap());

impl PageCleaner {
    fn canonicalize(text: &str) -> String {
        text.replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('ﬁ', "fi")
            .replace('ﬂ', "fl")
            .replace('–', "-")
            .replace('—', "-")
            .replace('\u{a0}', " ")
    }

    /// Whole-page discard for front matter (tables of contents,
    /// acknowledgements and similar) on the first few pages.
    fn is_front_matter(text: &str) -> bool {
        if FRONT_MATTER_RE.is_match(text) {
            return true;
        }
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return false;
        }
        let leaders = lines.iter().filter(|l| DOT_LEADER_RE.is_match(l)).count();
        leaders >= DOT_LEADER_MIN_LINES
            && leaders as f64 / lines.len() as f64 >= DOT_LEADER_MIN_RATIO
    }

    fn repair_extraction_artifacts(text: &str) -> String {
        let rejoined = SPLIT_LETTERS_RE.replace_all(text, |caps: &regex::Captures<'_>| {
            caps[0].replace(' ', "")
        });
        SHORT_LINE_RUN_RE
            .replace_all(&rejoined, |caps: &regex::Captures<'_>| {
                Self::merge_short_lines(&caps[0])
            })
            .into_owned()
    }

    /// Joins a run of short lines into one, except stray page numbers and
    /// horizontal rules, which stay on their own line so the line-anchored
    /// boilerplate patterns still match them.
    fn merge_short_lines(run: &str) -> String {
        let mut out = String::with_capacity(run.len());
        for line in run.lines() {
            if NUMERIC_LINE_RE.is_match(line) || HRULE_RE.is_match(line) {
                if !(out.is_empty() || out.ends_with('\n')) {
                    out.push('\n');
                }
                out.push_str(line);
                out.push('\n');
            } else {
                if !(out.is_empty() || out.ends_with('\n')) {
                    out.push(' ');
                }
                out.push_str(line);
            }
        }
        // The captured run ends with a newline; keep joining across it
        // unless the last kept line was exempt.
        if !out.ends_with('\n') {
            out.push(' ');
        }
        out
    }

    fn strip_boilerplate(text: &str) -> String {
        let text = DOC_HEADER_RE.replace_all(text, "");
        let text = RELEASE_RE.replace_all(&text, "");
        let text = PAGE_TOKEN_RE.replace_all(&text, "");
        let text = NUMERIC_LINE_RE.replace_all(&text, "");
        let text = text.replace('\u{0c}', "");
        let text = COPYRIGHT_RE.replace_all(&text, "");
        let text = CONTACT_RE.replace_all(&text, "");
        let text = TRADEMARK_RE.replace_all(&text, "");
        let text = HEADING_LINE_RE.replace_all(&text, "");
        let text = LEADING_NUMBERING_RE.replace_all(&text, "");
        let text = SECTION_TITLE_RE.replace_all(&text, "");
        HRULE_RE.replace_all(&text, "").into_owned()
    }

    fn collapse_whitespace(text: &str) -> String {
        let text = BLANK_RUN_RE.replace_all(text, "\n\n");
        let text = TRAILING_WS_RE.replace_all(&text, "");
        SPACE_RUN_RE.replace_all(&text, " ").into_owned()
    }

    fn strip_links(text: &str) -> String {
        let text = URL_RE.replace_all(text, "");
        let text = WWW_RE.replace_all(&text, "");
        let text = DOMAIN_RE.replace_all(&text, "");
        FAX_RE.replace_all(&text, "").into_owned()
    }
}

impl Cleaner for PageCleaner {
    fn clean(&self, raw: &str, page_number: u32) -> String {
        let text = Self::canonicalize(raw);

        if page_number <= FRONT_MATTER_MAX_PAGE && Self::is_front_matter(&text) {
            return String::new();
        }

        // Applied twice: merging short lines can expose new split-letter
        // runs and vice versa.
        let text = Self::repair_extraction_artifacts(&text);
        let text = Self::repair_extraction_artifacts(&text);

        let text = Self::strip_boilerplate(&text);
        let text = Self::collapse_whitespace(&text);
        let text = Self::strip_links(&text);
        let text = NON_ASCII_RE.replace_all(&text, "");

        text.trim().to_string()
    }

    fn name(&self) -> &'static str {
        "page"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str, page: u32) -> String {
        PageCleaner.clean(raw, page)
    }

    #[test]
    fn strips_document_header_and_page_token() {
        let raw = "3GPP TS 38.211 V16.2.0 (2020-07)\nPage 12\nHello  world";
        assert_eq!(clean(raw, 12), "Hello world");
    }

    #[test]
    fn discards_table_of_contents_on_early_pages() {
        let raw = "Table of Contents\n1. Intro ........ 3\n2. Scope ........ 5";
        assert_eq!(clean(raw, 2), "");
        // The same text past the front-matter window only loses boilerplate.
        assert_ne!(clean("Table of Contents\nActual body text here.", 9), "");
    }

    #[test]
    fn discards_dot_leader_pages() {
        let lines: Vec<String> = (1..=8)
            .map(|i| format!("{i}.1 Some section title ....... {}", i * 3))
            .collect();
        let raw = lines.join("\n");
        assert_eq!(clean(&raw, 3), "");
    }

    #[test]
    fn rejoins_split_letters() {
        assert_eq!(clean("the w o r d was split", 10), "the word was split");
    }

    #[test]
    fn merges_short_line_runs() {
        let raw = "alpha beta\ngamma\ndelta\nthe rest of this line is comfortably long enough";
        let cleaned = clean(raw, 10);
        assert!(cleaned.starts_with("alpha beta gamma delta"), "{cleaned}");
    }

    #[test]
    fn strips_copyright_block() {
        let raw = "Useful text.\nCopyright Notification\nNo part may be reproduced.\nAll rights reserved.\nMore useful text.";
        let cleaned = clean(raw, 10);
        assert!(cleaned.contains("Useful text."));
        assert!(cleaned.contains("More useful text."));
        assert!(!cleaned.contains("reproduced"));
    }

    #[test]
    fn strips_urls_and_domains() {
        let raw = "See https://example.com/spec and www.example.org or example.net for details";
        let cleaned = clean(raw, 10);
        assert!(!cleaned.contains("example"));
        assert!(cleaned.contains("for details"));
    }

    #[test]
    fn strips_non_ascii() {
        assert_eq!(clean("résumé ok 信道", 10), "rsum ok");
    }

    #[test]
    fn removes_solitary_numeric_lines_and_rules() {
        let raw = "Body line one\n42\n-----\nBody line two";
        let cleaned = clean(raw, 10);
        assert!(!cleaned.contains("42"), "{cleaned}");
        assert!(!cleaned.contains("-----"), "{cleaned}");
        assert!(cleaned.contains("Body line one"));
        assert!(cleaned.contains("Body line two"));
    }

    // The short-line merge must not swallow page numbers or rules into a
    // joined line where the line-anchored strippers cannot see them.
    #[test]
    fn numeric_lines_survive_short_line_merging_until_stripped() {
        let merged = PageCleaner::merge_short_lines("intro\n42\nmore\n");
        assert_eq!(merged, "intro\n42\nmore ");
    }

    #[test]
    fn never_fails_on_degenerate_input() {
        assert_eq!(clean("", 1), "");
        assert_eq!(clean("\n\n\n", 1), "");
        assert_eq!(clean("\u{0c}\u{0c}", 3), "");
    }

    #[test]
    fn idempotent_on_representative_inputs() {
        let inputs = [
            "3GPP TS 38.211 V16.2.0 (2020-07)\nPage 12\nHello  world",
            "the w o r d was split\n\n\n\nacross   lines",
            "1.2.3 Heading text 44\nBody paragraph that stays.\nRelease 16",
            "alpha\nbeta\ngamma\na longer line that will not be merged away",
            "",
        ];
        for raw in inputs {
            let once = clean(raw, 10);
            let twice = clean(&once, 10);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }
}
