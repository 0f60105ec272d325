use std::sync::LazyLock;

use regex::Regex;

/// Lines shorter than this many characters are dropped.
const MIN_LINE_CHARS: usize = 3;

/// Boilerplate keywords are only checked on lines shorter than this.
const BOILERPLATE_LINE_MAX_CHARS: usize = 50;

static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)机密|保密|第\s*\d+\s*页|共\s*\d+\s*页|copyright|©|confidential|header|footer|页眉|页脚",
    )
    .expect("valid boilerplate regex")
});

static PAGE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-\s]*\d+[-\s]*$").expect("valid page number regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip header/footer boilerplate and normalise whitespace.
///
/// Line order is preserved; paragraphs are not reflowed.
pub fn clean_text(raw: &str) -> String {
    raw.lines()
        .map(|line| strip_control_chars(line.trim()))
        .filter(|line| line.chars().count() >= MIN_LINE_CHARS)
        .filter(|line| !is_boilerplate(line))
        .map(|line| WHITESPACE_RUN.replace_all(&line, " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_control_chars(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect()
}

fn is_boilerplate(line: &str) -> bool {
    if line.chars().count() < BOILERPLATE_LINE_MAX_CHARS && BOILERPLATE.is_match(line) {
        return true;
    }
    PAGE_NUMBER.is_match(line)
}
