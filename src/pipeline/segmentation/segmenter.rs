use std::sync::LazyLock;

use regex::Regex;

use crate::models::DocumentSegment;

/// Chapter and section headings, anchored at line start. An optional
/// Markdown `#` prefix is allowed.
static HEADING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 第三章 系统需求
        r"(?m)^(?:#+[ \t]*)?第[一二三四五六七八九十百零〇\d]+章[ \t]+[^\n]+",
        // 2.1 用户管理 / 2.1.1 用户注册
        r"(?m)^(?:#+[ \t]*)?\d+(?:\.\d+)+[ \t]+[^\n]+",
        // A.1 附录条目
        r"(?m)^(?:#+[ \t]*)?[A-Z]\.\d+[ \t]+[^\n]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid heading regex"))
    .collect()
});

/// Splits cleaned document text into bounded segments.
///
/// Chapter/section headings are preferred as boundaries. Any chapter still
/// longer than `max_segment_chars` is split again by whitespace tokens.
pub struct Segmenter {
    max_segment_chars: usize,
}

impl Segmenter {
    pub fn new(max_segment_chars: usize) -> Self {
        Self {
            max_segment_chars: max_segment_chars.max(1),
        }
    }

    pub fn segment(&self, text: &str, filename: &str) -> Vec<DocumentSegment> {
        let boundaries = heading_boundaries(text);
        if boundaries.is_empty() {
            return self.split_by_length(text, filename, filename);
        }

        let chapters = split_at_boundaries(text, boundaries, filename);

        let mut segments = Vec::with_capacity(chapters.len());
        for chapter in chapters {
            if chapter.char_len() > self.max_segment_chars {
                segments.extend(self.split_by_length(&chapter.text, &chapter.id, filename));
            } else {
                segments.push(chapter);
            }
        }
        segments
    }

    /// Greedy whitespace-token packing. Each token costs its length plus one
    /// separator; a segment closes when the next token would exceed the
    /// budget. Tokens longer than the budget are cut by characters.
    pub fn split_by_length(
        &self,
        text: &str,
        base_id: &str,
        original_file: &str,
    ) -> Vec<DocumentSegment> {
        let max = self.max_segment_chars;
        let mut segments = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for token in text.split_whitespace().flat_map(|t| cut_token(t, max)) {
            let token_len = token.chars().count() + 1;
            if current_len + token_len > max && !current.is_empty() {
                push_part(&mut segments, base_id, original_file, &current);
                current.clear();
                current_len = 0;
            }
            current.push(token);
            current_len += token_len;
        }

        if !current.is_empty() {
            push_part(&mut segments, base_id, original_file, &current);
        }

        segments
    }
}

fn push_part(segments: &mut Vec<DocumentSegment>, base_id: &str, original_file: &str, tokens: &[&str]) {
    let id = format!("{base_id}_part{}", segments.len() + 1);
    segments.push(DocumentSegment::new(id, tokens.join(" "), original_file));
}

/// Sorted, de-duplicated heading offsets plus the leading offset 0 and the
/// trailing text length. Empty when no heading matched.
fn heading_boundaries(text: &str) -> Vec<usize> {
    let mut positions: Vec<usize> = HEADING_PATTERNS
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.start()))
        .collect();

    if positions.is_empty() {
        return positions;
    }

    positions.sort_unstable();
    positions.dedup();

    // Text before the first heading is a segment of its own
    if positions[0] > 0 {
        positions.insert(0, 0);
    }
    positions.push(text.len());
    positions
}

fn split_at_boundaries(text: &str, boundaries: Vec<usize>, filename: &str) -> Vec<DocumentSegment> {
    let mut chapters = Vec::new();
    for window in boundaries.windows(2) {
        let span = text[window[0]..window[1]].trim();
        if span.is_empty() {
            continue;
        }
        let id = format!("{filename}_ch{}", chapters.len() + 1);
        chapters.push(DocumentSegment::new(id, span, filename));
    }
    chapters
}

/// Cut a token into pieces of at most `max` characters.
fn cut_token(token: &str, max: usize) -> Vec<&str> {
    if token.chars().count() <= max {
        return vec![token];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in token.char_indices() {
        if count == max {
            pieces.push(&token[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&token[start..]);
    pieces
}
