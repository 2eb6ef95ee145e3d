//! Tag extraction from note content.
//!
//! Tags are `#name` tokens written inline in the note body. Extraction is a
//! pure two-pass pipeline: code spans are masked out first so a `#` inside
//! backticks is never treated as a tag, then the remaining candidates are
//! boundary-checked and stripped from the text.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Inline or fenced code, one to three backticks, non-greedy across lines.
static CODE_SPAN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)`{1,3}.*?`{1,3}").unwrap());

/// A `#` followed by a tag name. Boundary checks happen separately because
/// the regex crate has no lookaround.
static TAG_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z0-9_-]+").unwrap());

/// Strips tags from `text` and returns the cleaned text together with the
/// lowercased set of tag names (without the `#`).
///
/// A token only counts as a tag when it sits at the start of the text or
/// after whitespace, and is followed by whitespace or the end of the text.
/// Re-running extraction on the cleaned text yields an empty tag set.
pub fn extract(text: &str) -> (String, BTreeSet<String>) {
    let masked = mask_code_spans(text);

    let mut tags = BTreeSet::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    for token in TAG_TOKEN_RE.find_iter(&masked) {
        if !open_boundary(&masked, token.start()) || !close_boundary(&masked, token.end()) {
            continue;
        }
        tags.insert(token.as_str()[1..].to_lowercase());
        spans.push(expand_span(text, token.start(), token.end()));
    }

    (remove_spans(text, spans), tags)
}

/// Replaces every code span with a same-length NUL filler so byte offsets
/// computed on the masked text line up with the original.
fn mask_code_spans(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut last = 0;
    for span in CODE_SPAN_RE.find_iter(text) {
        masked.push_str(&text[last..span.start()]);
        masked.extend(std::iter::repeat('\0').take(span.end() - span.start()));
        last = span.end();
    }
    masked.push_str(&text[last..]);
    masked
}

fn open_boundary(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| c.is_whitespace())
}

fn close_boundary(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .map_or(true, |c| c.is_whitespace())
}

/// Widens a tag token span to swallow one adjacent whitespace run, so that
/// stripping `#tag` does not leave doubled spaces behind.
fn expand_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let before = &text[..start];
    let ws_before = before.len() - before.trim_end().len();
    if ws_before > 0 {
        return (start - ws_before, end);
    }
    let after = &text[end..];
    let ws_after = after.len() - after.trim_start().len();
    (start, end + ws_after)
}

fn remove_spans(text: &str, mut spans: Vec<(usize, usize)>) -> String {
    spans.sort_unstable();
    let mut clean = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        if start > cursor {
            clean.push_str(&text[cursor..start]);
        }
        cursor = cursor.max(end);
    }
    clean.push_str(&text[cursor..]);
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn extracts_and_strips_tags() {
        let (clean, tags) = extract("Buy milk #shopping #todo");
        assert_eq!(clean, "Buy milk");
        assert_eq!(tags, tag_set(&["shopping", "todo"]));
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let (clean, tags) = extract("#Work notes #WORK #work");
        assert_eq!(clean, "notes");
        assert_eq!(tags, tag_set(&["work"]));
    }

    #[test]
    fn hash_inside_code_is_not_a_tag() {
        let (clean, tags) = extract("see `#notatag` and ```\n#alsonot\n``` but #real");
        assert!(clean.contains("`#notatag`"));
        assert!(clean.contains("#alsonot"));
        assert_eq!(tags, tag_set(&["real"]));
    }

    #[test]
    fn mid_word_hash_is_not_a_tag() {
        let (clean, tags) = extract("issue#42 stays");
        assert_eq!(clean, "issue#42 stays");
        assert!(tags.is_empty());
    }

    #[test]
    fn punctuation_after_token_disqualifies_it() {
        let (clean, tags) = extract("really #important!");
        assert_eq!(clean, "really #important!");
        assert!(tags.is_empty());
    }

    #[test]
    fn tag_at_start_of_text() {
        let (clean, tags) = extract("#inbox call the bank");
        assert_eq!(clean, "call the bank");
        assert_eq!(tags, tag_set(&["inbox"]));
    }

    #[test]
    fn extraction_is_idempotent() {
        let (clean, tags) = extract("alpha #one beta #two");
        assert_eq!(tags.len(), 2);
        let (clean_again, tags_again) = extract(&clean);
        assert_eq!(clean_again, clean);
        assert!(tags_again.is_empty());
    }

    #[test]
    fn tags_on_their_own_lines() {
        let (clean, tags) = extract("line one\n#first\nline two #second\n");
        assert_eq!(tags, tag_set(&["first", "second"]));
        assert!(!clean.contains('#'));
    }
}
