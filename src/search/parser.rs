//! Raw search-term preprocessing.
//!
//! Pure string functions that run before the query parser sees the term:
//! `#tag` shorthand rewriting, match-all detection and the choice of which
//! index fields a term is searched against.

use once_cell::sync::Lazy;
use regex::Regex;

/// Term that matches every document, bypassing field parsing entirely.
pub const MATCH_ALL_TERM: &str = "*";

/// `#name` occurrences are rewritten to `tags:name` before parsing.
static TAG_SHORTHAND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z0-9_-]+").unwrap());

/// Index fields a query can be matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Content,
    Tags,
}

/// Trims the raw term and rewrites tag shorthand.
pub fn preprocess_term(raw: &str) -> String {
    rewrite_tag_shorthand(raw.trim())
}

pub fn is_match_all(term: &str) -> bool {
    term == MATCH_ALL_TERM
}

/// Rewrites every word-boundary `#name` occurrence to `tags:name`.
///
/// A `#` glued to other text (`foo#bar`, `"#quoted"`) is left alone; only
/// tokens preceded by start-of-term or whitespace and followed by
/// whitespace or end-of-term are rewritten.
fn rewrite_tag_shorthand(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    let mut cursor = 0;
    for token in TAG_SHORTHAND_RE.find_iter(term) {
        let preceded_ok = term[..token.start()]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace());
        let followed_ok = term[token.end()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace());
        if !preceded_ok || !followed_ok {
            continue;
        }
        out.push_str(&term[cursor..token.start()]);
        out.push_str("tags:");
        out.push_str(&token.as_str()[1..]);
        cursor = token.end();
    }
    out.push_str(&term[cursor..]);
    out
}

/// Fields to search for the given (already preprocessed) term.
///
/// A term containing a phrase only searches title and content: matching a
/// quoted phrase against atomic keyword tags would be meaningless.
pub fn fields_for_term(term: &str) -> Vec<SearchField> {
    let mut fields = vec![SearchField::Title, SearchField::Content];
    if !term.contains('"') {
        fields.push(SearchField::Tags);
    }
    fields
}
