//! Highlight assembly for search hits.
//!
//! A hit only gets a highlight for the fields it actually matched: the
//! whole title with matched terms marked, a bounded context window over the
//! live note content, and the verbatim list of matched tags. Fields that
//! did not match stay absent rather than empty.

use std::collections::HashSet;

use tantivy::snippet::SnippetGenerator;
use tantivy::Searcher;

use crate::error::Result;
use crate::models::SearchResult;
use crate::search::parser::SearchField;
use crate::search::{QueryPlan, RawHit, SearchIndex};
use crate::storage::NoteStorage;
use crate::tags;

/// Context window size for content fragments.
const CONTENT_MAX_CHARS: usize = 150;
/// Titles are short, so this effectively renders the whole field.
const TITLE_MAX_CHARS: usize = 1_000;

pub(crate) struct Highlighter<'a> {
    storage: &'a dyn NoteStorage,
    title_snippets: Option<SnippetGenerator>,
    content_snippets: Option<SnippetGenerator>,
    queried_tags: HashSet<String>,
}

impl<'a> Highlighter<'a> {
    pub fn new(
        index: &SearchIndex,
        searcher: &Searcher,
        plan: &QueryPlan,
        storage: &'a dyn NoteStorage,
    ) -> Result<Self> {
        let mut title_snippets = None;
        let mut content_snippets = None;
        let mut queried_tags = HashSet::new();

        if !plan.match_all {
            if plan.fields.contains(&SearchField::Title)
                && index.query_references(plan, index.f_title)
            {
                let mut generator =
                    SnippetGenerator::create(searcher, plan.query.as_ref(), index.f_title)?;
                generator.set_max_num_chars(TITLE_MAX_CHARS);
                title_snippets = Some(generator);
            }
            // Re-reading note content is only worth it when the query can
            // actually touch the content field.
            if plan.fields.contains(&SearchField::Content)
                && index.query_references(plan, index.f_content)
            {
                let mut generator =
                    SnippetGenerator::create(searcher, plan.query.as_ref(), index.f_content)?;
                generator.set_max_num_chars(CONTENT_MAX_CHARS);
                content_snippets = Some(generator);
            }
            if plan.fields.contains(&SearchField::Tags) {
                queried_tags = index.queried_tags(plan);
            }
        }

        Ok(Self {
            storage,
            title_snippets,
            content_snippets,
            queried_tags,
        })
    }

    /// Builds the caller-facing result for one hit.
    pub fn apply(&self, hit: &RawHit, scored: bool) -> Result<SearchResult> {
        let title_highlights = match &self.title_snippets {
            Some(generator) => render(generator.snippet(&hit.title)),
            None => None,
        };

        let content_highlights = match &self.content_snippets {
            Some(generator) => {
                // Tags must never show up inside content fragments, so the
                // live content is stripped the same way it was at indexing.
                let raw = self.storage.read(&hit.key)?;
                let (clean, _) = tags::extract(&raw);
                render(generator.snippet(&clean))
            }
            None => None,
        };

        let tag_matches = if self.queried_tags.is_empty() {
            None
        } else {
            let matched: Vec<String> = hit
                .tags
                .iter()
                .filter(|tag| self.queried_tags.contains(*tag))
                .cloned()
                .collect();
            if matched.is_empty() {
                None
            } else {
                Some(matched)
            }
        };

        Ok(SearchResult {
            title: hit.title.clone(),
            last_modified: hit.last_modified,
            score: if scored { Some(hit.score) } else { None },
            title_highlights,
            content_highlights,
            tag_matches,
        })
    }
}

/// A snippet with no highlighted ranges means the field did not match.
fn render(snippet: tantivy::snippet::Snippet) -> Option<String> {
    if snippet.highlighted().is_empty() {
        None
    } else {
        Some(snippet.to_html())
    }
}
