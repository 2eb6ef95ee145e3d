//! Persistent full-text index over the note vault.
//!
//! One tantivy document per note, keyed by the storage key. Mutations go
//! through a [`WriteBatch`] and become visible to readers only after
//! [`SearchIndex::commit`]; an optimizing commit additionally merges all
//! segments, which is the point where terms of deleted notes are physically
//! reclaimed.

pub mod highlight;
pub mod parser;
pub mod sync;

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, Query, QueryParser};
use tantivy::schema::{
    DateOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer,
    Stemmer, TextAnalyzer,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError, Term};

use crate::error::{Error, Result};
use crate::models::{SearchResult, SortBy, SortOrder};
use crate::storage::NoteStorage;
use highlight::Highlighter;
use parser::SearchField;

/// Current index schema version. Bumping it discards any existing index on
/// open and triggers a full rebuild from storage.
const SCHEMA_VERSION: u32 = 1;

const METADATA_FILE: &str = "notemill_meta.json";
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Stemming + accent-folding analyzer for title and content.
const TOKENIZER_TEXT: &str = "en_stem_fold";
/// Raw keyword analyzer (lowercasing only) for tags.
const TOKENIZER_TAG: &str = "tag_lower";

/// Sidecar metadata used for schema-version checking.
#[derive(Serialize, Deserialize)]
struct IndexMetadata {
    schema_version: u32,
    created_at: String,
}

impl IndexMetadata {
    fn current() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

/// The index's representation of a note, ready to be written.
#[derive(Debug, Clone)]
pub struct IndexedNote {
    pub key: String,
    pub title: String,
    pub last_modified: DateTime<Utc>,
    /// Note content with tag tokens already stripped.
    pub content: String,
    pub tags: BTreeSet<String>,
}

/// A parsed query plus the metadata downstream stages need.
pub struct QueryPlan {
    pub(crate) query: Box<dyn Query>,
    /// Fields the term was eligible to match, independent of what a
    /// specific hit actually matched.
    pub fields: Vec<SearchField>,
    pub match_all: bool,
}

/// A hit before highlighting: stored fields plus the raw score.
pub(crate) struct RawHit {
    pub score: f32,
    pub key: String,
    pub title: String,
    pub last_modified: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Buffered index mutations. Holds the exclusive writer lock until the
/// batch is committed (or dropped).
pub struct WriteBatch<'a> {
    index: &'a SearchIndex,
    writer: IndexWriter,
}

impl WriteBatch<'_> {
    /// Inserts the document for `note.key`, replacing any existing one.
    pub fn upsert(&mut self, note: &IndexedNote) -> Result<()> {
        self.writer
            .delete_term(Term::from_field_text(self.index.f_key, &note.key));

        let mut doc = TantivyDocument::new();
        doc.add_text(self.index.f_key, &note.key);
        doc.add_date(self.index.f_last_modified, to_index_time(note.last_modified));
        doc.add_text(self.index.f_title, &note.title);
        doc.add_text(self.index.f_content, &note.content);
        for tag in &note.tags {
            doc.add_text(self.index.f_tags, tag);
        }
        self.writer.add_document(doc)?;
        Ok(())
    }

    pub fn delete(&mut self, key: &str) {
        self.writer
            .delete_term(Term::from_field_text(self.index.f_key, key));
    }

    /// Drops every document in the index.
    pub fn clear(&mut self) -> Result<()> {
        self.writer.delete_all_documents()?;
        Ok(())
    }
}

pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    pub(crate) f_key: Field,
    pub(crate) f_last_modified: Field,
    pub(crate) f_title: Field,
    pub(crate) f_content: Field,
    pub(crate) f_tags: Field,
}

impl SearchIndex {
    /// Opens the index in `index_dir`, creating it if needed.
    ///
    /// An existing index with a different schema version (or unreadable
    /// metadata) is deleted and recreated empty; the next sync pass rebuilds
    /// it from storage. There is no migration path across versions.
    pub fn open(index_dir: &Path) -> Result<Self> {
        if Self::needs_rebuild(index_dir) {
            log::warn!("deleting outdated index at {:?}", index_dir);
            let _ = fs::remove_dir_all(index_dir);
        }

        let index = if index_dir.join("meta.json").exists() {
            match Index::open_in_dir(index_dir) {
                Ok(index) => index,
                Err(err) => {
                    // A damaged index is rebuilt rather than repaired, same
                    // as a schema-version mismatch.
                    log::warn!("failed to open index ({}), recreating", err);
                    fs::remove_dir_all(index_dir)?;
                    Self::create_index(index_dir)?
                }
            }
        } else {
            log::info!("creating new index at {:?}", index_dir);
            Self::create_index(index_dir)?
        };

        Self::register_tokenizers(&index);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let schema = index.schema();
        Ok(Self {
            f_key: schema.get_field("key")?,
            f_last_modified: schema.get_field("last_modified")?,
            f_title: schema.get_field("title")?,
            f_content: schema.get_field("content")?,
            f_tags: schema.get_field("tags")?,
            index,
            reader,
        })
    }

    /// Creates an empty index with the current schema and stamps its
    /// version sidecar.
    fn create_index(index_dir: &Path) -> Result<Index> {
        fs::create_dir_all(index_dir)?;
        let index = Index::create_in_dir(index_dir, Self::build_schema())?;
        Self::write_metadata(index_dir)?;
        Ok(index)
    }

    fn build_schema() -> Schema {
        let mut builder = Schema::builder();

        let keyword = TextOptions::default()
            .set_indexing_options(TextFieldIndexing::default().set_tokenizer("raw"))
            .set_stored();
        let tag_keyword = TextOptions::default()
            .set_indexing_options(TextFieldIndexing::default().set_tokenizer(TOKENIZER_TAG))
            .set_stored();
        let analyzed = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER_TEXT)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);

        builder.add_text_field("key", keyword);
        // Date-range queries read the fast column.
        builder.add_date_field(
            "last_modified",
            DateOptions::default().set_indexed().set_stored().set_fast(),
        );
        builder.add_text_field(
            "title",
            TextOptions::default()
                .set_indexing_options(analyzed.clone())
                .set_stored(),
        );
        // Content is deliberately not stored: highlighting re-reads the live
        // note from storage instead.
        builder.add_text_field(
            "content",
            TextOptions::default().set_indexing_options(analyzed),
        );
        builder.add_text_field("tags", tag_keyword);

        builder.build()
    }

    fn register_tokenizers(index: &Index) {
        let text = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(AsciiFoldingFilter)
            .filter(Stemmer::new(Language::English))
            .build();
        index.tokenizers().register(TOKENIZER_TEXT, text);

        let tag = TextAnalyzer::builder(RawTokenizer::default())
            .filter(LowerCaser)
            .build();
        index.tokenizers().register(TOKENIZER_TAG, tag);
    }

    fn metadata_path(index_dir: &Path) -> PathBuf {
        index_dir.join(METADATA_FILE)
    }

    /// An index directory without readable, version-compatible metadata has
    /// to be regenerated.
    fn needs_rebuild(index_dir: &Path) -> bool {
        if !index_dir.exists() {
            return false;
        }
        let metadata = fs::read_to_string(Self::metadata_path(index_dir))
            .ok()
            .and_then(|raw| serde_json::from_str::<IndexMetadata>(&raw).ok());
        match metadata {
            Some(metadata) if metadata.is_compatible() => false,
            Some(metadata) => {
                log::warn!(
                    "index schema version mismatch: found {}, expected {}",
                    metadata.schema_version,
                    SCHEMA_VERSION
                );
                true
            }
            None => {
                log::warn!("index metadata missing or unreadable");
                true
            }
        }
    }

    fn write_metadata(index_dir: &Path) -> Result<()> {
        let metadata = serde_json::to_string_pretty(&IndexMetadata::current())
            .map_err(|e| Error::Config(format!("failed to serialize index metadata: {}", e)))?;
        fs::write(Self::metadata_path(index_dir), metadata)?;
        Ok(())
    }

    /// Opens a write transaction, acquiring the exclusive writer lock.
    ///
    /// Returns [`Error::IndexLocked`] when another writer already holds it;
    /// the caller decides whether to retry.
    pub fn begin_write(&self) -> Result<WriteBatch<'_>> {
        let writer = self.index.writer(WRITER_HEAP_BYTES).map_err(|e| match e {
            TantivyError::LockFailure(..) => Error::IndexLocked,
            other => Error::Index(other),
        })?;
        Ok(WriteBatch {
            index: self,
            writer,
        })
    }

    /// Commits a batch, making its mutations visible to readers.
    ///
    /// With `optimize` set, all searchable segments are merged into one.
    /// Merging drops deleted documents for good, so this is also the only
    /// point at which tag terms of deleted or edited notes disappear from
    /// [`Self::tag_terms`].
    pub fn commit(&self, batch: WriteBatch<'_>, optimize: bool) -> Result<()> {
        let WriteBatch { mut writer, .. } = batch;
        writer.commit()?;
        if optimize {
            let segments = self.index.searchable_segment_ids()?;
            if !segments.is_empty() {
                writer.merge(&segments).wait()?;
            }
        }
        writer.wait_merging_threads()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Key and stored modification time of every live document.
    pub fn stored_entries(&self) -> Result<Vec<(String, DateTime<Utc>)>> {
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let docs = searcher.search(&AllQuery, &TopDocs::with_limit(total))?;
        let mut entries = Vec::with_capacity(docs.len());
        for (_score, address) in docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let key = doc
                .get_first(self.f_key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let modified = doc
                .get_first(self.f_last_modified)
                .and_then(|v| v.as_datetime())
                .map(from_index_time)
                .unwrap_or(DateTime::UNIX_EPOCH);
            entries.push((key, modified));
        }
        Ok(entries)
    }

    /// Every term in the tags field, sorted.
    ///
    /// Walks the term dictionaries of all segments, so tags of deleted or
    /// edited notes linger here until an optimizing commit rewrites the
    /// segments.
    pub fn tag_terms(&self) -> Result<Vec<String>> {
        let searcher = self.reader.searcher();
        let mut terms = BTreeSet::new();
        for segment in searcher.segment_readers() {
            let inverted = segment.inverted_index(self.f_tags)?;
            let mut stream = inverted.terms().stream()?;
            while stream.advance() {
                if let Ok(term) = std::str::from_utf8(stream.key()) {
                    terms.insert(term.to_string());
                }
            }
        }
        Ok(terms.into_iter().collect())
    }

    /// Turns a raw search term into an executable plan.
    pub fn build_query(&self, raw_term: &str) -> Result<QueryPlan> {
        let term = parser::preprocess_term(raw_term);
        if parser::is_match_all(&term) {
            return Ok(QueryPlan {
                query: Box::new(AllQuery),
                fields: Vec::new(),
                match_all: true,
            });
        }

        let fields = parser::fields_for_term(&term);
        let default_fields = fields.iter().map(|f| self.field_handle(*f)).collect();
        let mut query_parser = QueryParser::for_index(&self.index, default_fields);
        query_parser.set_conjunction_by_default();
        query_parser.set_field_boost(self.f_title, 2.0);
        if fields.contains(&SearchField::Tags) {
            query_parser.set_field_boost(self.f_tags, 2.0);
        }

        let query = query_parser.parse_query(&term)?;
        Ok(QueryPlan {
            query,
            fields,
            match_all: false,
        })
    }

    pub(crate) fn field_handle(&self, field: SearchField) -> Field {
        match field {
            SearchField::Title => self.f_title,
            SearchField::Content => self.f_content,
            SearchField::Tags => self.f_tags,
        }
    }

    /// Executes a plan and returns ordered, highlighted results.
    ///
    /// `limit: None` means unbounded. Ties within an identical score or
    /// field value keep a stable, repeatable order.
    pub fn search(
        &self,
        plan: &QueryPlan,
        sort: SortBy,
        order: SortOrder,
        limit: Option<usize>,
        storage: &dyn NoteStorage,
    ) -> Result<Vec<SearchResult>> {
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        let requested = limit.unwrap_or(total).min(total);
        if requested == 0 {
            return Ok(Vec::new());
        }

        // The relevance collector's natural order is score-descending while
        // field sorts run ascending, so the caller's direction flag has to
        // be inverted for score sorts to keep "asc"/"desc" meaning
        // ascending/descending on whichever axis was chosen.
        let mut reverse = matches!(order, SortOrder::Desc);
        if matches!(sort, SortBy::Score) {
            reverse = !reverse;
        }

        // Truncation must happen after ordering, so anything other than the
        // collector's native order collects the full candidate set first.
        let fetch = if matches!(sort, SortBy::Score) && !reverse {
            requested
        } else {
            total
        };

        let top_docs = searcher.search(plan.query.as_ref(), &TopDocs::with_limit(fetch))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(self.raw_hit(&doc, score));
        }

        match sort {
            SortBy::Score => {
                if reverse {
                    hits.reverse();
                }
            }
            SortBy::Title => hits.sort_by(|a, b| {
                let cmp = a.title.to_lowercase().cmp(&b.title.to_lowercase());
                if reverse {
                    cmp.reverse()
                } else {
                    cmp
                }
            }),
            SortBy::LastModified => hits.sort_by(|a, b| {
                let cmp = a.last_modified.cmp(&b.last_modified);
                if reverse {
                    cmp.reverse()
                } else {
                    cmp
                }
            }),
        }
        hits.truncate(requested);

        let scored = matches!(sort, SortBy::Score) && !plan.match_all;
        let highlighter = Highlighter::new(self, &searcher, plan, storage)?;
        hits.iter()
            .map(|hit| highlighter.apply(hit, scored))
            .collect()
    }

    fn raw_hit(&self, doc: &TantivyDocument, score: f32) -> RawHit {
        let key = doc
            .get_first(self.f_key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let title = doc
            .get_first(self.f_title)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let last_modified = doc
            .get_first(self.f_last_modified)
            .and_then(|v| v.as_datetime())
            .map(from_index_time)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let tags: Vec<String> = doc
            .get_all(self.f_tags)
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
        RawHit {
            score,
            key,
            title,
            last_modified,
            tags,
        }
    }

    /// Whether the plan's query references any term of the given field.
    pub(crate) fn query_references(&self, plan: &QueryPlan, field: Field) -> bool {
        let mut found = false;
        plan.query.query_terms(&mut |term: &Term, _pos| {
            if term.field() == field {
                found = true;
            }
        });
        found
    }

    /// Tag terms referenced by the plan's query, for match reporting.
    pub(crate) fn queried_tags(&self, plan: &QueryPlan) -> HashSet<String> {
        let mut terms = HashSet::new();
        plan.query.query_terms(&mut |term: &Term, _pos| {
            if term.field() == self.f_tags {
                if let Some(text) = term.value().as_str() {
                    terms.insert(text.to_string());
                }
            }
        });
        terms
    }
}

/// Timestamps are carried at microsecond precision end to end; the
/// staleness check in sync compares these converted values for equality.
pub(crate) fn to_index_time(time: DateTime<Utc>) -> tantivy::DateTime {
    tantivy::DateTime::from_timestamp_micros(time.timestamp_micros())
}

pub(crate) fn from_index_time(time: tantivy::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(time.into_timestamp_micros()).unwrap_or(DateTime::UNIX_EPOCH)
}
