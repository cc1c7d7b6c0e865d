//! Inverted full-text index over passages (§4.4 Lexical searcher), backed by
//! Tantivy. Unlike the teacher's `en_stem` field, tokenization here is
//! Unicode-simple, case-folded, and does not stem or strip diacritics — the
//! spec requires exact (if case-insensitive) lexical matching.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, STORED,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer};
use tantivy::{Index, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::error::{Error, Result, SearchError};
use crate::store::{Passage, PassageId};

/// Name registered for the custom tokenizer (simple split + lowercase, no
/// stemming, no diacritic folding).
const TOKENIZER_NAME: &str = "mdvdb_simple";

/// A single lexical search result.
#[derive(Debug, Clone)]
pub struct FtsResult {
    pub passage_id: PassageId,
    /// BM25 relevance score from Tantivy.
    pub score: f32,
}

struct FtsFields {
    passage_id: Field,
    file_path: Field,
    content: Field,
    heading: Field,
}

/// Wrapper around a Tantivy index for full-text search over passages.
pub struct FtsIndex {
    index: Index,
    fields: FtsFields,
    writer: parking_lot::Mutex<IndexWriter>,
}

impl FtsIndex {
    /// Open an existing Tantivy index or create a new one at the given directory.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let (schema, fields) = build_schema();

        let index = if path.exists() && path.join("meta.json").exists() {
            Index::open_in_dir(path).map_err(|e| Error::Search(SearchError::Index(e.to_string())))?
        } else {
            std::fs::create_dir_all(path)?;
            Index::create_in_dir(path, schema)
                .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?
        };

        index.tokenizers().register(
            TOKENIZER_NAME,
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(LowerCaser)
                .build(),
        );

        let writer = index
            .writer(50_000_000)
            .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;

        Ok(Self {
            index,
            fields,
            writer: parking_lot::Mutex::new(writer),
        })
    }

    /// Upsert a single passage: deletes any existing document for its id,
    /// then adds the current content. Call [`commit`] afterwards.
    pub fn upsert_passage(&self, passage: &Passage) -> Result<()> {
        let writer = self.writer.lock();
        let term = tantivy::Term::from_field_u64(self.fields.passage_id, passage.id);
        writer.delete_term(term);

        let plain_content = strip_markdown(&passage.content);

        let mut doc = TantivyDocument::new();
        doc.add_u64(self.fields.passage_id, passage.id);
        doc.add_text(self.fields.file_path, &passage.file_path);
        doc.add_text(self.fields.content, &plain_content);
        doc.add_text(self.fields.heading, passage.heading.as_deref().unwrap_or(""));
        writer
            .add_document(doc)
            .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;
        Ok(())
    }

    /// Remove every passage document belonging to `file_path`. Call
    /// [`commit`] afterwards.
    pub fn remove_file(&self, file_path: &str) -> Result<()> {
        let writer = self.writer.lock();
        let term = tantivy::Term::from_field_text(self.fields.file_path, file_path);
        writer.delete_term(term);
        Ok(())
    }

    /// Search the index, returning up to `limit` lexical candidates sorted
    /// by BM25 score descending (§4.4). Field weights favor heading and
    /// file_path over body content.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<FtsResult>> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Search(SearchError::Index(e.to_string())))?;

        let searcher = reader.searcher();

        let mut query_parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.content, self.fields.heading, self.fields.file_path],
        );
        query_parser.set_field_boost(self.fields.heading, 2.0);
        query_parser.set_field_boost(self.fields.file_path, 1.5);

        let (query, _errors) = query_parser.parse_query_lenient(query_str);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;
            if let Some(passage_id) = doc.get_first(self.fields.passage_id).and_then(|v| v.as_u64()) {
                results.push(FtsResult { passage_id, score });
            }
        }
        Ok(results)
    }

    /// Commit all pending writes to the index and reload the reader.
    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;
        Ok(())
    }

    /// Return the number of documents in the index.
    pub fn num_docs(&self) -> Result<u64> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Search(SearchError::Index(e.to_string())))?;
        Ok(reader.searcher().num_docs())
    }

    /// Delete all documents from the index (used by full reindex).
    pub fn delete_all(&self) -> Result<()> {
        let writer = self.writer.lock();
        writer
            .delete_all_documents()
            .map_err(|e| Error::Search(SearchError::Index(e.to_string())))?;
        Ok(())
    }
}

fn build_schema() -> (Schema, FtsFields) {
    let mut builder = Schema::builder();

    let passage_id = builder.add_u64_field("passage_id", FAST | STORED);

    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(TOKENIZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(text_indexing);

    let file_path = builder.add_text_field("file_path", text_options.clone().set_stored());
    let content = builder.add_text_field("content", text_options.clone());
    let heading = builder.add_text_field("heading", text_options);

    let schema = builder.build();
    (
        schema,
        FtsFields {
            passage_id,
            file_path,
            content,
            heading,
        },
    )
}

/// Strip markdown formatting from content, returning plain text for indexing.
pub fn strip_markdown(content: &str) -> String {
    use pulldown_cmark::{Event, Parser};

    let parser = Parser::new(content);
    let mut text = String::new();
    for event in parser {
        match event {
            Event::Text(t) => text.push_str(&t),
            Event::Code(c) => text.push_str(&c),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}
