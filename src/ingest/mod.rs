//! Ingestion pipeline (§4.1): discover → parse → split into passages →
//! hash-check → upsert into the Store, deletion-and-reinsert on change.

pub mod discovery;
pub mod parser;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::fts::FtsIndex;
use crate::store::{FileRow, Passage, Store};

use discovery::FileDiscovery;
use parser::{compute_content_hash, split_passages};

/// Result of ingesting the corpus (full or incremental).
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
    pub passages_written: usize,
}

/// Run a full ingestion pass: discover every corpus file, re-split and
/// upsert any whose content hash changed, leave the rest untouched.
///
/// Files whose content is unchanged since the last build are skipped
/// entirely — no passages are recomputed and no embeddings are invalidated
/// (§4.1 step 4, §8 "Unchanged file" boundary case).
pub async fn ingest_corpus(config: &Config, store: &Store, fts: &FtsIndex) -> Result<IngestReport> {
    let discovered = FileDiscovery::new(config).discover()?;
    let mut build = store.begin_build()?;

    let mut files_changed = 0usize;
    let mut files_unchanged = 0usize;
    let mut passages_written = 0usize;

    for relative_path in &discovered {
        let rel_str = relative_path.to_string_lossy().to_string();
        let absolute = config.corpus_root.join(relative_path);

        let bytes = fs::read(&absolute).map_err(|source| IngestError::Io {
            path: relative_path.clone(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| IngestError::Decode {
            path: relative_path.clone(),
        })?;

        let hash = compute_content_hash(&text);
        let unchanged = build
            .draft
            .files
            .iter()
            .any(|f| f.path == rel_str && f.hash == hash);
        if unchanged {
            debug!(path = %rel_str, "unchanged, skipping");
            files_unchanged += 1;
            continue;
        }

        remove_file_passages(&mut build.draft, fts, &rel_str)?;

        let metadata = fs::metadata(&absolute).map_err(|source| IngestError::Io {
            path: relative_path.clone(),
            source,
        })?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        build.draft.files.retain(|f| f.path != rel_str);
        build.draft.files.push(FileRow {
            path: rel_str.clone(),
            mtime,
            size: metadata.len(),
            hash,
        });

        let raw_passages = split_passages(&text);
        for raw in &raw_passages {
            let id = build.draft.next_passage_id;
            build.draft.next_passage_id += 1;

            let passage = Passage {
                id,
                file_path: rel_str.clone(),
                heading: raw.heading.clone(),
                ordinal: raw.ordinal,
                content: raw.content.clone(),
                content_len: raw.content.len() as u32,
            };
            fts.upsert_passage(&passage)?;
            build.draft.passages.push(passage);
            passages_written += 1;
        }

        files_changed += 1;
        info!(path = %rel_str, passages = raw_passages.len(), "file ingested");
    }

    remove_deleted_files(&mut build.draft, fts, &discovered, config)?;

    fts.commit()?;
    build.commit()?;

    Ok(IngestReport {
        files_scanned: discovered.len(),
        files_changed,
        files_unchanged,
        passages_written,
    })
}

/// Drop every passage (and its embedding and FTS postings) belonging to
/// `file_path`, in preparation for reinsertion with fresh ordinals.
fn remove_file_passages(
    draft: &mut crate::store::StoreMetadata,
    fts: &FtsIndex,
    file_path: &str,
) -> Result<()> {
    let removed_ids: Vec<_> = draft
        .passages
        .iter()
        .filter(|p| p.file_path == file_path)
        .map(|p| p.id)
        .collect();

    draft.passages.retain(|p| p.file_path != file_path);
    draft.embeddings.retain(|e| !removed_ids.contains(&e.passage_id));
    draft
        .cluster_members
        .retain(|(_, passage_id)| !removed_ids.contains(passage_id));
    fts.remove_file(file_path)?;
    Ok(())
}

/// Remove any previously-ingested file that no longer exists under the
/// corpus root (full reindex semantics: deletions are only observed here).
fn remove_deleted_files(
    draft: &mut crate::store::StoreMetadata,
    fts: &FtsIndex,
    discovered: &[PathBuf],
    config: &Config,
) -> Result<()> {
    let discovered_set: std::collections::HashSet<String> = discovered
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();

    let stale: Vec<String> = draft
        .files
        .iter()
        .map(|f| f.path.clone())
        .filter(|path| !discovered_set.contains(path))
        .collect();

    for path in stale {
        warn!(path = %path, root = %config.corpus_root.display(), "file removed from corpus, dropping");
        remove_file_passages(draft, fts, &path)?;
        draft.files.retain(|f| f.path != path);
        draft.file_modules.retain(|fm| fm.file_path != path);
    }
    Ok(())
}

/// Ingest a single file by relative path, independent of the rest of the
/// corpus — used by the CLI's `ingest --file` flag.
pub async fn ingest_file(config: &Config, store: &Store, fts: &FtsIndex, relative_path: &Path) -> Result<()> {
    let rel_str = relative_path.to_string_lossy().to_string();
    let absolute = config.corpus_root.join(relative_path);

    let bytes = fs::read(&absolute).map_err(|source| IngestError::Io {
        path: relative_path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| IngestError::Decode {
        path: relative_path.to_path_buf(),
    })?;
    let hash = compute_content_hash(&text);

    let mut build = store.begin_build()?;
    let unchanged = build
        .draft
        .files
        .iter()
        .any(|f| f.path == rel_str && f.hash == hash);
    if unchanged {
        debug!(path = %rel_str, "unchanged, skipping");
        return Ok(());
    }

    remove_file_passages(&mut build.draft, fts, &rel_str)?;
    build.draft.files.retain(|f| f.path != rel_str);
    build.draft.files.push(FileRow {
        path: rel_str.clone(),
        mtime: 0,
        size: text.len() as u64,
        hash,
    });

    for raw in split_passages(&text) {
        let id = build.draft.next_passage_id;
        build.draft.next_passage_id += 1;
        let passage = Passage {
            id,
            file_path: rel_str.clone(),
            heading: raw.heading,
            ordinal: raw.ordinal,
            content: raw.content.clone(),
            content_len: raw.content.len() as u32,
        };
        fts.upsert_passage(&passage)?;
        build.draft.passages.push(passage);
    }

    fts.commit()?;
    build.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedderBackend;
    use tempfile::TempDir;

    fn test_config(corpus_root: PathBuf, store_path: PathBuf, fts_dir: PathBuf) -> Config {
        Config {
            corpus_root,
            extensions: vec!["md".to_string()],
            store_path,
            fts_index_dir: fts_dir,
            ignore_patterns: vec![],
            embedder_backend: EmbedderBackend::Mock,
            embedder_model: "mock-embed-v1".to_string(),
            embedder_dimensions: 16,
            embedder_endpoint: None,
            embedder_api_key: None,
            embedder_batch_size: 8,
            fts_k: 50,
            cluster_k_min: 8,
            cluster_k_max: 128,
            request_deadline_ms: 5000,
            worker_concurrency: 2,
            queue_capacity_multiplier: 2,
        }
    }

    #[tokio::test]
    async fn ingest_corpus_splits_and_persists_passages() {
        let corpus = TempDir::new().unwrap();
        std::fs::write(
            corpus.path().join("a.md"),
            "# Linked Lists\n\npointer chasing\n\n# TCP\n\npacket delivery",
        )
        .unwrap();
        let work = TempDir::new().unwrap();
        let config = test_config(
            corpus.path().to_path_buf(),
            work.path().join("store.bin"),
            work.path().join("fts"),
        );

        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();

        let report = ingest_corpus(&config, &store, &fts).await.unwrap();
        assert_eq!(report.files_changed, 1);
        assert_eq!(report.passages_written, 2);

        let snap = store.snapshot();
        assert_eq!(snap.passages.len(), 2);
        assert_eq!(snap.files.len(), 1);
    }

    #[tokio::test]
    async fn reingest_unchanged_file_is_a_noop() {
        let corpus = TempDir::new().unwrap();
        std::fs::write(corpus.path().join("a.md"), "# A\n\nbody").unwrap();
        let work = TempDir::new().unwrap();
        let config = test_config(
            corpus.path().to_path_buf(),
            work.path().join("store.bin"),
            work.path().join("fts"),
        );

        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();

        ingest_corpus(&config, &store, &fts).await.unwrap();
        let first_snapshot = store.snapshot();

        let report = ingest_corpus(&config, &store, &fts).await.unwrap();
        assert_eq!(report.files_unchanged, 1);
        assert_eq!(report.files_changed, 0);
        assert_eq!(store.snapshot().passages.len(), first_snapshot.passages.len());
    }

    #[tokio::test]
    async fn changed_file_gets_reindexed_with_fresh_ids() {
        let corpus = TempDir::new().unwrap();
        let path = corpus.path().join("a.md");
        std::fs::write(&path, "# A\n\none").unwrap();
        let work = TempDir::new().unwrap();
        let config = test_config(
            corpus.path().to_path_buf(),
            work.path().join("store.bin"),
            work.path().join("fts"),
        );

        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();
        ingest_corpus(&config, &store, &fts).await.unwrap();

        std::fs::write(&path, "# A\n\none\n\n# B\n\ntwo").unwrap();
        let report = ingest_corpus(&config, &store, &fts).await.unwrap();
        assert_eq!(report.files_changed, 1);

        let snap = store.snapshot();
        assert_eq!(snap.passages.len(), 2);
    }

    #[tokio::test]
    async fn deleted_file_is_removed_from_store() {
        let corpus = TempDir::new().unwrap();
        let path = corpus.path().join("a.md");
        std::fs::write(&path, "# A\n\nbody").unwrap();
        let work = TempDir::new().unwrap();
        let config = test_config(
            corpus.path().to_path_buf(),
            work.path().join("store.bin"),
            work.path().join("fts"),
        );

        let store = Store::open_or_create(&config.store_path).unwrap();
        let fts = FtsIndex::open_or_create(&config.fts_index_dir).unwrap();
        ingest_corpus(&config, &store, &fts).await.unwrap();
        assert_eq!(store.snapshot().files.len(), 1);

        std::fs::remove_file(&path).unwrap();
        ingest_corpus(&config, &store, &fts).await.unwrap();
        assert!(store.snapshot().files.is_empty());
        assert!(store.snapshot().passages.is_empty());
    }
}
