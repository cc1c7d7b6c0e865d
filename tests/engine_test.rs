//! End-to-end pipeline: ingest → embed → cluster → search / cluster-suggest
//! / related / related-notes / file-tree / status, against a real (mock
//! embedder) `Engine` instance rooted at a temp corpus.

use std::fs;

use mdvdb::recommend::RecommendMode;
use mdvdb::{Config, Engine};
use serial_test::serial;
use tempfile::TempDir;

const ALL_ENV_VARS: &[&str] = &[
    "MDVDB_CORPUS_ROOT",
    "MDVDB_EXTENSIONS",
    "MDVDB_STORE_PATH",
    "MDVDB_FTS_INDEX_DIR",
    "MDVDB_IGNORE_PATTERNS",
    "MDVDB_EMBEDDER_BACKEND",
    "MDVDB_EMBEDDER_MODEL",
    "MDVDB_EMBEDDER_DIMENSIONS",
    "MDVDB_EMBEDDER_ENDPOINT",
    "MDVDB_EMBEDDER_API_KEY",
    "MDVDB_EMBEDDER_BATCH_SIZE",
    "MDVDB_FTS_K",
    "MDVDB_CLUSTER_K_MIN",
    "MDVDB_CLUSTER_K_MAX",
    "MDVDB_REQUEST_DEADLINE_MS",
    "MDVDB_WORKER_CONCURRENCY",
    "MDVDB_QUEUE_CAPACITY_MULTIPLIER",
];

fn clear_env() {
    for var in ALL_ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_corpus(root: &std::path::Path) {
    fs::write(
        root.join("rust.md"),
        "# Ownership\n\nRust ownership and borrowing rules govern memory safety.\n\n\
         # Lifetimes\n\nLifetimes describe how long borrows are valid.",
    )
    .unwrap();
    fs::write(
        root.join("networking.md"),
        "# TCP Handshake\n\nTCP establishes a connection with a three-way handshake.\n\n\
         # UDP\n\nUDP is connectionless and does not guarantee delivery.",
    )
    .unwrap();
}

fn open_engine(corpus: &std::path::Path, work: &std::path::Path) -> Engine {
    clear_env();
    std::env::set_var("MDVDB_STORE_PATH", work.join("store.bin"));
    std::env::set_var("MDVDB_FTS_INDEX_DIR", work.join("fts"));
    std::env::set_var("MDVDB_EMBEDDER_BACKEND", "mock");
    std::env::set_var("MDVDB_EMBEDDER_DIMENSIONS", "16");
    std::env::set_var("MDVDB_CLUSTER_K_MIN", "1");
    std::env::set_var("MDVDB_CLUSTER_K_MAX", "4");
    let config = Config::load(corpus).unwrap();
    clear_env();
    Engine::open(config).unwrap()
}

#[tokio::test]
#[serial]
async fn full_pipeline_ingest_embed_cluster_search() {
    let corpus = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let engine = open_engine(corpus.path(), work.path());

    let ingest_report = engine.ingest().await.unwrap();
    assert_eq!(ingest_report.files_changed, 2);
    assert_eq!(ingest_report.passages_written, 4);

    let embed_report = engine.embed_build().await.unwrap();
    assert_eq!(embed_report.passages_embedded, 4);

    let cluster_report = engine.cluster_build().unwrap();
    assert!(cluster_report.clusters_created >= 1);
    assert_eq!(cluster_report.passages_clustered, 4);

    let hits = engine.search("rust ownership", 5, None, None).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].file_path, "rust.md");

    let suggestions = engine.cluster_suggest("tcp handshake", 3, None, None).await.unwrap();
    assert!(!suggestions.is_empty());

    let status = engine.status();
    assert_eq!(status.file_count, 2);
    assert_eq!(status.passage_count, 4);
    assert_eq!(status.embedding_count, 4);

    let tree = engine.file_tree();
    assert_eq!(tree.total_files, 2);
    assert_eq!(tree.total_passages, 4);
}

#[tokio::test]
#[serial]
async fn related_and_related_notes_exclude_the_input_passage() {
    let corpus = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let engine = open_engine(corpus.path(), work.path());

    engine.ingest().await.unwrap();
    engine.embed_build().await.unwrap();
    engine.cluster_build().unwrap();

    let related = engine.related(0, RecommendMode::Embed, 3, None).unwrap();
    assert!(related.iter().all(|r| r.passage_id != 0));

    let related_notes = engine.related_notes(0, RecommendMode::Embed, 3, None).unwrap();
    assert!(related_notes.iter().all(|f| f.matched_chunks > 0));
}

#[tokio::test]
#[serial]
async fn reingest_after_no_changes_leaves_store_untouched() {
    let corpus = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    write_corpus(corpus.path());
    let engine = open_engine(corpus.path(), work.path());

    engine.ingest().await.unwrap();
    let first_status = engine.status();

    let report = engine.ingest().await.unwrap();
    assert_eq!(report.files_changed, 0);
    assert_eq!(report.files_unchanged, 2);
    assert_eq!(engine.status().passage_count, first_status.passage_count);
}
