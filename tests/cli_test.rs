//! Smoke tests for the `mdvdb` binary's subcommands and exit codes (§6).

use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn mdvdb_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mdvdb"))
}

fn base_cmd(root: &std::path::Path, work: &std::path::Path) -> Command {
    let mut cmd = mdvdb_bin();
    cmd.arg("--root").arg(root);
    cmd.env("MDVDB_STORE_PATH", work.join("store.bin"));
    cmd.env("MDVDB_FTS_INDEX_DIR", work.join("fts"));
    cmd.env("MDVDB_EMBEDDER_BACKEND", "mock");
    cmd.env("MDVDB_EMBEDDER_DIMENSIONS", "16");
    cmd.env_remove("MDVDB_EMBEDDER_API_KEY");
    cmd
}

#[test]
fn ingest_embed_cluster_search_round_trip() {
    let corpus = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    fs::write(
        corpus.path().join("a.md"),
        "# Graphs\n\nBreadth-first search explores neighbors level by level.",
    )
    .unwrap();

    let ingest_status = base_cmd(corpus.path(), work.path())
        .arg("ingest")
        .status()
        .unwrap();
    assert!(ingest_status.success());

    let embed_status = base_cmd(corpus.path(), work.path())
        .arg("embed")
        .status()
        .unwrap();
    assert!(embed_status.success());

    let search_output = base_cmd(corpus.path(), work.path())
        .arg("search")
        .arg("breadth first search")
        .output()
        .unwrap();
    assert!(search_output.status.success());
    let stdout = String::from_utf8_lossy(&search_output.stdout);
    assert!(stdout.contains("a.md"));
}

#[test]
fn bad_corpus_root_exits_with_config_error_code() {
    let work = TempDir::new().unwrap();
    let status = mdvdb_bin()
        .arg("--root")
        .arg("/path/does/not/exist")
        .env("MDVDB_STORE_PATH", work.path().join("store.bin"))
        .env("MDVDB_FTS_INDEX_DIR", work.path().join("fts"))
        .arg("status")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}
