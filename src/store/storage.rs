//! On-disk persistence for the store snapshot: a single rkyv-archived
//! metadata region behind a fixed-size header, written atomically.

use std::fs;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, StoreError};
use crate::store::types::StoreMetadata;

/// Magic bytes identifying an mdvdb store file.
pub const MAGIC: &[u8; 6] = b"MDVDB\x00";

/// Current store format version.
pub const VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Write a store snapshot atomically: serialize to `.tmp`, fsync, then rename.
pub fn write_store(path: &Path, metadata: &StoreMetadata) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let meta_bytes = rkyv::to_bytes::<rkyv::rancor::Error>(metadata)
        .map_err(|e| Error::Store(StoreError::Corrupt(e.to_string())))?;

    let meta_offset: u64 = HEADER_SIZE as u64;
    let meta_size: u64 = meta_bytes.len() as u64;

    let mut header = [0u8; HEADER_SIZE];
    header[..6].copy_from_slice(MAGIC);
    header[6..10].copy_from_slice(&VERSION.to_le_bytes());
    header[10..18].copy_from_slice(&meta_offset.to_le_bytes());
    header[18..26].copy_from_slice(&meta_size.to_le_bytes());
    // bytes 26..64 reserved

    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&header)?;
    file.write_all(&meta_bytes)?;
    file.sync_all()?;

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load a store snapshot via memory-mapping.
///
/// Returns `Ok(None)` if no store file exists yet (a fresh corpus, §8
/// "Empty corpus" boundary case), and `Err(Store::Corrupt)` for any
/// structurally invalid file.
pub fn load_store(path: &Path) -> Result<Option<StoreMetadata>, Error> {
    if !path.exists() {
        return Ok(None);
    }

    let file = fs::File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() < HEADER_SIZE {
        return Err(Error::Store(StoreError::Corrupt(
            "file too small for header".into(),
        )));
    }

    if &mmap[..6] != MAGIC {
        return Err(Error::Store(StoreError::Corrupt("invalid magic bytes".into())));
    }

    let version = u32::from_le_bytes(mmap[6..10].try_into().unwrap());
    if version != VERSION {
        return Err(Error::Store(StoreError::Corrupt(format!(
            "unsupported store version: {version}"
        ))));
    }

    let meta_offset = u64::from_le_bytes(mmap[10..18].try_into().unwrap()) as usize;
    let meta_size = u64::from_le_bytes(mmap[18..26].try_into().unwrap()) as usize;

    if meta_offset.checked_add(meta_size).map_or(true, |end| end > mmap.len()) {
        return Err(Error::Store(StoreError::Corrupt("truncated file".into())));
    }

    let meta_bytes = &mmap[meta_offset..meta_offset + meta_size];
    let metadata: StoreMetadata = rkyv::from_bytes::<StoreMetadata, rkyv::rancor::Error>(meta_bytes)
        .map_err(|e| Error::Store(StoreError::Corrupt(format!("rkyv deserialize: {e}"))))?;

    validate_metadata(&metadata)?;

    Ok(Some(metadata))
}

/// Check the embedding dims invariant (§8 invariant 2) so a consistency
/// failure at load time is reported as `Store::Corrupt`, not a panic later.
fn validate_metadata(metadata: &StoreMetadata) -> Result<(), Error> {
    for embedding in &metadata.embeddings {
        if embedding.vec.len() != embedding.dims as usize {
            return Err(Error::Store(StoreError::Corrupt(format!(
                "embedding for passage {} declares dims={} but has {} components",
                embedding.passage_id,
                embedding.dims,
                embedding.vec.len()
            ))));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_metadata() -> StoreMetadata {
        let mut meta = StoreMetadata::default();
        meta.last_updated = 1234567890;
        meta.embedding_model = Some("mock-embed-v1".to_string());
        meta
    }

    #[test]
    fn roundtrip_write_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let meta = sample_metadata();

        write_store(&path, &meta).unwrap();
        assert!(path.exists());

        let loaded = load_store(&path).unwrap().unwrap();
        assert_eq!(loaded.last_updated, 1234567890);
        assert_eq!(loaded.embedding_model.as_deref(), Some("mock-embed-v1"));
    }

    #[test]
    fn load_missing_file_returns_none() {
        let result = load_store(Path::new("/nonexistent/store.bin")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_corrupted_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, [0u8; 64]).unwrap();
        let result = load_store(&path);
        assert!(matches!(result, Err(Error::Store(StoreError::Corrupt(_)))));
    }

    #[test]
    fn load_too_small() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.bin");
        fs::write(&path, [0u8; 10]).unwrap();
        let result = load_store(&path);
        assert!(matches!(result, Err(Error::Store(StoreError::Corrupt(_)))));
    }

    #[test]
    fn load_rejects_dims_mismatch() {
        use crate::store::types::Embedding;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.bin");
        let mut meta = sample_metadata();
        meta.embeddings.push(Embedding {
            passage_id: 0,
            model: "m".into(),
            dims: 4,
            vec: vec![0.5, 0.5],
        });
        write_store(&path, &meta).unwrap();

        let result = load_store(&path);
        assert!(matches!(result, Err(Error::Store(StoreError::Corrupt(_)))));
    }
}
