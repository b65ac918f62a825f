//! Snapshot persistence: pluggable blob store with a filesystem
//! implementation, plain JSON for inspectable saves and deflate-compressed
//! JSON for shipping ones.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use log::info;

use crate::error::Result;
use crate::snapshot::SceneSnapshot;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StoreFormat {
    /// Pretty-printed JSON, `.json`.
    Json,
    /// Deflate-compressed JSON, `.sav`.
    Binary,
}

impl StoreFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StoreFormat::Json => "json",
            StoreFormat::Binary => "sav",
        }
    }
}

/// Where snapshots go. The engine's quick save/load shortcuts are generic
/// over this so hosts can back saves with whatever they like.
pub trait BlobStore {
    fn save(&self, slot: &str, snapshot: &SceneSnapshot) -> Result<()>;
    /// `Ok(None)` when nothing has been saved under `slot`.
    fn load(&self, slot: &str) -> Result<Option<SceneSnapshot>>;
    /// Deleting an absent slot is not an error.
    fn delete(&self, slot: &str) -> Result<()>;
}

/// One file per slot under a base directory, created on first save.
pub struct FileBlobStore {
    dir: PathBuf,
    format: StoreFormat,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>, format: StoreFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn path_for(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.{}", self.format.extension()))
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.path_for(slot).is_file()
    }
}

impl BlobStore for FileBlobStore {
    fn save(&self, slot: &str, snapshot: &SceneSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(slot);
        let bytes = match self.format {
            StoreFormat::Json => serde_json::to_vec_pretty(snapshot)?,
            StoreFormat::Binary => {
                let json = serde_json::to_vec(snapshot)?;
                compress_deflate_best(&json)?
            }
        };
        fs::write(&path, bytes)?;
        info!("saved snapshot to {}", path.display());
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<SceneSnapshot>> {
        let path = self.path_for(slot);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = match self.format {
            StoreFormat::Json => serde_json::from_slice(&bytes)?,
            StoreFormat::Binary => {
                let json = decompress_deflate(&bytes)?;
                serde_json::from_slice(&json)?
            }
        };
        Ok(Some(snapshot))
    }

    fn delete(&self, slot: &str) -> Result<()> {
        let path = self.path_for(slot);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn compress_deflate_best(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress_deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
