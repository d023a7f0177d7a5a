//! Content digests of generated artifacts and their sources.
//!
//! Persisted as a versioned bincode record list. A file that fails to
//! decode or carries another version is treated as an empty cache.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::file_system::FileSystem;

pub const CACHE_FILE_NAME: &str = "epigen-cache.bin";
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CacheRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    path: String,
    digest: String,
}

/// MD5 hex digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Path to digest mapping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cache {
    entries: BTreeMap<String, String>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the cache at `path`, if any.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self, CoreError> {
        if !fs.exists(path) {
            debug!(path = %path.display(), "no cache file");
            return Ok(Self::new());
        }
        let bytes = fs.read(path).map_err(|err| CoreError::io(path, err))?;
        Ok(Self::decode(&bytes).unwrap_or_else(|| {
            warn!(path = %path.display(), "discarding unreadable cache file");
            Self::new()
        }))
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let file: CacheFile = bincode::deserialize(bytes).ok()?;
        if file.version != CACHE_VERSION {
            return None;
        }
        let entries = file
            .entries
            .into_iter()
            .map(|record| (record.path, record.digest))
            .collect();
        Some(Self { entries })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self
                .entries
                .iter()
                .map(|(path, digest)| CacheRecord {
                    path: path.clone(),
                    digest: digest.clone(),
                })
                .collect(),
        };
        Ok(bincode::serialize(&file)?)
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.entries.get(&key(path)).map(String::as_str)
    }

    pub fn insert(&mut self, path: &Path, digest: String) {
        self.entries.insert(key(path), digest);
    }

    /// Keeps the entries whose path satisfies `keep`; returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| keep(Path::new(path)));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
