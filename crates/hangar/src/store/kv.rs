//! Directory of JSON records with a created/updated index

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{FileOperation, HangarError, Result};

const INDEX_FILE: &str = "_index.json";
const EXT: &str = "json";

/// Kind of modification reported by [`KeyValues::since`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct IndexEntry {
    created: i64,
    updated: i64,
}

/// Keyed record set stored as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct KeyValues {
    dir: PathBuf,
}

impl KeyValues {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| HangarError::fs(&dir, FileOperation::CreateDir, e))?;
        Ok(Self { dir })
    }

    /// Sub-directory namespace, e.g. an `<os>-<lang>` partition
    pub fn partition(&self, name: &str) -> Result<Self> {
        Self::open(self.dir.join(name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has(&self, key: &str) -> bool {
        self.path(key).is_file()
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HangarError::fs(path, FileOperation::Read, e)),
        }
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| HangarError::Serialization {
                    context: format!("record '{}' in {}", key, self.dir.display()),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let existed = self.has(key);
        write_atomic(&self.path(key), bytes)?;

        let now = chrono::Utc::now().timestamp();
        let mut index = self.read_index()?;
        index
            .entry(key.to_string())
            .and_modify(|entry| {
                if existed {
                    entry.updated = now;
                } else {
                    *entry = IndexEntry { created: now, updated: now };
                }
            })
            .or_insert(IndexEntry { created: now, updated: now });
        self.write_index(&index)
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| HangarError::Serialization {
            context: format!("record '{}' in {}", key, self.dir.display()),
            source,
        })?;
        self.set(key, &bytes)
    }

    /// Remove `key`. Returns false when there was nothing to remove.
    pub fn cut(&self, key: &str) -> Result<bool> {
        let path = self.path(key);
        let removed = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(HangarError::fs(path, FileOperation::Delete, e)),
        };

        let mut index = self.read_index()?;
        if index.remove(key).is_some() {
            self.write_index(&index)?;
        }
        Ok(removed)
    }

    /// Keys present in this partition, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .read_index()?
            .into_keys()
            .filter(|key| self.has(key))
            .collect())
    }

    /// Keys created and/or updated at or after `since` (unix seconds)
    pub fn since(&self, since: i64, changes: &[Change]) -> Result<Vec<String>> {
        Ok(self
            .read_index()?
            .into_iter()
            .filter(|(_, entry)| {
                changes.iter().any(|change| match change {
                    Change::Create => entry.created >= since,
                    Change::Update => entry.updated >= since,
                })
            })
            .map(|(key, _)| key)
            .filter(|key| self.has(key))
            .collect())
    }

    /// Created/updated timestamps of `key`
    pub fn modified(&self, key: &str) -> Result<Option<(i64, i64)>> {
        Ok(self
            .read_index()?
            .get(key)
            .map(|entry| (entry.created, entry.updated)))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_key(key), EXT))
    }

    fn read_index(&self) -> Result<BTreeMap<String, IndexEntry>> {
        let path = self.dir.join(INDEX_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| HangarError::Serialization {
                context: format!("index {}", path.display()),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(HangarError::fs(path, FileOperation::Read, e)),
        }
    }

    fn write_index(&self, index: &BTreeMap<String, IndexEntry>) -> Result<()> {
        let bytes = serde_json::to_vec(index)?;
        write_atomic(&self.dir.join(INDEX_FILE), &bytes)
    }
}

/// Keys may contain `/` (owner/repo); keep them a single path component
fn encode_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F").replace('\\', "%5C")
}

/// Write through a temp file in the same directory and rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| HangarError::fs(dir, FileOperation::CreateDir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| HangarError::fs(dir, FileOperation::Create, e))?;
    if let Err(e) = temp.write_all(bytes).and_then(|_| temp.flush()) {
        return Err(HangarError::fs(path, FileOperation::Write, e));
    }
    temp.persist(path)
        .map_err(|e| HangarError::fs(path, FileOperation::Move, e.error))?;
    Ok(())
}
