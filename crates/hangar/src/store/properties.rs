//! Property store: one JSON document per property mapping keys to value lists

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{FileOperation, HangarError, Result};
use crate::store::kv::write_atomic;

/// Property names used across hangar
pub mod property {
    pub const TITLE: &str = "title";
    pub const SLUG: &str = "slug";
    pub const STEAM_APP_ID: &str = "steam-app-id";
    pub const BUNDLE_NAME: &str = "bundle-name";
    pub const INSTALL_PARAMETERS: &str = "install-parameters";
    pub const INSTALL_DATE: &str = "install-date";
    pub const LAST_RUN_DATE: &str = "last-run-date";
    pub const PREFIX_EXE: &str = "prefix-exe";
    pub const PREFIX_ENV: &str = "prefix-env";
    pub const PREFIX_ARG: &str = "prefix-arg";
    pub const SERVER_CONNECTION: &str = "server-connection";

    /// Keys of the server connection property
    pub mod server {
        pub const PROTOCOL: &str = "protocol";
        pub const ADDRESS: &str = "address";
        pub const PORT: &str = "port";
        pub const USERNAME: &str = "username";
        pub const PASSWORD: &str = "password";
    }
}

type Values = BTreeMap<String, Vec<String>>;

/// Property documents under `<metadata>/_properties/<property>.json`
#[derive(Debug)]
pub struct PropertyStore {
    dir: PathBuf,
    loaded: Mutex<HashMap<String, Values>>,
}

impl PropertyStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| HangarError::fs(&dir, FileOperation::CreateDir, e))?;
        Ok(Self {
            dir,
            loaded: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load `properties` up front so a corrupt document fails early
    pub fn must_have(&self, properties: &[&str]) -> Result<()> {
        for property in properties {
            self.with_values(property, |_| ())?;
        }
        Ok(())
    }

    pub fn get_last_value(&self, property: &str, key: &str) -> Result<Option<String>> {
        self.with_values(property, |values| {
            values.get(key).and_then(|v| v.last().cloned())
        })
    }

    pub fn get_all_values(&self, property: &str, key: &str) -> Result<Option<Vec<String>>> {
        self.with_values(property, |values| values.get(key).cloned())
    }

    pub fn has_key(&self, property: &str, key: &str) -> Result<bool> {
        self.with_values(property, |values| values.contains_key(key))
    }

    pub fn keys(&self, property: &str) -> Result<Vec<String>> {
        self.with_values(property, |values| values.keys().cloned().collect())
    }

    pub fn replace_values(&self, property: &str, key: &str, values: Vec<String>) -> Result<()> {
        self.update(property, |doc| {
            doc.insert(key.to_string(), values);
        })
    }

    pub fn batch_replace_values(&self, property: &str, batch: BTreeMap<String, Vec<String>>) -> Result<()> {
        self.update(property, |doc| doc.extend(batch))
    }

    pub fn append_values(&self, property: &str, key: &str, values: Vec<String>) -> Result<()> {
        self.update(property, |doc| {
            let existing = doc.entry(key.to_string()).or_default();
            for value in values {
                if !existing.contains(&value) {
                    existing.push(value);
                }
            }
        })
    }

    pub fn cut_keys(&self, property: &str, keys: &[&str]) -> Result<()> {
        self.update(property, |doc| {
            for key in keys {
                doc.remove(*key);
            }
        })
    }

    fn with_values<T>(&self, property: &str, f: impl FnOnce(&Values) -> T) -> Result<T> {
        let mut loaded = self.lock();
        if !loaded.contains_key(property) {
            let values = self.read(property)?;
            loaded.insert(property.to_string(), values);
        }
        let empty = Values::new();
        Ok(f(loaded.get(property).unwrap_or(&empty)))
    }

    fn update(&self, property: &str, f: impl FnOnce(&mut Values)) -> Result<()> {
        let mut loaded = self.lock();
        let mut values = match loaded.remove(property) {
            Some(values) => values,
            None => self.read(property)?,
        };
        f(&mut values);
        let bytes = serde_json::to_vec_pretty(&values)?;
        let written = write_atomic(&self.path(property), &bytes);
        loaded.insert(property.to_string(), values);
        written
    }

    fn read(&self, property: &str) -> Result<Values> {
        let path = self.path(property);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| HangarError::Serialization {
                context: format!("property '{}'", property),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Values::new()),
            Err(e) => Err(HangarError::fs(path, FileOperation::Read, e)),
        }
    }

    fn path(&self, property: &str) -> PathBuf {
        self.dir.join(format!("{}.json", property))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Values>> {
        // A panic while holding the lock leaves the cache usable
        self.loaded.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
