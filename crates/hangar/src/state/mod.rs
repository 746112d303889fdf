//! Install state: which products are installed for an os-lang pair, and with which parameters

pub mod parameters;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;
use crate::model::{OperatingSystem, os_lang_code};
use crate::store::KeyValues;

pub use parameters::InstallParameters;

/// Persisted marker of a completed install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub id: String,
    pub title: String,
    pub version: String,
    pub estimated_bytes: u64,
    /// Directory the product was installed into
    pub install_dir: PathBuf,
    #[serde(default)]
    pub bundle_name: Option<String>,
    pub installed_at: DateTime<Utc>,
}

/// Installed records partitioned by `<os>-<lang>`
#[derive(Debug, Clone)]
pub struct InstallStateTracker {
    records: KeyValues,
}

impl InstallStateTracker {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            records: KeyValues::open(dir)?,
        })
    }

    fn partition(&self, os: OperatingSystem, lang_code: &str) -> Result<KeyValues> {
        self.records.partition(&os_lang_code(os, lang_code))
    }

    pub fn is_installed(&self, id: &str, os: OperatingSystem, lang_code: &str) -> Result<bool> {
        Ok(self.partition(os, lang_code)?.has(id))
    }

    /// Create or refresh the record. Repeating it leaves the same state behind.
    pub fn mark_installed(&self, os: OperatingSystem, lang_code: &str, record: &InstalledRecord) -> Result<()> {
        debug!("Marking {} installed for {}", record.id, os_lang_code(os, lang_code));
        self.partition(os, lang_code)?.set_json(&record.id, record)
    }

    /// Remove the record; absent records are not an error
    pub fn unmark(&self, id: &str, os: OperatingSystem, lang_code: &str) -> Result<()> {
        if self.partition(os, lang_code)?.cut(id)? {
            debug!("Removed installed record of {} for {}", id, os_lang_code(os, lang_code));
        }
        Ok(())
    }

    pub fn record(&self, id: &str, os: OperatingSystem, lang_code: &str) -> Result<Option<InstalledRecord>> {
        self.partition(os, lang_code)?.get_json(id)
    }

    /// Every record of the partition, ordered by id
    pub fn installed(&self, os: OperatingSystem, lang_code: &str) -> Result<Vec<InstalledRecord>> {
        let partition = self.partition(os, lang_code)?;
        let mut records = Vec::new();
        for key in partition.keys()? {
            if let Some(record) = partition.get_json::<InstalledRecord>(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn filter_not_installed(&self, ids: &[String], os: OperatingSystem, lang_code: &str) -> Result<Vec<String>> {
        let partition = self.partition(os, lang_code)?;
        Ok(ids.iter().filter(|id| !partition.has(id)).cloned().collect())
    }
}
