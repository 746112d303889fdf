//! Install parameters pinned per product so later runs need not repeat them

use serde::{Deserialize, Serialize};

use crate::error::{HangarError, Result};
use crate::model::{DownloadType, OperatingSystem};
use crate::store::{PropertyStore, property};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallParameters {
    pub operating_system: OperatingSystem,
    pub lang_code: String,
    #[serde(default)]
    pub download_types: Vec<DownloadType>,
    #[serde(default)]
    pub keep_downloads: bool,
    #[serde(default)]
    pub no_steam_shortcut: bool,
}

impl InstallParameters {
    pub fn pin(&self, properties: &PropertyStore, id: &str) -> Result<()> {
        let value = serde_json::to_string(self).map_err(|source| HangarError::Serialization {
            context: format!("install parameters of {}", id),
            source,
        })?;
        properties.replace_values(property::INSTALL_PARAMETERS, id, vec![value])
    }

    pub fn load(properties: &PropertyStore, id: &str) -> Result<Option<Self>> {
        let Some(value) = properties.get_last_value(property::INSTALL_PARAMETERS, id)? else {
            return Ok(None);
        };
        serde_json::from_str(&value)
            .map(Some)
            .map_err(|source| HangarError::Serialization {
                context: format!("install parameters of {}", id),
                source,
            })
    }

    pub fn unpin(properties: &PropertyStore, ids: &[&str]) -> Result<()> {
        properties.cut_keys(property::INSTALL_PARAMETERS, ids)
    }
}
