//! Steam installation layout: login users, per-account shortcuts and grid artwork

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use steam_shortcuts_util::shortcut::ShortcutOwned;
use steam_shortcuts_util::{parse_shortcuts, shortcuts_to_bytes};
use tracing::debug;

use crate::config::HangarConfig;
use crate::error::{FileOperation, HangarError, Result};
use crate::shortcuts::renumber;
use crate::store::kv::write_atomic;

/// SteamID64 of account id 0
pub const STEAM_ID64_BASE: u64 = 76_561_197_960_265_728;

/// Top-level key of `loginusers.vdf`
pub const USERS_KEY: &str = "users";

/// Account id (the `userdata` directory name) of a SteamID64
pub fn account_id(steam_id64: u64) -> Option<u32> {
    steam_id64
        .checked_sub(STEAM_ID64_BASE)
        .and_then(|id| u32::try_from(id).ok())
}

/// A Steam root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamLibrary {
    root: PathBuf,
}

impl SteamLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library from the configured Steam directory, if there is one on disk
    pub fn from_config(config: &HangarConfig) -> Option<Self> {
        config
            .steam_dir
            .as_ref()
            .filter(|dir| dir.is_dir())
            .map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn login_users_path(&self) -> PathBuf {
        self.root.join("config").join("loginusers.vdf")
    }

    /// Account ids of every user that logged in on this machine
    pub fn login_users(&self) -> Result<Vec<u32>> {
        let path = self.login_users_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HangarError::fs(path, FileOperation::Read, e)),
        };
        let doc = vdf_reader::from_str::<HashMap<String, serde_json::Value>>(&text).map_err(|e| HangarError::Vdf {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let Some(users) = doc.get(USERS_KEY).and_then(|users| users.as_object()) else {
            return Ok(Vec::new());
        };
        Ok(users
            .keys()
            .filter_map(|key| key.parse::<u64>().ok())
            .filter_map(account_id)
            .collect())
    }

    pub fn user_config_dir(&self, account: u32) -> PathBuf {
        self.root.join("userdata").join(account.to_string()).join("config")
    }

    pub fn shortcuts_path(&self, account: u32) -> PathBuf {
        self.user_config_dir(account).join("shortcuts.vdf")
    }

    pub fn grid_dir(&self, account: u32) -> PathBuf {
        self.user_config_dir(account).join("grid")
    }

    /// Shortcut entries of `account`; a missing file has none
    pub fn load_shortcuts(&self, account: u32) -> Result<Vec<ShortcutOwned>> {
        let path = self.shortcuts_path(account);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(HangarError::fs(path, FileOperation::Read, e)),
        };

        let entries = parse_shortcuts(&bytes).map_err(|e| HangarError::Vdf {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(entries.iter().map(|entry| entry.to_owned()).collect())
    }

    /// Write `entries` back, numbered by position
    pub fn save_shortcuts(&self, account: u32, entries: &mut [ShortcutOwned]) -> Result<()> {
        let path = self.shortcuts_path(account);
        renumber(entries);
        let borrowed = entries.iter().map(|entry| entry.borrow()).collect::<Vec<_>>();
        debug!("Writing {} shortcuts to {}", borrowed.len(), path.display());
        write_atomic(&path, &shortcuts_to_bytes(&borrowed))
    }
}
