//! Free space check ahead of an install

use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::debug;

use crate::error::{HangarError, Result};

/// Available bytes on the disk holding `path`, `None` when no disk matches
pub fn available_space(path: &Path) -> Option<u64> {
    let existing = nearest_existing(path)?;
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| existing.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Fail with [`HangarError::InsufficientSpace`] when `required` bytes do not fit
pub fn ensure_free_space(path: &Path, required: u64) -> Result<()> {
    let Some(available) = available_space(path) else {
        debug!("Could not determine free space for {}, skipping check", path.display());
        return Ok(());
    };
    check(path, required, available)
}

pub(crate) fn check(path: &Path, required: u64, available: u64) -> Result<()> {
    if available >= required {
        debug!("{} bytes required, {} available at {}", required, available, path.display());
        return Ok(());
    }
    Err(HangarError::InsufficientSpace {
        required,
        available,
        shortage: required - available,
        path: path.to_path_buf(),
    })
}

fn nearest_existing(path: &Path) -> Option<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    absolute.ancestors().find(|p| p.exists()).map(Path::to_path_buf)
}
