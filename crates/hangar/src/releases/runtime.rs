//! Locations of unpacked compatibility runtimes

use std::path::PathBuf;

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::releases::{MACOS_WINE, PROTON_GE, ReleaseSource, UMU_LAUNCHER, binaries_dir, latest_release};

const CACHE_HINT: &str = "Run `hangar cache-releases` first";

/// Unpacked directory of the newest cached release of `source`
fn latest_binaries(ctx: &Context, source: &ReleaseSource) -> Result<(PathBuf, String)> {
    let release = latest_release(ctx, source)?.ok_or_else(|| {
        HangarError::configuration(format!("no cached release of {}", source), Some(CACHE_HINT))
    })?;
    Ok((binaries_dir(&ctx.paths, source, &release), release.tag_name))
}

fn require_exists(path: PathBuf, source: &ReleaseSource) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(HangarError::configuration(
            format!("{} runtime is not unpacked at {}", source, path.display()),
            Some(CACHE_HINT),
        ))
    }
}

/// Proton archives unpack into a directory named after the release tag
pub fn proton_path(ctx: &Context) -> Result<PathBuf> {
    let (bin_dir, tag) = latest_binaries(ctx, &PROTON_GE)?;
    require_exists(bin_dir.join(tag), &PROTON_GE)
}

pub fn umu_run_path(ctx: &Context) -> Result<PathBuf> {
    let (bin_dir, _) = latest_binaries(ctx, &UMU_LAUNCHER)?;
    require_exists(bin_dir.join("umu").join("umu-run"), &UMU_LAUNCHER)
}

pub fn wine_path(ctx: &Context) -> Result<PathBuf> {
    let (bin_dir, _) = latest_binaries(ctx, &MACOS_WINE)?;
    require_exists(
        bin_dir
            .join("Wine Stable.app")
            .join("Contents")
            .join("Resources")
            .join("wine")
            .join("bin")
            .join("wine"),
        &MACOS_WINE,
    )
}
