//! Release list refresh, asset downloads, unpacking and cleanup

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::context::Context;
use crate::error::{FileOperation, HangarError, Result};
use crate::model::OperatingSystem;
use crate::process::ProcessSpec;
use crate::progress::ProgressEvent;
use crate::releases::{
    GitHubRelease, ReleaseSelector, ReleaseSource, asset_path, binaries_dir, cached_releases, release_downloads_dir,
    select_asset, sources,
};
use crate::store::Change;

const MAX_RETRIES: usize = 2;

/// Fetch the release list of `source` and store it newest first
pub async fn refresh_releases(ctx: &Context, source: &ReleaseSource) -> Result<Vec<GitHubRelease>> {
    let url = format!(
        "{}/repos/{}/{}/releases",
        ctx.config.github_api_url.trim_end_matches('/'),
        source.owner,
        source.repo
    );

    let strategy = ExponentialBackoff::from_millis(2)
        .factor(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(MAX_RETRIES);
    let releases = RetryIf::spawn(strategy, || fetch_once(ctx, &url), |e: &HangarError| e.is_recoverable()).await?;

    ctx.releases.set_json(&source.to_string(), &releases)?;
    info!("Cached {} release(s) of {}", releases.len(), source);
    Ok(releases)
}

async fn fetch_once(ctx: &Context, url: &str) -> Result<Vec<GitHubRelease>> {
    debug!("Fetching releases from {}", url);
    let response = ctx
        .client
        .get(url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await
        .map_err(|source| HangarError::HttpRequest {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HangarError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(|source| HangarError::HttpRequest {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| HangarError::Serialization {
        context: format!("release list from {}", url),
        source,
    })
}

/// Refresh every source of `os` and download the assets `selector` picks
///
/// Returns the local paths of the selected assets.
pub async fn cache_releases(
    ctx: &Context,
    os: OperatingSystem,
    selector: &ReleaseSelector,
    force: bool,
) -> Result<Vec<PathBuf>> {
    let mut cached = Vec::new();

    for source in sources(os) {
        let releases = refresh_releases(ctx, source).await?;
        for release in selector.select(source, &releases) {
            let asset = select_asset(source, release)?;
            let dest_dir = release_downloads_dir(&ctx.paths, source, release);

            let outcome = ctx
                .transport
                .download(
                    &asset.browser_download_url,
                    &dest_dir,
                    &asset.name,
                    force,
                    Some(ctx.progress().clone()),
                )
                .instrument(info_span!("release_asset", repo = %source, release = release.display_name()))
                .await?;
            debug!("Release asset ready at {}", outcome.path().display());
            cached.push(outcome.path().to_path_buf());
        }
    }

    Ok(cached)
}

/// Sources of `os` whose cached release list changed at or after `since`
///
/// `force` considers every source.
fn updated_sources(ctx: &Context, os: OperatingSystem, since: i64, force: bool) -> Result<Vec<&'static ReleaseSource>> {
    let since = if force { -1 } else { since };
    let updated: BTreeSet<String> = ctx
        .releases
        .since(since, &[Change::Create, Change::Update])?
        .into_iter()
        .collect();

    Ok(sources(os)
        .iter()
        .filter(|source| updated.contains(&source.to_string()))
        .collect())
}

/// Unpack the newest downloaded asset of every updated source of `os`
///
/// A release already unpacked is skipped unless `force`.
pub async fn unpack_latest(ctx: &Context, os: OperatingSystem, since: i64, force: bool) -> Result<Vec<PathBuf>> {
    let mut unpacked = Vec::new();

    for source in updated_sources(ctx, os, since, force)? {
        let Some(release) = cached_releases(ctx, source)?.into_iter().next() else {
            continue;
        };

        let bin_dir = binaries_dir(&ctx.paths, source, &release);
        if bin_dir.exists() && !force {
            debug!("{} is already unpacked", bin_dir.display());
            continue;
        }

        let asset = select_asset(source, &release)?;
        let archive = asset_path(&ctx.paths, source, &release, asset);
        if !archive.exists() {
            let message = format!("{} of {} is not downloaded, skipping unpack", asset.name, source);
            warn!("{}", message);
            ctx.report(ProgressEvent::Warning { message });
            continue;
        }

        info!("Unpacking {} into {}", asset.name, bin_dir.display());
        untar(&archive, &bin_dir).await?;
        unpacked.push(bin_dir);
    }

    Ok(unpacked)
}

async fn untar(archive: &Path, dest: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dest)
        .await
        .map_err(|e| HangarError::fs(dest, FileOperation::CreateDir, e))?;
    ProcessSpec::new("tar")
        .arg("-xf")
        .arg(archive.display().to_string())
        .arg("-C")
        .arg(dest.display().to_string())
        .run()
        .await
}

/// Remove downloads and unpacked binaries of every release but the newest
///
/// Only sources of `os` updated at or after `since` are considered, all of
/// them when `force`. Directories left empty are removed up to the release
/// roots. Returns the number of removed files and directories.
pub async fn cleanup_releases(ctx: &Context, os: OperatingSystem, since: i64, force: bool) -> Result<usize> {
    let mut removed = 0;

    for source in updated_sources(ctx, os, since, force)? {
        let releases = cached_releases(ctx, source)?;
        let removed_before = removed;
        let mut stale_dirs = BTreeSet::new();

        for release in releases.iter().skip(1) {
            if let Ok(asset) = select_asset(source, release) {
                let path = asset_path(&ctx.paths, source, release, asset);
                if path.is_file() {
                    debug!("Removing {}", path.display());
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|e| HangarError::fs(&path, FileOperation::Delete, e))?;
                    removed += 1;
                }
                if let Some(parent) = path.parent() {
                    stale_dirs.insert(parent.to_path_buf());
                }
            }

            let bin_dir = binaries_dir(&ctx.paths, source, release);
            if bin_dir.is_dir() {
                debug!("Removing {}", bin_dir.display());
                tokio::fs::remove_dir_all(&bin_dir)
                    .await
                    .map_err(|e| HangarError::fs(&bin_dir, FileOperation::Delete, e))?;
                removed += 1;
            }
            if let Some(parent) = bin_dir.parent() {
                stale_dirs.insert(parent.to_path_buf());
            }
        }

        for dir in stale_dirs {
            let root = if dir.starts_with(&ctx.paths.wine_binaries) {
                &ctx.paths.wine_binaries
            } else {
                &ctx.paths.wine_downloads
            };
            removed += prune_empty_dirs(&dir, root)?;
        }

        if removed == removed_before {
            info!("{} is already clean", source);
        }
    }

    Ok(removed)
}

/// Remove `dir` and its ancestors below `root` while they are empty
fn prune_empty_dirs(dir: &Path, root: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut current = Some(dir);

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || !is_empty_dir(dir)? {
            break;
        }
        std::fs::remove_dir(dir).map_err(|e| HangarError::fs(dir, FileOperation::Delete, e))?;
        removed += 1;
        current = dir.parent();
    }

    Ok(removed)
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HangarError::fs(dir, FileOperation::Read, e)),
    }
}
