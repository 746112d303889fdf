//! Compatibility runtime release maintenance

use std::path::PathBuf;
use tracing::info;

use crate::context::Context;
use crate::error::Result;
use crate::model::OperatingSystem;
use crate::releases::{self, ReleaseSelector};

/// Refresh, download, unpack the newest release and prune older ones
///
/// `os` defaults to the host. Only sources refreshed by this call are
/// unpacked and pruned.
pub async fn cache_releases(
    ctx: &Context,
    os: Option<OperatingSystem>,
    selector: &ReleaseSelector,
    force: bool,
) -> Result<Vec<PathBuf>> {
    let os = os.unwrap_or_else(|| ctx.host_os());
    let since = chrono::Utc::now().timestamp();

    let cached = releases::cache_releases(ctx, os, selector, force).await?;
    let unpacked = releases::unpack_latest(ctx, os, since, force).await?;
    let removed = releases::cleanup_releases(ctx, os, since, force).await?;

    info!(
        "{} release asset(s) cached, {} unpacked, {} stale item(s) removed",
        cached.len(),
        unpacked.len(),
        removed
    );
    Ok(cached)
}

/// Prune every cached source of `os` down to its newest release
pub async fn cleanup_releases(ctx: &Context, os: Option<OperatingSystem>) -> Result<usize> {
    let os = os.unwrap_or_else(|| ctx.host_os());
    releases::cleanup_releases(ctx, os, 0, true).await
}
