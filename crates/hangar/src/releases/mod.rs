//! Compatibility runtime releases published on GitHub
//!
//! Each host OS has a fixed set of source repositories. Their release lists
//! are cached newest first in the `releases` store under `owner/repo`;
//! index 0 is the latest release and the only one kept on disk after a
//! cleanup.

pub mod cache;
pub mod runtime;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::Paths;
use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::model::OperatingSystem;

pub use cache::{cache_releases, cleanup_releases, refresh_releases, unpack_latest};

/// One GitHub release as returned by the releases API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl GitHubRelease {
    /// Release name, or the tag for unnamed releases
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.tag_name)
    }

    /// Directory name derived from the release name
    pub fn dir_name(&self) -> String {
        sanitize(self.display_name())
    }
}

/// Repository a runtime is published from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSource {
    pub owner: &'static str,
    pub repo: &'static str,
    /// Substrings identifying the wanted asset when a release has several
    pub asset_selectors: &'static [&'static str],
}

impl fmt::Display for ReleaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

pub const PROTON_GE: ReleaseSource = ReleaseSource {
    owner: "GloriousEggroll",
    repo: "proton-ge-custom",
    asset_selectors: &[".tar.gz"],
};

pub const UMU_LAUNCHER: ReleaseSource = ReleaseSource {
    owner: "Open-Wine-Components",
    repo: "umu-launcher",
    asset_selectors: &["zipapp.tar"],
};

pub const MACOS_WINE: ReleaseSource = ReleaseSource {
    owner: "Gcenx",
    repo: "macOS_Wine_builds",
    asset_selectors: &["wine-stable", ".tar.xz"],
};

static SOURCES: Lazy<HashMap<OperatingSystem, Vec<ReleaseSource>>> = Lazy::new(|| {
    HashMap::from([
        (OperatingSystem::Linux, vec![PROTON_GE, UMU_LAUNCHER]),
        (OperatingSystem::MacOS, vec![MACOS_WINE]),
    ])
});

/// Runtime sources needed on `os`; Windows needs none
pub fn sources(os: OperatingSystem) -> &'static [ReleaseSource] {
    SOURCES.get(&os).map(Vec::as_slice).unwrap_or(&[])
}

/// Which cached releases an operation applies to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseSelector {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub tags: Vec<String>,
    pub all: bool,
}

impl ReleaseSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn all(mut self, all: bool) -> Self {
        self.all = all;
        self
    }

    /// Releases of `source` this selector picks from a newest first list
    ///
    /// Without tags this is the newest release, or every release when `all`
    /// is set. Tags select exact matches only.
    pub fn select<'a>(&self, source: &ReleaseSource, releases: &'a [GitHubRelease]) -> Vec<&'a GitHubRelease> {
        if self.owner.as_deref().is_some_and(|owner| owner != source.owner)
            || self.repo.as_deref().is_some_and(|repo| repo != source.repo)
        {
            return Vec::new();
        }

        if self.tags.is_empty() {
            return if self.all {
                releases.iter().collect()
            } else {
                releases.first().into_iter().collect()
            };
        }

        releases
            .iter()
            .filter(|release| self.tags.contains(&release.tag_name))
            .collect()
    }
}

/// The asset of `release` to download for `source`
pub fn select_asset<'a>(source: &ReleaseSource, release: &'a GitHubRelease) -> Result<&'a GitHubAsset> {
    if let [only] = release.assets.as_slice() {
        return Ok(only);
    }

    release
        .assets
        .iter()
        .find(|asset| {
            source
                .asset_selectors
                .iter()
                .any(|selector| !selector.is_empty() && asset.name.contains(selector))
        })
        .ok_or_else(|| HangarError::AssetNotFound {
            repo: source.to_string(),
            release: release.display_name().to_string(),
            pattern: source.asset_selectors.join(", "),
        })
}

/// Replace characters that are not valid in file names on any host
pub fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    sanitized.trim_matches('.').to_string()
}

/// `wine/_downloads/<owner>/<repo>/<release>/<asset>`
pub fn asset_path(paths: &Paths, source: &ReleaseSource, release: &GitHubRelease, asset: &GitHubAsset) -> PathBuf {
    release_downloads_dir(paths, source, release).join(&asset.name)
}

pub fn release_downloads_dir(paths: &Paths, source: &ReleaseSource, release: &GitHubRelease) -> PathBuf {
    paths
        .wine_downloads
        .join(source.owner)
        .join(source.repo)
        .join(release.dir_name())
}

/// `wine/_binaries/<owner>/<repo>/<release>`
pub fn binaries_dir(paths: &Paths, source: &ReleaseSource, release: &GitHubRelease) -> PathBuf {
    paths
        .wine_binaries
        .join(source.owner)
        .join(source.repo)
        .join(release.dir_name())
}

/// Cached release list of `source`, newest first
pub fn cached_releases(ctx: &Context, source: &ReleaseSource) -> Result<Vec<GitHubRelease>> {
    Ok(ctx
        .releases
        .get_json::<Vec<GitHubRelease>>(&source.to_string())?
        .unwrap_or_default())
}

pub fn latest_release(ctx: &Context, source: &ReleaseSource) -> Result<Option<GitHubRelease>> {
    Ok(cached_releases(ctx, source)?.into_iter().next())
}

#[cfg(test)]
mod tests;
