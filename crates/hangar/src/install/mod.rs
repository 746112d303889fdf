//! Platform install dispatch
//!
//! Each target platform has one [`PlatformInstaller`]. The registry picks
//! the installer through the target/host matrix, so the dispatcher itself
//! never branches on operating systems.

pub mod linux;
pub mod macos;
pub mod postinstall;
pub mod prefix;
pub mod space;
pub mod windows;

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{Instrument, debug, info, info_span};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{FileOperation, HangarError, Result};
use crate::model::{DownloadLink, DownloadType, LinkFilter, OperatingSystem, Product};
use crate::platform::{self, ExecutionStrategy};
use crate::state::InstalledRecord;
use crate::store::property;

pub use linux::LinuxInstaller;
pub use macos::MacOsInstaller;
pub use prefix::PrefixInstaller;
pub use windows::WindowsInstaller;

/// Extensions of links that are installers rather than extras
pub const INSTALLER_EXTENSIONS: [&str; 3] = [".pkg", ".sh", ".exe"];

/// Everything an installer needs for one product
#[derive(Debug)]
pub struct InstallRequest<'a> {
    pub product: &'a Product,
    /// Installer links for the target, already downloaded and validated
    pub links: Vec<&'a DownloadLink>,
    pub target: OperatingSystem,
    pub lang_code: &'a str,
    pub downloads_dir: PathBuf,
    pub force: bool,
}

impl InstallRequest<'_> {
    pub fn local_path(&self, link: &DownloadLink) -> PathBuf {
        self.downloads_dir.join(&link.local_filename)
    }

    /// Links with `extension` in catalog order; a product without one has nothing to install
    pub fn require_links(&self, extension: &str) -> Result<Vec<&DownloadLink>> {
        let links: Vec<&DownloadLink> = self
            .links
            .iter()
            .copied()
            .filter(|link| link.extension() == extension)
            .collect();
        if links.is_empty() {
            return Err(HangarError::MissingMetadata {
                id: self.product.id.clone(),
                field: format!("{} installer", extension),
            });
        }
        Ok(links)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub install_dir: PathBuf,
    pub bundle_name: Option<String>,
}

/// Where an installed product can be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Root searched for game info descriptors
    pub install_dir: PathBuf,
    pub prefix: Option<PathBuf>,
}

/// Install, uninstall and locate products of one target platform
#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when this installer deals with `target` products handled by `strategy`
    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool;

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome>;

    /// Reverse the side effects of [`PlatformInstaller::install`]
    async fn uninstall(&self, _ctx: &Context, record: &InstalledRecord) -> Result<()> {
        remove_dir_if_exists(&record.install_dir).await
    }

    fn locate(&self, record: &InstalledRecord) -> Location {
        Location {
            install_dir: record.install_dir.clone(),
            prefix: None,
        }
    }

    /// Launcher used when no game info descriptor applies
    fn default_launcher(&self, location: &Location, title: &str) -> Option<PathBuf>;
}

/// Registered installers, looked up by target and host
pub struct InstallerRegistry {
    installers: Vec<Box<dyn PlatformInstaller>>,
}

impl InstallerRegistry {
    pub fn new() -> Self {
        Self { installers: Vec::new() }
    }

    /// macOS, Linux, Windows and compatibility prefix installers
    pub fn with_defaults() -> Self {
        Self::new()
            .register(MacOsInstaller)
            .register(LinuxInstaller)
            .register(WindowsInstaller)
            .register(PrefixInstaller)
    }

    pub fn register<I: PlatformInstaller + 'static>(mut self, installer: I) -> Self {
        self.installers.push(Box::new(installer));
        self
    }

    /// Installer for `target` products on `host`
    pub fn find(&self, target: OperatingSystem, host: OperatingSystem) -> Result<&dyn PlatformInstaller> {
        let strategy = platform::require(target, host)?;
        self.installers
            .iter()
            .find(|installer| installer.handles(target, strategy))
            .map(|installer| installer.as_ref())
            .ok_or_else(|| HangarError::UnsupportedPlatform {
                target,
                host,
                reason: "no installer registered".to_string(),
            })
    }
}

impl Default for InstallerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Install `product` for `target` from already validated downloads
///
/// Returns `None` when no link matches the target, language and types.
/// On success the installed record is written and title and bundle name
/// are pinned.
pub async fn install_product(
    ctx: &Context,
    product: &Product,
    target: OperatingSystem,
    lang_code: &str,
    download_types: &[DownloadType],
    force: bool,
) -> Result<Option<InstalledRecord>> {
    let title = product.require_title()?;
    product.require_slug()?;

    let host = ctx.host_os();
    let installer = ctx.installers.find(target, host)?;

    let filter = LinkFilter::new()
        .operating_systems(&[target])
        .language_codes(&[lang_code])
        .download_types(download_types);
    let links: Vec<&DownloadLink> = product.links(&filter).collect();
    if links.is_empty() {
        info!("No links of {} match {} {}", product.id, target, lang_code);
        return Ok(None);
    }

    space::ensure_free_space(&ctx.paths.installed_apps, product.estimated_bytes(&filter))?;

    let request = InstallRequest {
        product,
        links: links
            .into_iter()
            .filter(|link| INSTALLER_EXTENSIONS.contains(&link.extension().as_str()))
            .collect(),
        target,
        lang_code,
        downloads_dir: ctx.paths.product_downloads(&product.id),
        force,
    };

    let outcome = installer
        .install(ctx, &request)
        .instrument(info_span!("install", id = %product.id, installer = installer.name()))
        .await?;

    let record = InstalledRecord {
        id: product.id.clone(),
        title: title.to_string(),
        version: request
            .links
            .iter()
            .rev()
            .map(|link| link.version.clone())
            .find(|version| !version.is_empty())
            .unwrap_or_default(),
        estimated_bytes: request.links.iter().map(|link| link.estimated_bytes).sum(),
        install_dir: outcome.install_dir.clone(),
        bundle_name: outcome.bundle_name.clone(),
        installed_at: Utc::now(),
    };
    ctx.records.mark_installed(target, lang_code, &record)?;

    ctx.properties
        .replace_values(property::TITLE, &product.id, vec![title.to_string()])?;
    if let Some(bundle_name) = &outcome.bundle_name {
        ctx.properties
            .replace_values(property::BUNDLE_NAME, &product.id, vec![bundle_name.clone()])?;
    }

    info!("Installed {} ({}) into {}", title, product.id, outcome.install_dir.display());
    Ok(Some(record))
}

pub(crate) async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!("Removed {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HangarError::fs(dir, FileOperation::Delete, e)),
    }
}

/// Move `src` to `dst`, replacing `dst`; falls back to copying across file systems
pub(crate) async fn replace_dir(src: &Path, dst: &Path) -> Result<()> {
    remove_dir_if_exists(dst).await?;
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HangarError::fs(parent, FileOperation::CreateDir, e))?;
    }
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    merge_dir(src, dst)?;
    remove_dir_if_exists(src).await
}

/// Copy the contents of `src` over `dst`, overwriting files that exist in both
pub(crate) fn merge_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            HangarError::fs(path, FileOperation::Read, e.into())
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| HangarError::fs(&target, FileOperation::CreateDir, e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| HangarError::fs(parent, FileOperation::CreateDir, e))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| HangarError::fs(&target, FileOperation::Write, e))?;
        }
    }
    Ok(())
}
