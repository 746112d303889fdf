//! macOS `.pkg` installs: expand with `pkgutil`, move the payload into place

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::install::postinstall::PostInstallScript;
use crate::install::{InstallOutcome, InstallRequest, Location, PlatformInstaller, merge_dir, remove_dir_if_exists, replace_dir};
use crate::model::{DownloadLink, OperatingSystem};
use crate::platform::ExecutionStrategy;
use crate::process::ProcessSpec;

const PKG_EXTENSION: &str = ".pkg";
const SCRIPTS_DIR: &str = "package.pkg/Scripts";

pub struct MacOsInstaller;

/// Expand `pkg` into `dest` unless a previous expansion is there
///
/// A forced expansion removes the previous one first.
pub async fn expand_package(pkg: &Path, dest: &Path, force: bool, verbose: bool) -> Result<()> {
    if dest.exists() {
        if !force {
            debug!("{} already expanded", pkg.display());
            return Ok(());
        }
        remove_dir_if_exists(dest).await?;
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HangarError::fs(parent, crate::error::FileOperation::CreateDir, e))?;
    }
    ProcessSpec::new("pkgutil")
        .arg("--expand-full")
        .arg(pkg.display().to_string())
        .arg(dest.display().to_string())
        .verbose(verbose)
        .run()
        .await
}

/// `<extracts>/<local filename>/package.pkg/Scripts`
pub fn scripts_dir(extracts: &Path, local_filename: &str) -> PathBuf {
    extracts.join(local_filename).join(SCRIPTS_DIR)
}

#[async_trait]
impl PlatformInstaller for MacOsInstaller {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool {
        target == OperatingSystem::MacOS && strategy == ExecutionStrategy::Native
    }

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome> {
        let packages = request.require_links(PKG_EXTENSION)?;
        let extracts = ctx.paths.product_extracts(&request.product.id, OperatingSystem::MacOS);

        // A failed install keeps its expansion so the retry skips pkgutil
        let outcome = install_packages(ctx, request, &packages, &extracts).await?;
        remove_dir_if_exists(&extracts).await?;
        Ok(outcome)
    }

    fn default_launcher(&self, location: &Location, _title: &str) -> Option<PathBuf> {
        if is_app_bundle(&location.install_dir) {
            return Some(location.install_dir.clone());
        }
        WalkDir::new(&location.install_dir)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.into_path())
            .find(|path| is_app_bundle(path))
    }
}

/// Expand each package and move or merge its payload into the apps directory
async fn install_packages(
    ctx: &Context,
    request: &InstallRequest<'_>,
    packages: &[&DownloadLink],
    extracts: &Path,
) -> Result<InstallOutcome> {
    let id = &request.product.id;
    let apps_dir = ctx.paths.os_lang_apps(OperatingSystem::MacOS, request.lang_code);
    let mut outcome: Option<InstallOutcome> = None;

    for link in packages {
        info!("Expanding {}", link.local_filename);
        expand_package(
            &request.local_path(link),
            &extracts.join(&link.local_filename),
            request.force,
            ctx.config.verbose,
        )
        .await?;

        let scripts = scripts_dir(extracts, &link.local_filename);
        let script = PostInstallScript::load(&scripts.join("postinstall"))?;
        for command in &script.custom_commands {
            warn!("{} declares a custom postinstall command, not run: {}", link.local_filename, command);
        }
        let bundle_name = script.bundle_name.clone().ok_or_else(|| HangarError::MissingMetadata {
            id: id.clone(),
            field: "bundle name".to_string(),
        })?;

        let bundle_dir = apps_dir.join(&bundle_name);
        let payload = scripts.join("payload");
        if script.is_dlc() {
            debug!("Merging {} into {}", link.local_filename, bundle_dir.display());
            merge_dir(&payload, &bundle_dir)?;
        } else {
            debug!("Moving payload of {} to {}", link.local_filename, bundle_dir.display());
            replace_dir(&payload, &bundle_dir).await?;
        }

        if outcome.is_none() || !script.is_dlc() {
            outcome = Some(InstallOutcome {
                install_dir: bundle_dir,
                bundle_name: Some(bundle_name),
            });
        }
    }

    outcome.ok_or_else(|| HangarError::MissingMetadata {
        id: id.clone(),
        field: "macOS package installer".to_string(),
    })
}

fn is_app_bundle(path: &Path) -> bool {
    path.is_dir() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("app"))
}
