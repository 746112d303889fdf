//! Linux `.sh` installers run unattended into the apps directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::context::Context;
use crate::error::Result;
use crate::install::{InstallOutcome, InstallRequest, Location, PlatformInstaller};
use crate::model::OperatingSystem;
use crate::platform::ExecutionStrategy;
use crate::process::ProcessSpec;

const SH_EXTENSION: &str = ".sh";
const START_SCRIPT: &str = "start.sh";

pub struct LinuxInstaller;

/// Arguments passed through to the embedded setup after `--`
pub fn installer_args(destination: &Path) -> Vec<String> {
    vec![
        "--".to_string(),
        "--i-agree-to-all-licenses".to_string(),
        "--noreadme".to_string(),
        "--nooptions".to_string(),
        "--noprompt".to_string(),
        "--destination".to_string(),
        destination.display().to_string(),
    ]
}

#[async_trait]
impl PlatformInstaller for LinuxInstaller {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool {
        target == OperatingSystem::Linux && strategy == ExecutionStrategy::Native
    }

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome> {
        let slug = request.product.require_slug()?;
        let install_dir = ctx.paths.os_lang_apps(OperatingSystem::Linux, request.lang_code).join(slug);

        for link in request.require_links(SH_EXTENSION)? {
            let installer = request.local_path(link);
            info!("Running {}", link.local_filename);
            make_executable(&installer)?;
            ProcessSpec::new(&installer)
                .args(installer_args(&install_dir))
                .verbose(ctx.config.verbose)
                .run()
                .await?;
        }

        Ok(InstallOutcome {
            install_dir,
            bundle_name: Some(slug.to_string()),
        })
    }

    fn default_launcher(&self, location: &Location, _title: &str) -> Option<PathBuf> {
        let start = location.install_dir.join(START_SCRIPT);
        start.is_file().then_some(start)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|e| crate::error::HangarError::fs(path, crate::error::FileOperation::Metadata, e))?;
    let mut permissions = metadata.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    std::fs::set_permissions(path, permissions)
        .map_err(|e| crate::error::HangarError::fs(path, crate::error::FileOperation::Write, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
