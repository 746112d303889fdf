//! Windows setup executables, native on Windows hosts

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::context::Context;
use crate::error::Result;
use crate::install::{InstallOutcome, InstallRequest, Location, PlatformInstaller};
use crate::model::OperatingSystem;
use crate::platform::ExecutionStrategy;
use crate::process::ProcessSpec;

pub(crate) const EXE_EXTENSION: &str = ".exe";

/// Start menu shortcuts, relative to `ProgramData`
pub(crate) const START_MENU_PROGRAMS: &str = "Microsoft/Windows/Start Menu/Programs";

/// Switches for an unattended setup run
pub const SILENT_ARGS: [&str; 3] = ["/VERYSILENT", "/NORESTART", "/SUPPRESSMSGBOXES"];

pub struct WindowsInstaller;

#[async_trait]
impl PlatformInstaller for WindowsInstaller {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool {
        target == OperatingSystem::Windows && strategy == ExecutionStrategy::Native
    }

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome> {
        let slug = request.product.require_slug()?;
        let install_dir = ctx.paths.os_lang_apps(OperatingSystem::Windows, request.lang_code).join(slug);

        for link in request.require_links(EXE_EXTENSION)? {
            info!("Running {}", link.local_filename);
            ProcessSpec::new(request.local_path(link))
                .args(SILENT_ARGS)
                .arg(format!("/DIR={}", install_dir.display()))
                .verbose(ctx.config.verbose)
                .run()
                .await?;
        }

        Ok(InstallOutcome {
            install_dir,
            bundle_name: Some(slug.to_string()),
        })
    }

    fn default_launcher(&self, location: &Location, title: &str) -> Option<PathBuf> {
        std::env::var_os("ProgramData")
            .and_then(|program_data| find_lnk(&PathBuf::from(program_data).join(START_MENU_PROGRAMS), title))
            .or_else(|| find_lnk(&location.install_dir, title))
    }
}

/// `.lnk` named after `title` below `dir`, else the first one found
pub(crate) fn find_lnk(dir: &Path, title: &str) -> Option<PathBuf> {
    let links: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(4)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("lnk")))
        .collect();

    links
        .iter()
        .find(|path| path.file_stem().is_some_and(|stem| stem.to_string_lossy() == title))
        .or_else(|| links.first())
        .cloned()
}
