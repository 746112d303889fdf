//! Windows products on macOS and Linux hosts, installed into a per-product prefix

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use crate::compat;
use crate::context::Context;
use crate::error::{FileOperation, HangarError, Result};
use crate::exec::ExecutionTask;
use crate::install::windows::{EXE_EXTENSION, SILENT_ARGS, START_MENU_PROGRAMS, find_lnk};
use crate::install::{InstallOutcome, InstallRequest, Location, PlatformInstaller};
use crate::model::OperatingSystem;
use crate::platform::{self, ExecutionStrategy};
use crate::state::InstalledRecord;

const DRIVE_C: &str = "drive_c";

pub struct PrefixInstaller;

#[async_trait]
impl PlatformInstaller for PrefixInstaller {
    fn name(&self) -> &'static str {
        "prefix"
    }

    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool {
        target == OperatingSystem::Windows && matches!(strategy, ExecutionStrategy::CompatibilityLayer(_))
    }

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome> {
        let setups = request.require_links(EXE_EXTENSION)?;
        let ExecutionStrategy::CompatibilityLayer(runtime) = platform::require(request.target, ctx.host_os())? else {
            return Err(HangarError::UnsupportedPlatform {
                target: request.target,
                host: ctx.host_os(),
                reason: "no compatibility layer for this host".to_string(),
            });
        };

        let slug = request.product.require_slug()?;
        let prefix = ctx.paths.prefix_dir(slug, request.lang_code);
        tokio::fs::create_dir_all(&prefix)
            .await
            .map_err(|e| HangarError::fs(&prefix, FileOperation::CreateDir, e))?;

        for link in setups {
            info!("Running {} in prefix {}", link.local_filename, prefix.display());
            let task = ExecutionTask::new(request.local_path(link))
                .args(SILENT_ARGS)
                .prefix(&prefix)
                .runtime(runtime)
                .work_dir(&request.downloads_dir);
            compat::command(ctx, runtime, &request.product.id, &task).await?.run().await?;
        }

        Ok(InstallOutcome {
            install_dir: prefix,
            bundle_name: Some(slug.to_string()),
        })
    }

    fn locate(&self, record: &InstalledRecord) -> Location {
        Location {
            install_dir: record.install_dir.join(DRIVE_C),
            prefix: Some(record.install_dir.clone()),
        }
    }

    fn default_launcher(&self, location: &Location, title: &str) -> Option<PathBuf> {
        let prefix = location.prefix.as_ref()?;
        find_lnk(
            &prefix.join(DRIVE_C).join("ProgramData").join(START_MENU_PROGRAMS),
            title,
        )
    }
}
