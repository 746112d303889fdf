//! Proton through `umu-run --config <file>` on Linux hosts

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compat::with_task_env;
use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec::ExecutionTask;
use crate::process::ProcessSpec;
use crate::releases::runtime;
use crate::store::kv::write_atomic;
use crate::store::property;

const STORE: &str = "gog";
/// Game id umu uses when no Steam app id is known
const DEFAULT_GAME_ID: &str = "0";

/// The `[umu]` table of a run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UmuConfig {
    pub prefix: PathBuf,
    pub proton: PathBuf,
    pub game_id: String,
    pub exe: PathBuf,
    pub launch_args: Vec<String>,
    pub store: String,
}

#[derive(Serialize)]
struct UmuDocument<'a> {
    umu: &'a UmuConfig,
}

impl UmuConfig {
    pub fn new(prefix: &Path, proton: &Path, task: &ExecutionTask, steam_app_id: Option<&str>) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
            proton: proton.to_path_buf(),
            game_id: steam_app_id
                .filter(|id| !id.is_empty())
                .map(|id| format!("umu-{}", id))
                .unwrap_or_else(|| DEFAULT_GAME_ID.to_string()),
            exe: task.exe.clone(),
            launch_args: task.args.clone(),
            store: STORE.to_string(),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(&UmuDocument { umu: self }).map_err(|source| HangarError::Toml {
            context: format!("umu config of {}", self.exe.display()),
            source,
        })
    }
}

/// `_umu-configs/<id>.toml`, rewritten before every invocation
pub fn config_path(ctx: &Context, id: &str) -> PathBuf {
    ctx.paths.umu_configs.join(format!("{}.toml", id))
}

pub async fn command(ctx: &Context, id: &str, prefix: &Path, task: &ExecutionTask) -> Result<ProcessSpec> {
    let proton = runtime::proton_path(ctx)?;
    let umu_run = runtime::umu_run_path(ctx)?;
    let steam_app_id = ctx.properties.get_last_value(property::STEAM_APP_ID, id)?;

    let config = UmuConfig::new(prefix, &proton, task, steam_app_id.as_deref());
    let path = config_path(ctx, id);
    write_atomic(&path, config.to_toml()?.as_bytes())?;
    debug!("Wrote umu config {}", path.display());

    let spec = ProcessSpec::new(umu_run)
        .arg("--config")
        .arg(path.display().to_string());
    Ok(with_task_env(spec, task))
}
