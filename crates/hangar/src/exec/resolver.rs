//! Finding what to launch for an installed product
//!
//! First match wins:
//! 1. an executable pinned for the product's prefix (compatibility layer only)
//! 2. the play task of a `goggame-<id>.info` descriptor, unless the default launcher was requested
//! 3. the platform default launcher: `.app` bundle, `start.sh` or a `.lnk` file

use std::path::PathBuf;
use tracing::{debug, info};

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec::{ExecutionTask, GameInfo, find_game_info};
use crate::model::{OperatingSystem, os_lang_code};
use crate::platform::{self, ExecutionStrategy};
use crate::store::property;

/// Caller choices for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub play_task: Option<String>,
    pub default_launcher: bool,
    pub env: Vec<String>,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
}

/// Language-qualified prefix name the pinned settings are stored under
pub fn prefix_settings_key(slug: &str, lang_code: &str) -> String {
    format!("{}/{}", slug, lang_code)
}

pub async fn resolve(
    ctx: &Context,
    id: &str,
    target: OperatingSystem,
    lang_code: &str,
    request: &RunRequest,
) -> Result<ExecutionTask> {
    let host = ctx.host_os();
    let strategy = platform::require(target, host)?;
    let record = ctx
        .records
        .record(id, target, lang_code)?
        .ok_or_else(|| HangarError::NotInstalled {
            id: id.to_string(),
            os_lang: os_lang_code(target, lang_code),
        })?;

    let installer = ctx.installers.find(target, host)?;
    let location = installer.locate(&record);

    let mut task = ExecutionTask {
        env: request.env.clone(),
        args: request.args.clone(),
        work_dir: request.work_dir.clone(),
        prefix: location.prefix.clone(),
        runtime: match strategy {
            ExecutionStrategy::CompatibilityLayer(runtime) => Some(runtime),
            _ => None,
        },
        ..Default::default()
    };

    if let Some(prefix) = &location.prefix {
        let key = prefix_settings_key(&ctx.slug(id)?, lang_code);
        if let Some(env) = ctx.properties.get_all_values(property::PREFIX_ENV, &key)? {
            task.env = merge_env(&task.env, &env);
        }
        if let Some(args) = ctx.properties.get_all_values(property::PREFIX_ARG, &key)? {
            task.args.extend(args);
        }
        if let Some(exe) = ctx.properties.get_last_value(property::PREFIX_EXE, &key)? {
            let pinned = prefix.join(exe.replace('\\', "/"));
            if pinned.is_file() {
                info!("Using pinned executable {}", pinned.display());
                return Ok(task.with_exe(pinned));
            }
            debug!("Pinned executable {} no longer exists", pinned.display());
        }
    }

    if !request.default_launcher {
        if let Some(info_path) = find_game_info(&location.install_dir, id) {
            let info = GameInfo::load(&info_path)?;
            match info.apply(&info_path, request.play_task.as_deref(), task.clone()) {
                Some(task) => return Ok(task),
                None => debug!("{} declares no matching play task", info_path.display()),
            }
        }
    }

    match installer.default_launcher(&location, &record.title) {
        Some(launcher) => {
            debug!("Using default launcher {}", launcher.display());
            if task.work_dir.is_none() {
                task.work_dir = launcher.parent().map(|dir| dir.to_path_buf());
            }
            Ok(task.with_exe(launcher))
        }
        None => Err(HangarError::NoRunnableTarget {
            id: id.to_string(),
            target,
        }),
    }
}

/// `KEY=VALUE` lists merged so that `overrides` win per key
pub fn merge_env(base: &[String], overrides: &[String]) -> Vec<String> {
    let key = |pair: &str| pair.split_once('=').map(|(k, _)| k.to_string()).unwrap_or_else(|| pair.to_string());
    let mut merged: Vec<String> = base
        .iter()
        .filter(|pair| !overrides.iter().any(|o| key(o) == key(pair)))
        .cloned()
        .collect();
    merged.extend(overrides.iter().cloned());
    merged
}
