//! Steam shortcut sync and removal for installed products

use std::path::PathBuf;
use tracing::info;

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::operations::{BatchReport, DEFAULT_LANG_CODE};
use crate::shortcuts;
use crate::state::InstallParameters;

/// The executable Steam launches, this binary
pub(crate) fn launcher_exe() -> Result<PathBuf> {
    std::env::current_exe().map_err(|e| {
        HangarError::configuration(format!("cannot locate the hangar executable: {}", e), None)
    })
}

/// Add or refresh the shortcut of every id for every Steam user
///
/// The language defaults to the one the product was installed with.
pub async fn sync_shortcuts(ctx: &Context, ids: &[String], lang_code: Option<&str>, force: bool) -> Result<BatchReport> {
    let exe = launcher_exe()?;
    let mut report = BatchReport::default();

    for id in ids {
        let result = async {
            let lang_code = match lang_code {
                Some(lang_code) => lang_code.to_string(),
                None => InstallParameters::load(&ctx.properties, id)?
                    .map(|params| params.lang_code)
                    .unwrap_or_else(|| DEFAULT_LANG_CODE.to_string()),
            };
            shortcuts::sync_shortcut(ctx, &exe, id, &lang_code, force).await
        }
        .await;

        match result {
            Ok(outcomes) if outcomes.iter().any(|(_, outcome)| outcome.changed()) => {
                report.succeed(ctx, id, "steam-shortcut", format!("{} user(s)", outcomes.len()));
            }
            Ok(_) => {
                info!("Steam shortcut of {} is up to date", id);
                report.skipped.push(id.clone());
            }
            Err(e) => report.fail(ctx, id, "steam-shortcut", e),
        }
    }

    Ok(report)
}

pub async fn remove_shortcuts(ctx: &Context, ids: &[String]) -> Result<BatchReport> {
    let exe = launcher_exe()?;
    let mut report = BatchReport::default();

    for id in ids {
        match shortcuts::remove_shortcut(ctx, &exe, id).await {
            Ok(0) => report.skipped.push(id.clone()),
            Ok(removed) => report.succeed(ctx, id, "remove-steam-shortcut", format!("{} user(s)", removed)),
            Err(e) => report.fail(ctx, id, "remove-steam-shortcut", e),
        }
    }

    Ok(report)
}
