//! Install and uninstall pipelines

use chrono::{SecondsFormat, Utc};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::catalog::{filter_supported, resolve_games};
use crate::context::Context;
use crate::error::Result;
use crate::install::install_product;
use crate::model::{OperatingSystem, os_lang_code};
use crate::operations::downloads::{download_product, remove_product_downloads};
use crate::operations::shortcuts::launcher_exe;
use crate::operations::{BatchReport, InstallOptions, UninstallOptions};
use crate::platform;
use crate::progress::ProgressEvent;
use crate::shortcuts;
use crate::state::{InstallParameters, InstalledRecord};
use crate::store::property;
use crate::validation::{Repair, validate_and_repair};

/// Resolve, download, validate, install, add shortcuts and pin parameters
///
/// Packs are flattened into their games and DLCs skipped. Ids without an
/// installer for the target are dropped; when none remain nothing happens.
/// Already installed ids are skipped unless `force`.
pub async fn install(ctx: &Context, options: &InstallOptions) -> Result<BatchReport> {
    let host = ctx.host_os();
    let target = options.target(host);
    platform::require(target, host)?;

    let mut report = BatchReport::default();
    let resolved = resolve_games(&ctx.catalog, &options.ids, options.force).await?;
    report.skipped.extend(resolved.skipped_dlcs);

    // Metadata was refreshed by the resolution above when forced
    let supported = filter_supported(&ctx.catalog, &resolved.games, target, &options.lang_code, false).await?;
    report
        .skipped
        .extend(resolved.games.iter().filter(|id| !supported.contains(id)).cloned());
    if supported.is_empty() {
        let message = format!("requested products are not supported on {} ({})", target, options.lang_code);
        info!("{}", message);
        ctx.report(ProgressEvent::Warning { message });
        return Ok(report);
    }

    let ids = if options.force {
        supported
    } else {
        let not_installed = ctx.records.filter_not_installed(&supported, target, &options.lang_code)?;
        report
            .skipped
            .extend(supported.iter().filter(|id| !not_installed.contains(id)).cloned());
        if not_installed.is_empty() {
            info!("All requested products are already installed");
            return Ok(report);
        }
        not_installed
    };

    ctx.report(ProgressEvent::OperationStarted {
        operation: "install",
        items: ids.len(),
    });
    for id in &ids {
        ctx.report(ProgressEvent::ItemStarted {
            id: id.clone(),
            step: "install",
        });
        let result = install_one(ctx, options, target, id)
            .instrument(info_span!("product", id = %id, os = %target))
            .await;
        match result {
            Ok(Some(record)) => {
                let message = format!("installed into {}", record.install_dir.display());
                report.succeed(ctx, id, "install", message);
            }
            Ok(None) => report.skipped.push(id.clone()),
            Err(e) => report.fail(ctx, id, "install", e),
        }
    }
    ctx.report(ProgressEvent::OperationCompleted {
        operation: "install",
        succeeded: report.succeeded.len(),
        failed: report.failed.len(),
    });

    Ok(report)
}

async fn install_one(
    ctx: &Context,
    options: &InstallOptions,
    target: OperatingSystem,
    id: &str,
) -> Result<Option<InstalledRecord>> {
    let product = ctx.catalog.product(id, false).await?;
    let filter = options.filter(target);
    if product.links(&filter).next().is_none() {
        info!("No links of {} match {} {}", id, target, options.lang_code);
        return Ok(None);
    }

    download_product(ctx, &product, &filter, options.force).await?;

    let server = ctx.server()?;
    let validation = validate_and_repair(
        &ctx.paths.product_downloads(id),
        &product,
        &filter,
        Some(Repair {
            transport: ctx.transport.as_ref(),
            server: &server,
        }),
        Some(ctx.progress()),
    )
    .await?;
    info!("Validated {}: {}", id, validation.summary());

    let Some(record) = install_product(
        ctx,
        &product,
        target,
        &options.lang_code,
        &options.download_types,
        options.force,
    )
    .await?
    else {
        return Ok(None);
    };

    InstallParameters {
        operating_system: target,
        lang_code: options.lang_code.clone(),
        download_types: options.download_types.clone(),
        keep_downloads: options.keep_downloads,
        no_steam_shortcut: options.no_steam_shortcut,
    }
    .pin(&ctx.properties, id)?;

    if !options.no_steam_shortcut {
        add_shortcut(ctx, id, &options.lang_code, options.force).await;
    }

    if !options.keep_downloads {
        let removed = remove_product_downloads(ctx, &product, &filter).await?;
        debug!("Removed {} download(s) of {}", removed, id);
    }

    ctx.properties.replace_values(
        property::INSTALL_DATE,
        id,
        vec![Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)],
    )?;

    Ok(Some(record))
}

/// The product is installed at this point; shortcut problems only warn
async fn add_shortcut(ctx: &Context, id: &str, lang_code: &str, force: bool) {
    let result = match launcher_exe() {
        Ok(exe) => shortcuts::sync_shortcut(ctx, &exe, id, lang_code, force).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(outcomes) => {
            let changed = outcomes.iter().filter(|(_, outcome)| outcome.changed()).count();
            debug!("Steam shortcut of {} changed for {} user(s)", id, changed);
        }
        Err(e) => {
            let message = format!("Steam shortcut for {} was not added: {}", id, e);
            warn!("{}", message);
            ctx.report(ProgressEvent::Warning { message });
        }
    }
}

/// Reverse install side effects, drop records, parameters and shortcuts
///
/// Does nothing unless `force` is set.
pub async fn uninstall(ctx: &Context, options: &UninstallOptions) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    if !options.force {
        let message = "uninstall requires the force flag".to_string();
        info!("{}", message);
        ctx.report(ProgressEvent::Warning { message });
        return Ok(report);
    }

    let resolved = resolve_games(&ctx.catalog, &options.ids, false).await?;
    report.skipped.extend(resolved.skipped_dlcs);

    ctx.report(ProgressEvent::OperationStarted {
        operation: "uninstall",
        items: resolved.games.len(),
    });
    for id in &resolved.games {
        let result = uninstall_one(ctx, options, id)
            .instrument(info_span!("product", id = %id))
            .await;
        match result {
            Ok(true) => report.succeed(ctx, id, "uninstall", "uninstalled"),
            Ok(false) => report.skipped.push(id.clone()),
            Err(e) => report.fail(ctx, id, "uninstall", e),
        }
    }
    ctx.report(ProgressEvent::OperationCompleted {
        operation: "uninstall",
        succeeded: report.succeeded.len(),
        failed: report.failed.len(),
    });

    Ok(report)
}

async fn uninstall_one(ctx: &Context, options: &UninstallOptions, id: &str) -> Result<bool> {
    let os = match options.operating_system {
        Some(os) => os,
        None => shortcuts::installed_os(ctx, id)?,
    };
    let Some(record) = ctx.records.record(id, os, &options.lang_code)? else {
        info!("{} is not installed for {}", id, os_lang_code(os, &options.lang_code));
        return Ok(false);
    };

    let installer = ctx.installers.find(os, ctx.host_os())?;
    installer.uninstall(ctx, &record).await?;
    ctx.records.unmark(id, os, &options.lang_code)?;
    InstallParameters::unpin(&ctx.properties, &[id])?;

    match remove_shortcut(ctx, id).await {
        Ok(0) => debug!("No Steam shortcut of {} to remove", id),
        Ok(removed) => info!("Removed Steam shortcut of {} for {} user(s)", id, removed),
        Err(e) => warn!("Steam shortcut of {} was not removed: {}", id, e),
    }

    info!("Uninstalled {} ({})", record.title, id);
    Ok(true)
}

async fn remove_shortcut(ctx: &Context, id: &str) -> Result<usize> {
    let exe = launcher_exe()?;
    shortcuts::remove_shortcut(ctx, &exe, id).await
}

