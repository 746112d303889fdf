//! Fetching, checking and deleting the downloaded files of products

use std::path::Path;
use tracing::{Instrument, debug, info, info_span};

use crate::context::Context;
use crate::error::{FileOperation, HangarError, Result};
use crate::model::{LinkFilter, Product};
use crate::operations::{BatchReport, DownloadOptions, ValidateOptions};
use crate::progress::ProgressEvent;
use crate::transport::{DownloadOutcome, files_url};
use crate::validation::{Repair, validate_and_repair};

/// Download every link of `product` passing `filter` into its downloads directory
pub(crate) async fn download_product(ctx: &Context, product: &Product, filter: &LinkFilter, force: bool) -> Result<usize> {
    let server = ctx.server()?;
    let dir = ctx.paths.product_downloads(&product.id);
    let mut downloaded = 0;

    for link in product.links(filter) {
        let url = files_url(&server, &link.manual_url)?;
        let outcome = ctx
            .transport
            .download(&url, &dir, &link.local_filename, force, Some(ctx.progress().clone()))
            .instrument(info_span!("download", id = %product.id, file = %link.local_filename))
            .await?;
        match outcome {
            DownloadOutcome::Downloaded { size, .. } => {
                debug!("Downloaded {} ({} bytes)", link.local_filename, size);
                downloaded += 1;
            }
            DownloadOutcome::AlreadyExists { .. } => debug!("{} already downloaded", link.local_filename),
        }
    }

    Ok(downloaded)
}

/// Delete downloaded files of `product` passing `filter`, then its directory when empty
pub(crate) async fn remove_product_downloads(ctx: &Context, product: &Product, filter: &LinkFilter) -> Result<usize> {
    let dir = ctx.paths.product_downloads(&product.id);
    let mut removed = 0;

    for link in product.links(filter) {
        let path = dir.join(&link.local_filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(HangarError::fs(path, FileOperation::Delete, e)),
        }
    }

    remove_dir_if_empty(&dir).await?;
    Ok(removed)
}

async fn remove_dir_if_empty(dir: &Path) -> Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(HangarError::fs(dir, FileOperation::Read, e)),
    };
    let empty = entries
        .next_entry()
        .await
        .map_err(|e| HangarError::fs(dir, FileOperation::Read, e))?
        .is_none();
    if empty {
        tokio::fs::remove_dir(dir)
            .await
            .map_err(|e| HangarError::fs(dir, FileOperation::Delete, e))?;
    }
    Ok(())
}

pub async fn download(ctx: &Context, options: &DownloadOptions) -> Result<BatchReport> {
    let filter = options.filter();
    let mut report = BatchReport::default();
    ctx.report(ProgressEvent::OperationStarted {
        operation: "download",
        items: options.ids.len(),
    });

    for id in &options.ids {
        ctx.report(ProgressEvent::ItemStarted {
            id: id.clone(),
            step: "download",
        });
        let result = async {
            let product = ctx.catalog.product(id, options.force).await?;
            download_product(ctx, &product, &filter, options.force).await
        }
        .await;

        match result {
            Ok(count) => report.succeed(ctx, id, "download", format!("{} file(s) downloaded", count)),
            Err(e) => report.fail(ctx, id, "download", e),
        }
    }

    ctx.report(ProgressEvent::OperationCompleted {
        operation: "download",
        succeeded: report.succeeded.len(),
        failed: report.failed.len(),
    });
    Ok(report)
}

pub async fn remove_downloads(ctx: &Context, options: &DownloadOptions) -> Result<BatchReport> {
    let filter = options.filter();
    let mut report = BatchReport::default();

    for id in &options.ids {
        let result = async {
            let product = ctx.catalog.product(id, false).await?;
            remove_product_downloads(ctx, &product, &filter).await
        }
        .await;

        match result {
            Ok(0) => {
                info!("No downloads of {} to remove", id);
                report.skipped.push(id.clone());
            }
            Ok(count) => report.succeed(ctx, id, "remove-downloads", format!("{} file(s) removed", count)),
            Err(e) => report.fail(ctx, id, "remove-downloads", e),
        }
    }

    Ok(report)
}

/// Check downloaded files against their checksums
///
/// An id fails when a mismatch remains, after the single repair download
/// when `repair` is set.
pub async fn validate(ctx: &Context, options: &ValidateOptions) -> Result<BatchReport> {
    let filter = options.filter();
    let server = if options.repair { Some(ctx.server()?) } else { None };
    let mut report = BatchReport::default();
    ctx.report(ProgressEvent::OperationStarted {
        operation: "validate",
        items: options.ids.len(),
    });

    for id in &options.ids {
        ctx.report(ProgressEvent::ItemStarted {
            id: id.clone(),
            step: "validate",
        });
        let result = async {
            let product = ctx.catalog.product(id, false).await?;
            let repair = server.as_ref().map(|server| Repair {
                transport: ctx.transport.as_ref(),
                server,
            });
            validate_and_repair(
                &ctx.paths.product_downloads(id),
                &product,
                &filter,
                repair,
                Some(ctx.progress()),
            )
            .await
        }
        .await;

        match result {
            Ok(validation) if validation.has_mismatches() => {
                let summary = validation.summary();
                report.fail(
                    ctx,
                    id,
                    "validate",
                    HangarError::ChecksumMismatch {
                        id: id.clone(),
                        file: validation
                            .mismatched()
                            .map(|link| link.local_filename.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    },
                );
                info!("{}: {}", id, summary);
            }
            Ok(validation) => {
                info!("{}: {}", id, validation.summary());
                report.succeed(ctx, id, "validate", validation.summary());
            }
            Err(e) => report.fail(ctx, id, "validate", e),
        }
    }

    ctx.report(ProgressEvent::OperationCompleted {
        operation: "validate",
        succeeded: report.succeeded.len(),
        failed: report.failed.len(),
    });
    Ok(report)
}
