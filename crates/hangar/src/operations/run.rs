//! Launching an installed game

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec;
use crate::model::{Product, ProductType};
use crate::operations::{DEFAULT_LANG_CODE, RunOptions};
use crate::state::InstallParameters;
use crate::store::property;

/// Packs and DLCs are never run directly
fn require_game(product: &Product, action: &str) -> Result<()> {
    let (related_label, related) = match product.product_type {
        ProductType::Game => return Ok(()),
        ProductType::Pack => ("included game(s)", &product.included_games),
        ProductType::Dlc => ("required game(s)", &product.required_games),
    };
    Err(HangarError::ProductTypeConflict {
        id: product.id.clone(),
        product_type: product.product_type,
        action: action.to_string(),
        related_label: related_label.to_string(),
        related: related.join(","),
    })
}

/// Resolve the launch target of an installed game and run it
///
/// Returns the exit code; a non-zero code is logged, not an error.
pub async fn run(ctx: &Context, options: &RunOptions) -> Result<Option<i32>> {
    let id = options.id.as_str();
    let product = ctx.catalog.product(id, options.force).await?;
    require_game(&product, "run")?;

    let pinned = InstallParameters::load(&ctx.properties, id)?;
    let target = options
        .operating_system
        .or(pinned.as_ref().map(|params| params.operating_system))
        .unwrap_or_else(|| ctx.host_os());
    let lang_code = options
        .lang_code
        .clone()
        .or(pinned.map(|params| params.lang_code))
        .unwrap_or_else(|| DEFAULT_LANG_CODE.to_string());

    ctx.properties.replace_values(
        property::LAST_RUN_DATE,
        id,
        vec![Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)],
    )?;

    let task = exec::resolve(ctx, id, target, &lang_code, &options.request).await?;
    info!("Running {} ({}) with {}", product.title, id, task.exe.display());
    let spec = exec::command(ctx, id, &task).await?;

    let code = spec.launch().await?;
    match code {
        Some(0) | None => {}
        Some(code) => warn!("{} exited with code {}", task.name, code),
    }
    Ok(code)
}
