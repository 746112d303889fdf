//! Expanding requested ids into installable games

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::catalog::source::CachedMetadataSource;
use crate::error::{HangarError, Result};
use crate::model::{OperatingSystem, Product, ProductType};

/// Upper bound on flattening rounds; deeper pack nesting is rejected
pub const MAX_ROUNDS: usize = 16;

/// Result of one flattening pass over a product set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenStep {
    pub ids: Vec<String>,
    /// True when at least one pack was expanded and another pass is needed
    pub flattened: bool,
    pub skipped_dlcs: Vec<String>,
}

/// Outcome of resolving a request down to games
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCatalog {
    pub games: Vec<String>,
    pub skipped_dlcs: Vec<String>,
    pub rounds: usize,
}

/// One pass: drop DLCs, keep games, replace packs with their included games
pub fn flatten_step(products: &[Product]) -> FlattenStep {
    let mut step = FlattenStep::default();
    let mut seen = HashSet::new();

    for product in products {
        if product.product_type == ProductType::Dlc {
            step.skipped_dlcs.push(product.id.clone());
        }
    }
    let candidates: Vec<&Product> = products
        .iter()
        .filter(|p| p.product_type != ProductType::Dlc)
        .collect();

    if candidates.iter().all(|p| p.product_type == ProductType::Game) {
        step.ids = candidates
            .iter()
            .filter(|p| seen.insert(p.id.clone()))
            .map(|p| p.id.clone())
            .collect();
        return step;
    }

    step.flattened = true;
    for product in candidates {
        let ids: Vec<&String> = match product.product_type {
            ProductType::Pack => product.included_games.iter().collect(),
            _ => vec![&product.id],
        };
        for id in ids {
            if seen.insert(id.clone()) {
                step.ids.push(id.clone());
            }
        }
    }
    step
}

/// Apply [`flatten_step`] until no packs remain
///
/// Fails when packs are still left after [`MAX_ROUNDS`] passes.
pub async fn resolve_games(source: &CachedMetadataSource, ids: &[String], force: bool) -> Result<ResolvedCatalog> {
    let mut resolved = ResolvedCatalog::default();
    let mut current = ids.to_vec();
    let mut expanded_packs = HashSet::new();

    loop {
        let products = source.products(&current, force).await?;
        // A pack that shows up again through its own contents contributes nothing new
        let products: Vec<Product> = products
            .into_iter()
            .filter(|p| p.product_type != ProductType::Pack || expanded_packs.insert(p.id.clone()))
            .collect();

        let step = flatten_step(&products);
        resolved.rounds += 1;

        for dlc in &step.skipped_dlcs {
            warn!("Skipping DLC {}, install the required game instead", dlc);
        }
        resolved.skipped_dlcs.extend(step.skipped_dlcs);

        if !step.flattened {
            resolved.games = step.ids;
            break;
        }
        if resolved.rounds >= MAX_ROUNDS {
            return Err(HangarError::configuration(
                format!("packs of {} are nested deeper than {} levels", ids.join(", "), MAX_ROUNDS),
                Some("Request the included games directly"),
            ));
        }
        debug!("Expanded packs into {} id(s)", step.ids.len());
        current = step.ids;
    }

    info!("Resolved {} requested id(s) into {} game(s)", ids.len(), resolved.games.len());
    Ok(resolved)
}

/// Keep ids with an installer for `os` in `lang_code`
pub async fn filter_supported(
    source: &CachedMetadataSource,
    ids: &[String],
    os: OperatingSystem,
    lang_code: &str,
    force: bool,
) -> Result<Vec<String>> {
    let mut supported = Vec::new();
    for id in ids {
        let product = source.product(id, force).await?;
        if product.is_supported(os, lang_code) {
            supported.push(id.clone());
        } else {
            info!("{} ({}) is not supported for {} {}", product.title, id, os, lang_code);
        }
    }
    Ok(supported)
}
