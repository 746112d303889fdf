//! Catalog resolution: metadata sources and the pack/DLC flattening rules

pub mod resolver;
pub mod source;

pub use resolver::{FlattenStep, MAX_ROUNDS, ResolvedCatalog, filter_supported, flatten_step, resolve_games};
pub use source::{CachedMetadataSource, HttpMetadataSource, MetadataSource};

#[cfg(test)]
mod tests;
