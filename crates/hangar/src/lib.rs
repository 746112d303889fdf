//! Hangar Library
//!
//! Acquires, validates, installs, launches and removes catalog products
//! on macOS, Linux and Windows hosts, running Windows products elsewhere
//! through a compatibility runtime.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hangar::{Context, HangarConfig, InstallOptions, TracingProgressReporter};
//! use hangar::progress::IntoProgressCallback;
//!
//! # async fn example() -> hangar::Result<()> {
//! let context = Context::builder(HangarConfig::from_env())
//!     .progress(TracingProgressReporter::new(false).into_callback())
//!     .build()?;
//!
//! let options = InstallOptions::new(vec!["1207658924".to_string()], "en");
//! let report = hangar::operations::install(&context, &options).await?;
//! println!("installed {} product(s)", report.succeeded.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Catalog resolution**: packs flattened into their games, DLCs skipped
//! - **Validation**: streaming MD5 checks with a single repair download
//! - **Per-OS installers**: `.pkg` expansion, Linux `.sh`, Windows setup in a prefix
//! - **Launch resolution**: pinned executables, game info play tasks, default launchers
//! - **Steam shortcuts**: binary `shortcuts.vdf` upserts and grid artwork
//! - **Runtime releases**: cached GitHub releases of Wine, Proton and umu

pub mod catalog;
pub mod compat;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod install;
pub mod model;
pub mod operations;
pub mod platform;
pub mod process;
pub mod progress;
pub mod releases;
pub mod shortcuts;
pub mod state;
pub mod store;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types for convenience
pub use config::{HangarConfig, Paths, ServerConnection};
pub use context::{Context, ContextBuilder};
pub use error::{ErrorSeverity, HangarError, Result};
pub use model::{DownloadLink, DownloadType, LinkFilter, OperatingSystem, Product, ProductType};
pub use operations::{
    BatchReport, DownloadOptions, InstallOptions, RunOptions, UninstallOptions, ValidateOptions,
};
pub use platform::{ExecutionStrategy, RuntimeKind};
pub use progress::{
    CompositeProgressReporter, NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter,
    TracingProgressReporter,
};
pub use releases::ReleaseSelector;
pub use validation::ValidationResult;
