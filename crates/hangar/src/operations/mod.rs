//! Operations: the orchestration surface the CLI wraps
//!
//! Every operation takes the [`Context`] and an explicit options record.
//! Batch operations walk their ids left to right; a failing id is reported
//! and recorded in the [`BatchReport`] without stopping its siblings.

pub mod downloads;
pub mod install;
pub mod manage;
pub mod releases;
pub mod run;
pub mod shortcuts;

use tracing::error;

use crate::catalog::{self, ResolvedCatalog};
use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec::RunRequest;
use crate::model::{DownloadType, LinkFilter, OperatingSystem};
use crate::progress::ProgressEvent;

pub use downloads::{download, remove_downloads, validate};
pub use install::{install, uninstall};
pub use manage::{
    InstalledSummary, PrefixSettings, ServerSetup, list_installed, pin_prefix_settings, setup_server,
    test_server_connection,
};
pub use releases::{cache_releases, cleanup_releases};
pub use run::run;
pub use shortcuts::{remove_shortcuts, sync_shortcuts};

pub const DEFAULT_LANG_CODE: &str = "en";

/// Download types installed when none are requested
pub const DEFAULT_DOWNLOAD_TYPES: [DownloadType; 2] = [DownloadType::Installer, DownloadType::Dlc];

/// What happened to each id of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    /// `(id, error message)`
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn fail(&mut self, ctx: &Context, id: &str, step: &'static str, err: HangarError) {
        error!("{} {} failed: {}", step, id, err);
        let message = err.to_string();
        ctx.report(ProgressEvent::ItemFailed {
            id: id.to_string(),
            step,
            error: message.clone(),
        });
        self.failed.push((id.to_string(), message));
    }

    pub(crate) fn succeed(&mut self, ctx: &Context, id: &str, step: &'static str, message: impl Into<String>) {
        ctx.report(ProgressEvent::ItemCompleted {
            id: id.to_string(),
            step,
            message: message.into(),
        });
        self.succeeded.push(id.to_string());
    }
}

/// Options of [`install`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub ids: Vec<String>,
    /// Target platform, the host when unset
    pub operating_system: Option<OperatingSystem>,
    pub lang_code: String,
    pub download_types: Vec<DownloadType>,
    pub keep_downloads: bool,
    pub no_steam_shortcut: bool,
    pub force: bool,
}

impl InstallOptions {
    pub fn new(ids: Vec<String>, lang_code: impl Into<String>) -> Self {
        Self {
            ids,
            operating_system: None,
            lang_code: lang_code.into(),
            download_types: DEFAULT_DOWNLOAD_TYPES.to_vec(),
            keep_downloads: false,
            no_steam_shortcut: false,
            force: false,
        }
    }

    pub fn operating_system(mut self, os: OperatingSystem) -> Self {
        self.operating_system = Some(os);
        self
    }

    pub fn download_types(mut self, types: &[DownloadType]) -> Self {
        self.download_types = types.to_vec();
        self
    }

    pub fn keep_downloads(mut self, keep: bool) -> Self {
        self.keep_downloads = keep;
        self
    }

    pub fn no_steam_shortcut(mut self, skip: bool) -> Self {
        self.no_steam_shortcut = skip;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub(crate) fn target(&self, host: OperatingSystem) -> OperatingSystem {
        self.operating_system.unwrap_or(host)
    }

    pub(crate) fn filter(&self, target: OperatingSystem) -> LinkFilter {
        LinkFilter::new()
            .operating_systems(&[target])
            .language_codes(&[&self.lang_code])
            .download_types(&self.download_types)
    }
}

/// Options of [`uninstall`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOptions {
    pub ids: Vec<String>,
    /// Platform the products were installed for, the pinned one when unset
    pub operating_system: Option<OperatingSystem>,
    pub lang_code: String,
    /// Uninstall does nothing without it
    pub force: bool,
}

impl UninstallOptions {
    pub fn new(ids: Vec<String>, lang_code: impl Into<String>) -> Self {
        Self {
            ids,
            operating_system: None,
            lang_code: lang_code.into(),
            force: false,
        }
    }

    pub fn operating_system(mut self, os: OperatingSystem) -> Self {
        self.operating_system = Some(os);
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Options of [`run`]; os and language default to the pinned install parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub id: String,
    pub operating_system: Option<OperatingSystem>,
    pub lang_code: Option<String>,
    pub request: RunRequest,
    pub force: bool,
}

impl RunOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Options of [`download`] and [`remove_downloads`]
///
/// Empty os, language or type lists match every link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    pub ids: Vec<String>,
    pub operating_systems: Vec<OperatingSystem>,
    pub lang_codes: Vec<String>,
    pub download_types: Vec<DownloadType>,
    pub manual_urls: Vec<String>,
    pub force: bool,
}

impl DownloadOptions {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> LinkFilter {
        LinkFilter {
            operating_systems: self.operating_systems.clone(),
            language_codes: self.lang_codes.clone(),
            download_types: self.download_types.clone(),
            manual_urls: self.manual_urls.clone(),
        }
    }
}

/// Options of [`validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    pub ids: Vec<String>,
    pub operating_systems: Vec<OperatingSystem>,
    pub lang_codes: Vec<String>,
    pub download_types: Vec<DownloadType>,
    /// Re-download mismatched files once
    pub repair: bool,
}

impl ValidateOptions {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            repair: true,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> LinkFilter {
        LinkFilter::new()
            .operating_systems(&self.operating_systems)
            .language_codes(&self.lang_codes)
            .download_types(&self.download_types)
    }
}

/// Expand requested ids into installable games
pub async fn resolve_catalog(ctx: &Context, ids: &[String], force: bool) -> Result<ResolvedCatalog> {
    catalog::resolve_games(&ctx.catalog, ids, force).await
}
