//! File transport seam and its HTTP implementation

pub mod http;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::ServerConnection;
use crate::error::Result;
use crate::progress::ProgressCallback;

pub use http::{HttpTransport, build_client};

/// Result of a transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, size: u64 },
    AlreadyExists { path: PathBuf, size: u64 },
}

impl DownloadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DownloadOutcome::Downloaded { path, .. } | DownloadOutcome::AlreadyExists { path, .. } => path,
        }
    }
}

/// Moves bytes from `url` to `dest_dir/filename`
///
/// An existing destination is left alone unless `force` is set.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        force: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome>;
}

/// Server URL that serves the file behind a manual url
pub fn files_url(server: &ServerConnection, manual_url: &str) -> Result<String> {
    Ok(server.url("/api/files", &[("manual-url", manual_url)])?.to_string())
}

#[cfg(test)]
mod tests;
