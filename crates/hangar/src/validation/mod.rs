//! Checksum validation of downloaded files with a single repair attempt
//!
//! Every link of a product is checked against its declared MD5. Files that
//! do not match are fetched again exactly once and checked again; a second
//! mismatch is a hard [`HangarError::ChecksumMismatch`].

use md5::{Digest, Md5};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::config::ServerConnection;
use crate::error::{HangarError, Result};
use crate::model::{DownloadLink, LinkFilter, Product};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::transport::{Transport, files_url};

const BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of checking one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationResult {
    Valid,
    Mismatch,
    MissingChecksum,
    FileNotFound,
    Error,
}

impl ValidationResult {
    pub const ALL: [ValidationResult; 5] = [
        Self::Valid,
        Self::Mismatch,
        Self::MissingChecksum,
        Self::FileNotFound,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Mismatch => "checksum mismatch",
            Self::MissingChecksum => "missing checksum",
            Self::FileNotFound => "not found",
            Self::Error => "validation error",
        }
    }

    /// Only a mismatch counts against the product
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Mismatch)
    }
}

/// Result for one link of a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValidation {
    pub local_filename: String,
    pub manual_url: String,
    pub result: ValidationResult,
    pub detail: Option<String>,
}

/// Results for every checked link of a product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductValidation {
    pub id: String,
    pub links: Vec<LinkValidation>,
    /// Links fetched again after a mismatch
    pub repaired: Vec<String>,
}

impl ProductValidation {
    pub fn count(&self, result: ValidationResult) -> usize {
        self.links.iter().filter(|l| l.result == result).count()
    }

    pub fn has_mismatches(&self) -> bool {
        self.links.iter().any(|l| l.result.is_failure())
    }

    pub fn mismatched(&self) -> impl Iterator<Item = &LinkValidation> {
        self.links.iter().filter(|l| l.result.is_failure())
    }

    /// "all 2 files valid", "some (1 of 3) files checksum mismatch" ...
    pub fn summary(&self) -> String {
        let total = self.links.len();
        if total == 0 {
            return "no files to validate".to_string();
        }
        ValidationResult::ALL
            .iter()
            .filter_map(|result| match self.count(*result) {
                0 => None,
                n if n == total => Some(format!("all {} file(s) {}", n, result.as_str())),
                n => Some(format!("some ({} of {}) file(s) {}", n, total, result.as_str())),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Streaming MD5 of a file as lowercase hex
pub async fn md5_file(path: &Path, progress_callback: Option<&ProgressCallback>) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let total = file.metadata().await?.len();
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut read_total = 0u64;
    let mut last_reported = 0.0;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        read_total += read as u64;

        if let Some(callback) = progress_callback {
            let progress = if total > 0 { read_total as f64 / total as f64 } else { 1.0 };
            if progress - last_reported >= 0.01 || read_total == total {
                callback(ProgressEvent::ValidationProgress {
                    file: path.display().to_string(),
                    progress,
                });
                last_reported = progress;
            }
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Check one link's file inside `dir`
pub async fn validate_link(dir: &Path, link: &DownloadLink, progress_callback: Option<&ProgressCallback>) -> LinkValidation {
    let path = dir.join(&link.local_filename);
    let mut validation = LinkValidation {
        local_filename: link.local_filename.clone(),
        manual_url: link.manual_url.clone(),
        result: ValidationResult::FileNotFound,
        detail: None,
    };

    if !path.is_file() {
        debug!("{} not found", path.display());
        return finish(validation, progress_callback);
    }
    let Some(expected) = link.checksum() else {
        validation.result = ValidationResult::MissingChecksum;
        return finish(validation, progress_callback);
    };

    if let Some(callback) = progress_callback {
        let total_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        callback(ProgressEvent::ValidationStarted {
            file: link.local_filename.clone(),
            total_size,
        });
    }

    match md5_file(&path, progress_callback).await {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => validation.result = ValidationResult::Valid,
        Ok(actual) => {
            debug!("MD5 mismatch for {}: expected={}, actual={}", path.display(), expected, actual);
            validation.result = ValidationResult::Mismatch;
            validation.detail = Some(format!("expected {}, got {}", expected, actual));
        }
        Err(e) => {
            warn!("Failed to hash {}: {}", path.display(), e);
            validation.result = ValidationResult::Error;
            validation.detail = Some(e.to_string());
        }
    }
    finish(validation, progress_callback)
}

fn finish(validation: LinkValidation, progress_callback: Option<&ProgressCallback>) -> LinkValidation {
    if let Some(callback) = progress_callback {
        callback(ProgressEvent::ValidationComplete {
            file: validation.local_filename.clone(),
            result: validation.result,
        });
    }
    validation
}

/// Check every link of `product` passing `filter` against files in `dir`
pub async fn validate_product(
    dir: &Path,
    product: &Product,
    filter: &LinkFilter,
    progress_callback: Option<&ProgressCallback>,
) -> ProductValidation {
    let mut validation = ProductValidation {
        id: product.id.clone(),
        ..Default::default()
    };
    for link in product.links(filter) {
        validation.links.push(validate_link(dir, link, progress_callback).await);
    }
    validation
}

/// Where repaired files come from
pub struct Repair<'a> {
    pub transport: &'a dyn Transport,
    pub server: &'a ServerConnection,
}

/// Validate, fetch mismatched files once more, validate those again
///
/// A filter that leaves no links is an error rather than an empty success.
pub async fn validate_and_repair(
    dir: &Path,
    product: &Product,
    filter: &LinkFilter,
    repair: Option<Repair<'_>>,
    progress_callback: Option<&ProgressCallback>,
) -> Result<ProductValidation> {
    if product.links(filter).next().is_none() {
        return Err(HangarError::NoMatchingLinks { id: product.id.clone() });
    }

    let mut validation = validate_product(dir, product, filter, progress_callback).await;
    let Some(repair) = repair else {
        return Ok(validation);
    };
    if !validation.has_mismatches() {
        return Ok(validation);
    }

    let mismatched: HashSet<String> = validation.mismatched().map(|l| l.manual_url.clone()).collect();
    let repair_filter = LinkFilter {
        manual_urls: mismatched.iter().cloned().collect(),
        ..filter.clone()
    };

    for link in product.links(&repair_filter) {
        info!("Re-downloading {} after checksum mismatch", link.local_filename);
        let url = files_url(repair.server, &link.manual_url)?;
        repair
            .transport
            .download(&url, dir, &link.local_filename, true, progress_callback.cloned())
            .await?;
        validation.repaired.push(link.local_filename.clone());

        let revalidated = validate_link(dir, link, progress_callback).await;
        if revalidated.result.is_failure() {
            return Err(HangarError::ChecksumMismatch {
                id: product.id.clone(),
                file: link.local_filename.clone(),
            });
        }
        if let Some(slot) = validation.links.iter_mut().find(|l| l.manual_url == link.manual_url) {
            *slot = revalidated;
        }
    }

    Ok(validation)
}
