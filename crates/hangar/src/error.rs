//! Error types for catalog, install, run and shortcut operations with context and recovery information

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{OperatingSystem, ProductType};

/// Error types shared by every hangar operation
#[derive(Error, Debug)]
pub enum HangarError {
    /// Target/host combination that cannot run or install
    #[error("{reason} (target: {target}, host: {host})")]
    UnsupportedPlatform {
        target: OperatingSystem,
        host: OperatingSystem,
        reason: String,
    },

    /// Metadata record absent or missing a required field
    #[error("Product {id} is missing required metadata: {field}")]
    MissingMetadata {
        id: String,
        field: String,
    },

    /// Checksum still differs after the single repair attempt
    #[error("Checksum mismatch for '{file}' of product {id} persists after re-download")]
    ChecksumMismatch {
        id: String,
        file: String,
    },

    /// No release asset matched the requested pattern
    #[error("No asset of {repo} release '{release}' matches '{pattern}'")]
    AssetNotFound {
        repo: String,
        release: String,
        pattern: String,
    },

    /// Neither pinned executable, game info nor default launcher was found
    #[error("No runnable target found for product {id} ({target})")]
    NoRunnableTarget {
        id: String,
        target: OperatingSystem,
    },

    /// No download link passes the operating system, language and type filter
    #[error("Product {id}: no links are matching operating params")]
    NoMatchingLinks { id: String },

    /// Pack or DLC requested where a game is required
    #[error("Cannot {action} {product_type} product {id}, use {related_label} instead: {related}")]
    ProductTypeConflict {
        id: String,
        product_type: ProductType,
        action: String,
        related_label: String,
        related: String,
    },

    /// Product has no installed record for the given os-lang
    #[error("Product {id} is not installed for {os_lang}")]
    NotInstalled {
        id: String,
        os_lang: String,
    },

    /// Insufficient disk space
    #[error("Insufficient disk space: need {required} bytes, available {available} bytes (short by {shortage} bytes)")]
    InsufficientSpace {
        required: u64,
        available: u64,
        shortage: u64,
        path: PathBuf,
    },

    /// HTTP-related errors with context
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: u16,
    },

    /// URL parsing errors with helpful suggestions
    #[error("Invalid URL '{url}': {suggestion}")]
    InvalidUrl {
        url: String,
        suggestion: String,
        #[source]
        source: url::ParseError,
    },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' ({operation})")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// External tool could not be started
    #[error("Failed to start '{program}'")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("'{program}' exited with {status}")]
    ProcessFailed {
        program: String,
        status: String,
    },

    /// JSON (de)serialization errors
    #[error("Failed to (de)serialize {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// TOML serialization errors
    #[error("Failed to write TOML for {context}")]
    Toml {
        context: String,
        #[source]
        source: toml::ser::Error,
    },

    /// Malformed Steam VDF data
    #[error("Malformed VDF in '{path}': {message}")]
    Vdf {
        path: PathBuf,
        message: String,
    },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    Metadata,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, HangarError>;

impl HangarError {
    /// Build a file system error for `path`
    pub fn fs(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        HangarError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn configuration(message: impl Into<String>, suggestion: Option<&str>) -> Self {
        HangarError::Configuration {
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    /// Check if error is recoverable (should retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            HangarError::HttpRequest { source, .. } => {
                // Client errors (4xx) won't go away on retry
                source.status().map_or(true, |status| status.is_server_error() || status == 429)
            }
            HangarError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            HangarError::FileSystem { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            HangarError::ProcessFailed { .. } => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            HangarError::UnsupportedPlatform { .. } => "unsupported_platform",
            HangarError::MissingMetadata { .. } => "missing_metadata",
            HangarError::ChecksumMismatch { .. } => "checksum_mismatch",
            HangarError::AssetNotFound { .. } => "asset_not_found",
            HangarError::NoRunnableTarget { .. } => "no_runnable_target",
            HangarError::NoMatchingLinks { .. } => "no_matching_links",
            HangarError::ProductTypeConflict { .. } => "product_type_conflict",
            HangarError::NotInstalled { .. } => "not_installed",
            HangarError::InsufficientSpace { .. } => "insufficient_space",
            HangarError::HttpRequest { .. } => "http_request",
            HangarError::HttpStatus { .. } => "http_status",
            HangarError::InvalidUrl { .. } => "invalid_url",
            HangarError::FileSystem { .. } => "file_system",
            HangarError::ProcessSpawn { .. } => "process_spawn",
            HangarError::ProcessFailed { .. } => "process_failed",
            HangarError::Serialization { .. } => "serialization",
            HangarError::Toml { .. } => "toml",
            HangarError::Vdf { .. } => "vdf",
            HangarError::Configuration { .. } => "configuration",
        }
    }

    /// Get severity level for error prioritization
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HangarError::NotInstalled { .. } => ErrorSeverity::Low,
            HangarError::HttpRequest { .. }
            | HangarError::HttpStatus { .. }
            | HangarError::AssetNotFound { .. }
            | HangarError::ProcessFailed { .. } => ErrorSeverity::Medium,
            HangarError::InsufficientSpace { .. } | HangarError::ChecksumMismatch { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Get user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            HangarError::InvalidUrl { suggestion, .. } => Some(suggestion),
            HangarError::Configuration { suggestion, .. } => suggestion.as_deref(),
            HangarError::InsufficientSpace { .. } => Some("Free up disk space and try again"),
            HangarError::ChecksumMismatch { .. } => {
                Some("The server copy may be corrupt, refresh metadata or contact the server owner")
            }
            HangarError::NoRunnableTarget { .. } => {
                Some("Pin an executable with prefix settings or reinstall the product")
            }
            HangarError::NotInstalled { .. } => Some("Install the product first"),
            HangarError::NoMatchingLinks { .. } => Some("Check the operating system, language and download types"),
            HangarError::HttpStatus { status: 401, .. } => Some("Check the server username and password"),
            _ => None,
        }
    }

    /// Create a detailed error report for debugging
    pub fn detailed_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);
        report.push_str(&format!("Category: {}\n", self.category()));
        report.push_str(&format!("Severity: {:?}\n", self.severity()));
        report.push_str(&format!("Recoverable: {}\n", self.is_recoverable()));

        if let Some(suggestion) = self.suggestion() {
            report.push_str(&format!("Suggestion: {}\n", suggestion));
        }

        if let Some(source) = self.source() {
            report.push_str(&format!("Root cause: {}\n", source));
        }

        report
    }
}

/// Error severity levels for prioritization
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<reqwest::Error> for HangarError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());
        HangarError::HttpRequest { url, source: error }
    }
}

impl From<std::io::Error> for HangarError {
    fn from(error: std::io::Error) -> Self {
        HangarError::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: FileOperation::Read,
            source: error,
        }
    }
}

impl From<url::ParseError> for HangarError {
    fn from(error: url::ParseError) -> Self {
        let suggestion = match error {
            url::ParseError::EmptyHost => "URL must have a valid hostname",
            url::ParseError::InvalidPort => "Port number must be between 1 and 65535",
            url::ParseError::RelativeUrlWithoutBase => "URL must be absolute (include http:// or https://)",
            _ => "Check URL format and try again",
        }
        .to_string();

        HangarError::InvalidUrl {
            url: "<unparseable>".to_string(),
            suggestion,
            source: error,
        }
    }
}

impl From<serde_json::Error> for HangarError {
    fn from(error: serde_json::Error) -> Self {
        HangarError::Serialization {
            context: "JSON document".to_string(),
            source: error,
        }
    }
}
