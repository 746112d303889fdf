//! Progress tracking and reporting for hangar operations
//!
//! Reporters only observe. Nothing an operation decides depends on them.

use std::sync::Arc;

use crate::validation::ValidationResult;

/// Progress callback threaded through every operation
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during operations
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    OperationStarted {
        operation: &'static str,
        items: usize,
    },
    OperationCompleted {
        operation: &'static str,
        succeeded: usize,
        failed: usize,
    },
    ItemStarted {
        id: String,
        step: &'static str,
    },
    ItemCompleted {
        id: String,
        step: &'static str,
        message: String,
    },
    ItemFailed {
        id: String,
        step: &'static str,
        error: String,
    },
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
        speed_bps: f64,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    ValidationStarted {
        file: String,
        total_size: u64,
    },
    ValidationProgress {
        file: String,
        progress: f64,
    },
    ValidationComplete {
        file: String,
        result: ValidationResult,
    },
    Warning {
        message: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_operation_started(&self, _operation: &str, _items: usize) {}
    fn on_operation_completed(&self, _operation: &str, _succeeded: usize, _failed: usize) {}
    fn on_item_started(&self, _id: &str, _step: &str) {}
    fn on_item_completed(&self, _id: &str, _step: &str, _message: &str) {}
    fn on_item_failed(&self, _id: &str, _step: &str, _error: &str) {}
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>, _speed_bps: f64) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_validation_started(&self, _file: &str, _total_size: u64) {}
    fn on_validation_progress(&self, _file: &str, _progress: f64) {}
    fn on_validation_complete(&self, _file: &str, _result: ValidationResult) {}
    fn on_warning(&self, _message: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::OperationStarted { operation, items } => {
                self.on_operation_started(operation, items);
            }
            ProgressEvent::OperationCompleted { operation, succeeded, failed } => {
                self.on_operation_completed(operation, succeeded, failed);
            }
            ProgressEvent::ItemStarted { id, step } => self.on_item_started(&id, step),
            ProgressEvent::ItemCompleted { id, step, message } => {
                self.on_item_completed(&id, step, &message);
            }
            ProgressEvent::ItemFailed { id, step, error } => self.on_item_failed(&id, step, &error),
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total, speed_bps } => {
                self.on_download_progress(&url, downloaded, total, speed_bps);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::ValidationStarted { file, total_size } => {
                self.on_validation_started(&file, total_size);
            }
            ProgressEvent::ValidationProgress { file, progress } => {
                self.on_validation_progress(&file, progress);
            }
            ProgressEvent::ValidationComplete { file, result } => {
                self.on_validation_complete(&file, result);
            }
            ProgressEvent::Warning { message } => self.on_warning(&message),
        })
    }
}

/// Reporter that writes events to the `tracing` subscriber
#[derive(Debug, Default)]
pub struct TracingProgressReporter {
    pub verbose: bool,
}

impl TracingProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for TracingProgressReporter {
    fn on_operation_started(&self, operation: &str, items: usize) {
        tracing::info!("{}: {} item(s)", operation, items);
    }

    fn on_operation_completed(&self, operation: &str, succeeded: usize, failed: usize) {
        if failed > 0 {
            tracing::warn!("{} finished: {} succeeded, {} failed", operation, succeeded, failed);
        } else {
            tracing::info!("{} finished: {} succeeded", operation, succeeded);
        }
    }

    fn on_item_started(&self, id: &str, step: &str) {
        tracing::info!("{} {}", step, id);
    }

    fn on_item_completed(&self, id: &str, step: &str, message: &str) {
        tracing::info!("{} {}: {}", step, id, message);
    }

    fn on_item_failed(&self, id: &str, step: &str, error: &str) {
        tracing::error!("{} {} failed: {}", step, id, error);
    }

    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        match total_size {
            Some(size) => tracing::debug!("Starting download: {} ({} bytes)", url, size),
            None => tracing::debug!("Starting download: {}", url),
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        if !self.verbose {
            return;
        }
        let speed_mb = speed_bps / 1_000_000.0;
        match total {
            Some(total) if total > 0 => {
                let percent = (downloaded as f64 / total as f64) * 100.0;
                tracing::debug!("{}: {:.1}% ({}/{} bytes, {:.1} MB/s)", url, percent, downloaded, total, speed_mb);
            }
            _ => tracing::debug!("{}: {} bytes downloaded ({:.1} MB/s)", url, downloaded, speed_mb),
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        tracing::info!("Download complete: {} ({})", url, format_bytes(final_size));
    }

    fn on_validation_progress(&self, file: &str, progress: f64) {
        if self.verbose {
            tracing::debug!("Validating {}: {:.0}%", file, progress * 100.0);
        }
    }

    fn on_validation_complete(&self, file: &str, result: ValidationResult) {
        tracing::debug!("{}: {}", file, result.as_str());
    }

    fn on_warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Composite progress reporter that forwards events to multiple reporters
pub struct CompositeProgressReporter {
    reporters: Vec<Box<dyn ProgressReporter>>,
}

impl std::fmt::Debug for CompositeProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeProgressReporter")
            .field("reporters_count", &self.reporters.len())
            .finish()
    }
}

impl CompositeProgressReporter {
    pub fn new() -> Self {
        Self { reporters: Vec::new() }
    }

    pub fn add_reporter<R: ProgressReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl Default for CompositeProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CompositeProgressReporter {
    fn on_operation_started(&self, operation: &str, items: usize) {
        self.reporters.iter().for_each(|r| r.on_operation_started(operation, items));
    }

    fn on_operation_completed(&self, operation: &str, succeeded: usize, failed: usize) {
        self.reporters.iter().for_each(|r| r.on_operation_completed(operation, succeeded, failed));
    }

    fn on_item_started(&self, id: &str, step: &str) {
        self.reporters.iter().for_each(|r| r.on_item_started(id, step));
    }

    fn on_item_completed(&self, id: &str, step: &str, message: &str) {
        self.reporters.iter().for_each(|r| r.on_item_completed(id, step, message));
    }

    fn on_item_failed(&self, id: &str, step: &str, error: &str) {
        self.reporters.iter().for_each(|r| r.on_item_failed(id, step, error));
    }

    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        self.reporters.iter().for_each(|r| r.on_download_started(url, total_size));
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        for reporter in &self.reporters {
            reporter.on_download_progress(url, downloaded, total, speed_bps);
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        self.reporters.iter().for_each(|r| r.on_download_complete(url, final_size));
    }

    fn on_validation_started(&self, file: &str, total_size: u64) {
        self.reporters.iter().for_each(|r| r.on_validation_started(file, total_size));
    }

    fn on_validation_progress(&self, file: &str, progress: f64) {
        self.reporters.iter().for_each(|r| r.on_validation_progress(file, progress));
    }

    fn on_validation_complete(&self, file: &str, result: ValidationResult) {
        self.reporters.iter().for_each(|r| r.on_validation_complete(file, result));
    }

    fn on_warning(&self, message: &str) {
        self.reporters.iter().for_each(|r| r.on_warning(message));
    }
}

/// Format a byte count with SI units ("1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ['k', 'M', 'G', 'T', 'P', 'E'][exp])
}
