//! HTTP transport with resume support

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{Instrument, debug, info_span};

use crate::config::{HangarConfig, ServerConnection};
use crate::error::{FileOperation, HangarError, Result};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::transport::{DownloadOutcome, Transport};

/// Streaming HTTP downloader writing through `<file>.part`
pub struct HttpTransport {
    client: Client,
    server: Option<ServerConnection>,
    allow_resume: bool,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            server: None,
            allow_resume: true,
        }
    }

    /// Authenticate requests going to the catalog server
    pub fn with_server(mut self, server: ServerConnection) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_resume(mut self, allow_resume: bool) -> Self {
        self.allow_resume = allow_resume;
        self
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.server {
            Some(server) if is_same_host(server, url) => server.authorize(request),
            _ => request,
        }
    }

    async fn download_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<u64> {
        let temp_path = part_path(dest_path);
        let start_byte = if self.allow_resume && temp_path.exists() {
            let size = fs::metadata(&temp_path)
                .await
                .map_err(|e| HangarError::fs(&temp_path, FileOperation::Metadata, e))?
                .len();
            debug!("Found partial file, resuming from byte {}", size);
            size
        } else {
            0
        };

        let mut request = self.request(url);
        if start_byte > 0 {
            request = request.header("Range", format!("bytes={}-", start_byte));
        }

        let response = request.send().await.map_err(|source| HangarError::HttpRequest {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(HangarError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // A server ignoring Range sends the whole body again
        let resumed = start_byte > 0 && status == reqwest::StatusCode::PARTIAL_CONTENT;
        let start_byte = if resumed { start_byte } else { 0 };
        let total_size = response.content_length().map(|len| len + start_byte);

        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_size,
            });
        }

        let mut file = if resumed {
            fs::OpenOptions::new().create(true).append(true).open(&temp_path).await
        } else {
            fs::File::create(&temp_path).await
        }
        .map_err(|e| HangarError::fs(&temp_path, FileOperation::Create, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = start_byte;
        let start_time = std::time::Instant::now();
        let mut last_progress_time = start_time;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|source| HangarError::HttpRequest {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| HangarError::fs(&temp_path, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;

            // Report progress at most every 100ms
            let now = std::time::Instant::now();
            if now.duration_since(last_progress_time).as_millis() >= 100 {
                if let Some(ref callback) = progress_callback {
                    let elapsed = start_time.elapsed().as_secs_f64();
                    let speed = if elapsed > 0.0 {
                        (downloaded - start_byte) as f64 / elapsed
                    } else {
                        0.0
                    };
                    callback(ProgressEvent::DownloadProgress {
                        url: url.to_string(),
                        downloaded,
                        total: total_size,
                        speed_bps: speed,
                    });
                }
                last_progress_time = now;
            }
        }

        file.flush()
            .await
            .map_err(|e| HangarError::fs(&temp_path, FileOperation::Write, e))?;
        drop(file);

        fs::rename(&temp_path, dest_path)
            .await
            .map_err(|e| HangarError::fs(dest_path, FileOperation::Move, e))?;

        if let Some(ref callback) = progress_callback {
            callback(ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
            });
        }

        debug!("Download completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        force: bool,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome> {
        let dest_path = dest_dir.join(filename);

        async move {
            if dest_path.exists() && !force {
                let size = fs::metadata(&dest_path)
                    .await
                    .map_err(|e| HangarError::fs(&dest_path, FileOperation::Metadata, e))?
                    .len();
                debug!("{} already exists, skipping", dest_path.display());
                return Ok(DownloadOutcome::AlreadyExists { path: dest_path.clone(), size });
            }

            fs::create_dir_all(dest_dir)
                .await
                .map_err(|e| HangarError::fs(dest_dir, FileOperation::CreateDir, e))?;
            if force {
                // A forced fetch must not resume from stale bytes
                remove_partial(&part_path(&dest_path)).await?;
            }

            let size = self.download_file(url, &dest_path, progress_callback).await?;
            Ok(DownloadOutcome::Downloaded { path: dest_path.clone(), size })
        }
        .instrument(info_span!("http_download", url = %url))
        .await
    }
}

/// Client configured from [`HangarConfig`]
pub fn build_client(config: &HangarConfig) -> Result<Client> {
    // No overall timeout, installers are several gigabytes
    Client::builder()
        .connect_timeout(config.timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|source| HangarError::HttpRequest {
            url: "<client>".to_string(),
            source,
        })
}

async fn remove_partial(part: &Path) -> Result<()> {
    match fs::remove_file(part).await {
        Ok(()) => {
            debug!("Discarded partial download {}", part.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HangarError::fs(part, FileOperation::Delete, e)),
    }
}

fn part_path(dest_path: &Path) -> std::path::PathBuf {
    let mut name = dest_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest_path.with_file_name(name)
}

fn is_same_host(server: &ServerConnection, url: &str) -> bool {
    match (server.base_url(), url::Url::parse(url)) {
        (Ok(base), Ok(url)) => base.host_str() == url.host_str() && base.port_or_known_default() == url.port_or_known_default(),
        _ => false,
    }
}
