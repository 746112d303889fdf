//! Shared fixtures for unit tests: fakes of the collaborator traits and builders

use async_trait::async_trait;
use md5::{Digest, Md5};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

use crate::catalog::MetadataSource;
use crate::config::{HangarConfig, ServerConnection};
use crate::context::{Context, ContextBuilder};
use crate::error::{HangarError, Result};
use crate::install::{InstallOutcome, InstallRequest, InstallerRegistry, Location, PlatformInstaller};
use crate::model::{DownloadLink, DownloadType, OperatingSystem, Product, ProductImages, ProductType};
use crate::platform::ExecutionStrategy;
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::transport::{DownloadOutcome, Transport};

/// Server address stored by [`context`]
pub const FILES_HOST: &str = "files.test";

/// Collects progress events
#[derive(Debug, Default, Clone)]
pub struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Warning { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::ItemFailed { id, error, .. } => Some((id, error)),
                _ => None,
            })
            .collect()
    }
}

/// Connection pointing at a wiremock server
pub fn server_for(server: &MockServer) -> ServerConnection {
    let address = server.address();
    ServerConnection {
        protocol: "http".to_string(),
        address: address.ip().to_string(),
        port: Some(address.port()),
        username: None,
        password: None,
    }
}

pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

pub fn product(id: &str, title: &str, product_type: ProductType) -> Product {
    Product {
        id: id.to_string(),
        title: title.to_string(),
        slug: title.to_lowercase().replace(' ', "_"),
        product_type,
        included_games: Vec::new(),
        required_games: Vec::new(),
        steam_app_id: None,
        images: ProductImages::default(),
        download_links: Vec::new(),
    }
}

pub fn game(id: &str, title: &str) -> Product {
    product(id, title, ProductType::Game)
}

pub fn pack(id: &str, title: &str, included: &[&str]) -> Product {
    let mut pack = product(id, title, ProductType::Pack);
    pack.included_games = included.iter().map(|id| id.to_string()).collect();
    pack
}

pub fn dlc(id: &str, title: &str, required: &[&str]) -> Product {
    let mut dlc = product(id, title, ProductType::Dlc);
    dlc.required_games = required.iter().map(|id| id.to_string()).collect();
    dlc
}

/// Installer link whose checksum matches `content`
pub fn link(os: OperatingSystem, filename: &str, content: &[u8]) -> DownloadLink {
    DownloadLink {
        os,
        language_code: "en".to_string(),
        download_type: DownloadType::Installer,
        local_filename: filename.to_string(),
        version: "1.0".to_string(),
        md5: Some(md5_hex(content)),
        estimated_bytes: content.len() as u64,
        manual_url: format!("/downloads/{}", filename),
    }
}

/// In-memory catalog counting fetches
#[derive(Clone, Default)]
pub struct FakeMetadataSource {
    products: Arc<Mutex<HashMap<String, Product>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeMetadataSource {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        let source = Self::default();
        for product in products {
            source.insert(product);
        }
        source
    }

    pub fn insert(&self, product: Product) {
        self.products.lock().unwrap().insert(product.id.clone(), product);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FakeMetadataSource {
    async fn fetch(&self, id: &str) -> Result<Product> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.products
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| HangarError::MissingMetadata {
                id: id.to_string(),
                field: "catalog record".to_string(),
            })
    }
}

/// Serves configured bytes keyed by the `manual-url` query value or the full url
///
/// Several payloads for one key are served in order, the last one repeating.
#[derive(Clone, Default)]
pub struct FakeTransport {
    files: Arc<Mutex<HashMap<String, VecDeque<Vec<u8>>>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, key: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(bytes.to_vec());
        self
    }

    /// Keys requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn key(url: &str) -> String {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .query_pairs()
                    .find(|(name, _)| name == "manual-url")
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_else(|| url.to_string())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        filename: &str,
        force: bool,
        _progress_callback: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome> {
        let key = Self::key(url);
        self.requests.lock().unwrap().push(key.clone());

        let path = dest_dir.join(filename);
        if path.exists() && !force {
            let size = std::fs::metadata(&path)?.len();
            return Ok(DownloadOutcome::AlreadyExists { path, size });
        }

        let bytes = {
            let mut files = self.files.lock().unwrap();
            let queue = files.get_mut(&key).ok_or_else(|| HangarError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })?;
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            }
        };

        std::fs::create_dir_all(dest_dir)?;
        std::fs::write(&path, &bytes)?;
        Ok(DownloadOutcome::Downloaded {
            path,
            size: bytes.len() as u64,
        })
    }
}

/// Installer that copies nothing and records which products it saw
#[derive(Clone)]
pub struct RecordingInstaller {
    target: OperatingSystem,
    installed: Arc<Mutex<Vec<String>>>,
}

impl RecordingInstaller {
    pub fn new(target: OperatingSystem) -> Self {
        Self {
            target,
            installed: Arc::default(),
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformInstaller for RecordingInstaller {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn handles(&self, target: OperatingSystem, strategy: ExecutionStrategy) -> bool {
        target == self.target && !matches!(strategy, ExecutionStrategy::Reject(_))
    }

    async fn install(&self, ctx: &Context, request: &InstallRequest<'_>) -> Result<InstallOutcome> {
        let slug = request.product.require_slug()?;
        let install_dir = ctx.paths.os_lang_apps(request.target, request.lang_code).join(slug);
        std::fs::create_dir_all(&install_dir)?;
        std::fs::write(install_dir.join("start.sh"), b"#!/bin/sh\n")?;
        self.installed.lock().unwrap().push(request.product.id.clone());
        Ok(InstallOutcome {
            install_dir,
            bundle_name: Some(slug.to_string()),
        })
    }

    fn default_launcher(&self, location: &Location, _title: &str) -> Option<PathBuf> {
        Some(location.install_dir.join("start.sh")).filter(|path| path.exists())
    }
}

/// Builder rooted in `root` for `host` with the given collaborators and a stored server
pub fn context_builder(
    root: &Path,
    host: OperatingSystem,
    source: FakeMetadataSource,
    transport: FakeTransport,
    installers: InstallerRegistry,
) -> ContextBuilder {
    let mut config = HangarConfig::with_root(root);
    config.host_os = host;
    config.steam_dir = Some(root.join("steam"));

    let properties = crate::store::PropertyStore::open(config.paths().properties).unwrap();
    ServerConnection {
        protocol: "http".to_string(),
        address: FILES_HOST.to_string(),
        port: None,
        username: None,
        password: None,
    }
    .save(&properties)
    .unwrap();

    Context::builder(config)
        .metadata_source(Box::new(source))
        .transport(Arc::new(transport))
        .installers(installers)
}

/// Context rooted in `root` for `host`, with the given collaborators
pub fn context(
    root: &Path,
    host: OperatingSystem,
    source: FakeMetadataSource,
    transport: FakeTransport,
    installers: InstallerRegistry,
) -> Context {
    context_builder(root, host, source, transport, installers)
        .build()
        .unwrap()
}
