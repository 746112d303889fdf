//! Explicit handle carrying configuration, stores and collaborators
//!
//! Built once at process start and passed to every operation.

use std::sync::Arc;

use crate::catalog::{CachedMetadataSource, HttpMetadataSource, MetadataSource};
use crate::config::{HangarConfig, Paths, ServerConnection};
use crate::error::Result;
use crate::install::InstallerRegistry;
use crate::model::OperatingSystem;
use crate::progress::{IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent};
use crate::state::InstallStateTracker;
use crate::store::{KeyValues, PropertyStore, property};
use crate::transport::{HttpTransport, Transport, build_client};

pub struct Context {
    pub config: HangarConfig,
    pub paths: Paths,
    pub properties: Arc<PropertyStore>,
    pub catalog: CachedMetadataSource,
    pub transport: Arc<dyn Transport>,
    pub installers: InstallerRegistry,
    pub records: InstallStateTracker,
    pub releases: KeyValues,
    pub client: reqwest::Client,
    progress: ProgressCallback,
}

impl Context {
    /// Context with HTTP collaborators and the default installers
    pub fn open(config: HangarConfig) -> Result<Self> {
        ContextBuilder::new(config).build()
    }

    pub fn builder(config: HangarConfig) -> ContextBuilder {
        ContextBuilder::new(config)
    }

    pub fn host_os(&self) -> OperatingSystem {
        self.config.host_os
    }

    pub fn server(&self) -> Result<ServerConnection> {
        ServerConnection::load(&self.properties)
    }

    pub fn progress(&self) -> &ProgressCallback {
        &self.progress
    }

    pub fn report(&self, event: ProgressEvent) {
        (self.progress)(event);
    }

    /// Pinned slug of a product, falling back to the cached catalog record
    pub fn slug(&self, id: &str) -> Result<String> {
        if let Some(slug) = self.properties.get_last_value(property::SLUG, id)?.filter(|s| !s.is_empty()) {
            return Ok(slug);
        }
        match self.catalog.cached(id)? {
            Some(product) => product.require_slug().map(str::to_string),
            None => Err(crate::error::HangarError::MissingMetadata {
                id: id.to_string(),
                field: "slug".to_string(),
            }),
        }
    }
}

pub struct ContextBuilder {
    config: HangarConfig,
    metadata: Option<Box<dyn MetadataSource>>,
    transport: Option<Arc<dyn Transport>>,
    installers: Option<InstallerRegistry>,
    progress: Option<ProgressCallback>,
}

impl ContextBuilder {
    pub fn new(config: HangarConfig) -> Self {
        Self {
            config,
            metadata: None,
            transport: None,
            installers: None,
            progress: None,
        }
    }

    pub fn metadata_source(mut self, source: Box<dyn MetadataSource>) -> Self {
        self.metadata = Some(source);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn installers(mut self, installers: InstallerRegistry) -> Self {
        self.installers = Some(installers);
        self
    }

    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn build(self) -> Result<Context> {
        let paths = self.config.paths();
        paths.ensure()?;

        let properties = Arc::new(PropertyStore::open(&paths.properties)?);
        let server = ServerConnection::load(&properties)?;
        let client = build_client(&self.config)?;

        let metadata = match self.metadata {
            Some(metadata) => metadata,
            None => Box::new(HttpMetadataSource::new(client.clone(), server.clone())),
        };
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(client.clone()).with_server(server)),
        };

        Ok(Context {
            catalog: CachedMetadataSource::new(metadata, KeyValues::open(&paths.products)?, properties.clone()),
            records: InstallStateTracker::open(&paths.installed_records)?,
            releases: KeyValues::open(&paths.releases)?,
            installers: self.installers.unwrap_or_else(InstallerRegistry::with_defaults),
            progress: self
                .progress
                .unwrap_or_else(|| NullProgressReporter.into_callback()),
            transport,
            properties,
            client,
            paths,
            config: self.config,
        })
    }
}
