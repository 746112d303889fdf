//! Metadata sources: the remote catalog server and the local product cache in front of it

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info};

use crate::config::ServerConnection;
use crate::error::{HangarError, Result};
use crate::model::Product;
use crate::store::{KeyValues, PropertyStore, property};

/// Anything that can produce a [`Product`] for a catalog id
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch one product. Must not leave side effects behind on failure.
    async fn fetch(&self, id: &str) -> Result<Product>;
}

/// Catalog server client, `GET {server}/api/metadata?id=<id>`
pub struct HttpMetadataSource {
    client: reqwest::Client,
    server: ServerConnection,
    max_retries: usize,
}

impl HttpMetadataSource {
    pub fn new(client: reqwest::Client, server: ServerConnection) -> Self {
        Self {
            client,
            server,
            max_retries: 2,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn fetch_once(&self, id: &str) -> Result<Product> {
        let url = self.server.url("/api/metadata", &[("id", id)])?;
        debug!("Fetching metadata for {} from {}", id, url);

        let response = self
            .server
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| HangarError::HttpRequest {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(HangarError::MissingMetadata {
                id: id.to_string(),
                field: "catalog record".to_string(),
            });
        }
        if !status.is_success() {
            return Err(HangarError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| HangarError::HttpRequest {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| HangarError::Serialization {
            context: format!("metadata of product {}", id),
            source,
        })
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch(&self, id: &str) -> Result<Product> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(strategy, || self.fetch_once(id), |e: &HangarError| e.is_recoverable()).await
    }
}

/// Local product cache in front of another source
///
/// Every successful remote fetch refreshes the cache and pins the title,
/// slug and Steam app id properties later read by shortcuts and launches.
pub struct CachedMetadataSource {
    inner: Box<dyn MetadataSource>,
    cache: KeyValues,
    properties: Arc<PropertyStore>,
}

impl CachedMetadataSource {
    pub fn new(inner: Box<dyn MetadataSource>, cache: KeyValues, properties: Arc<PropertyStore>) -> Self {
        Self {
            inner,
            cache,
            properties,
        }
    }

    /// Cached product unless `force`, remote otherwise
    pub async fn product(&self, id: &str, force: bool) -> Result<Product> {
        if !force {
            if let Some(product) = self.cache.get_json::<Product>(id)? {
                return Ok(product);
            }
        }

        let product = self.inner.fetch(id).await?;
        self.cache.set_json(id, &product)?;
        self.pin(&product)?;
        info!("Fetched metadata for {} ({})", product.title, id);
        Ok(product)
    }

    pub async fn products(&self, ids: &[String], force: bool) -> Result<Vec<Product>> {
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            products.push(self.product(id, force).await?);
        }
        Ok(products)
    }

    /// Cached product without touching the network
    pub fn cached(&self, id: &str) -> Result<Option<Product>> {
        self.cache.get_json(id)
    }

    fn pin(&self, product: &Product) -> Result<()> {
        if !product.title.is_empty() {
            self.properties
                .replace_values(property::TITLE, &product.id, vec![product.title.clone()])?;
        }
        if !product.slug.is_empty() {
            self.properties
                .replace_values(property::SLUG, &product.id, vec![product.slug.clone()])?;
        }
        if let Some(steam_app_id) = product.steam_app_id.as_ref().filter(|s| !s.is_empty()) {
            self.properties
                .replace_values(property::STEAM_APP_ID, &product.id, vec![steam_app_id.clone()])?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataSource for CachedMetadataSource {
    async fn fetch(&self, id: &str) -> Result<Product> {
        self.product(id, false).await
    }
}
