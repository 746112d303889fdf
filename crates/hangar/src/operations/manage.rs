//! Bookkeeping operations: installed listing, pinned prefix settings, server setup

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::context::Context;
use crate::error::{HangarError, Result};
use crate::exec::resolver::prefix_settings_key;
use crate::model::OperatingSystem;
use crate::progress::format_bytes;
use crate::store::property::{self, server};

/// One line of the installed listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSummary {
    /// `title (id)`
    pub name: String,
    pub version: String,
    pub size: String,
}

/// Installed products of an os-lang partition, ordered by id
pub fn list_installed(ctx: &Context, os: Option<OperatingSystem>, lang_code: &str) -> Result<Vec<InstalledSummary>> {
    let os = os.unwrap_or_else(|| ctx.host_os());
    let summaries: Vec<InstalledSummary> = ctx
        .records
        .installed(os, lang_code)?
        .into_iter()
        .map(|record| InstalledSummary {
            name: format!("{} ({})", record.title, record.id),
            version: record.version,
            size: format_bytes(record.estimated_bytes),
        })
        .collect();

    if summaries.is_empty() {
        info!("No products installed for {} ({})", os, lang_code);
    }
    Ok(summaries)
}

/// Launch settings pinned for a compatibility prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixSettings {
    /// Executable relative to the prefix root
    pub exe: Option<String>,
    /// `KEY=VALUE` pairs
    pub env: Vec<String>,
    pub args: Vec<String>,
    /// Drop the pinned settings before applying new ones
    pub reset: bool,
}

/// Pin `settings` under the `<slug>/<lang>` prefix name; returns that name
pub async fn pin_prefix_settings(ctx: &Context, id: &str, lang_code: &str, settings: &PrefixSettings) -> Result<String> {
    let slug = match ctx.slug(id) {
        Ok(slug) => slug,
        Err(_) => ctx.catalog.product(id, false).await?.require_slug()?.to_string(),
    };
    let key = prefix_settings_key(&slug, lang_code);

    if settings.reset {
        for property in [property::PREFIX_EXE, property::PREFIX_ENV, property::PREFIX_ARG] {
            ctx.properties.cut_keys(property, &[key.as_str()])?;
        }
        info!("Reset prefix settings of {}", key);
    }
    if let Some(exe) = settings.exe.as_ref().filter(|exe| !exe.is_empty()) {
        ctx.properties.replace_values(property::PREFIX_EXE, &key, vec![exe.clone()])?;
    }
    if !settings.env.is_empty() {
        ctx.properties.replace_values(property::PREFIX_ENV, &key, settings.env.clone())?;
    }
    if !settings.args.is_empty() {
        ctx.properties.replace_values(property::PREFIX_ARG, &key, settings.args.clone())?;
    }

    debug!("Pinned prefix settings of {}", key);
    Ok(key)
}

/// Server connection fields to store; unset fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSetup {
    pub protocol: Option<String>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Forget stored settings first
    pub reset: bool,
    /// Check connectivity and credentials afterwards
    pub test: bool,
}

pub async fn setup_server(ctx: &Context, setup: &ServerSetup) -> Result<()> {
    if setup.reset {
        crate::config::ServerConnection::reset(&ctx.properties)?;
        info!("Reset server connection");
    }

    let mut values = BTreeMap::new();
    let fields = [
        (server::PROTOCOL, setup.protocol.clone()),
        (server::ADDRESS, setup.address.clone()),
        (server::PORT, setup.port.map(|port| port.to_string())),
        (server::USERNAME, setup.username.clone()),
        (server::PASSWORD, setup.password.clone()),
    ];
    for (key, value) in fields {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            values.insert(key.to_string(), vec![value]);
        }
    }
    if !values.is_empty() {
        ctx.properties.batch_replace_values(property::SERVER_CONNECTION, values)?;
    }

    if setup.test {
        test_server_connection(ctx).await?;
    }
    Ok(())
}

/// `/api/health` must answer `ok`, and `/api/health-auth` with the stored credentials
pub async fn test_server_connection(ctx: &Context) -> Result<()> {
    let server = ctx.server()?;

    let health = server.url("/api/health", &[])?;
    expect_ok(ctx.client.get(health.clone()), health.as_str()).await?;

    let health_auth = server.url("/api/health-auth", &[])?;
    expect_ok(server.authorize(ctx.client.get(health_auth.clone())), health_auth.as_str()).await?;

    info!("Server connection at {} is valid", server.base_url()?);
    Ok(())
}

async fn expect_ok(request: reqwest::RequestBuilder, url: &str) -> Result<()> {
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

    let body = response.text().await.map_err(|source| HangarError::HttpRequest {
        url: url.to_string(),
        source,
    })?;
    if body.trim() != "ok" {
        return Err(HangarError::configuration(
            format!("unexpected response from {}: '{}'", url, body.trim()),
            Some("Check that the server address points at a hangar server"),
        ));
    }
    Ok(())
}
