//! Configuration types: root directories, host platform, external endpoints

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FileOperation, HangarError, Result};
use crate::model::{OperatingSystem, os_lang_code};
use crate::store::property::{self, server};
use crate::store::PropertyStore;

pub const ROOT_DIR_ENV: &str = "HANGAR_ROOT_DIR";
pub const STEAM_DIR_ENV: &str = "HANGAR_STEAM_DIR";
pub const GITHUB_API_ENV: &str = "HANGAR_GITHUB_API";

/// Process-wide configuration, built once and passed explicitly
#[derive(Debug, Clone)]
pub struct HangarConfig {
    pub root_dir: PathBuf,
    pub host_os: OperatingSystem,
    pub steam_dir: Option<PathBuf>,
    pub github_api_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Print external tool output instead of discarding it
    pub verbose: bool,
}

impl HangarConfig {
    /// Default configuration with `.env` and environment overrides applied
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Ok(root) = std::env::var(ROOT_DIR_ENV) {
            config.root_dir = PathBuf::from(root);
        }
        if let Ok(steam) = std::env::var(STEAM_DIR_ENV) {
            config.steam_dir = Some(PathBuf::from(steam));
        }
        if let Ok(api) = std::env::var(GITHUB_API_ENV) {
            config.github_api_url = api;
        }
        config
    }

    /// Configuration rooted at `root`, everything else default
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Paths {
        Paths::new(&self.root_dir)
    }
}

impl Default for HangarConfig {
    fn default() -> Self {
        Self {
            root_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hangar"),
            host_os: OperatingSystem::current(),
            steam_dir: default_steam_dir(),
            github_api_url: "https://api.github.com".to_string(),
            user_agent: format!("hangar/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            verbose: false,
        }
    }
}

fn default_steam_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let candidates = match OperatingSystem::current() {
        OperatingSystem::MacOS => vec![home.join("Library/Application Support/Steam")],
        OperatingSystem::Linux => vec![home.join(".local/share/Steam"), home.join(".steam/steam")],
        OperatingSystem::Windows => vec![PathBuf::from(r"C:\Program Files (x86)\Steam")],
        OperatingSystem::Unknown => vec![],
    };
    candidates.into_iter().find(|dir| dir.exists())
}

/// Every directory hangar reads or writes, derived from the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub metadata: PathBuf,
    pub properties: PathBuf,
    pub products: PathBuf,
    pub releases: PathBuf,
    pub installed_records: PathBuf,
    pub downloads: PathBuf,
    pub installed_apps: PathBuf,
    pub extracts: PathBuf,
    pub wine_downloads: PathBuf,
    pub wine_binaries: PathBuf,
    pub umu_configs: PathBuf,
    pub logs: PathBuf,
}

impl Paths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let metadata = root.join("metadata");
        let wine = root.join("wine");
        Self {
            properties: metadata.join("_properties"),
            products: metadata.join("_products"),
            releases: metadata.join("_releases"),
            installed_records: metadata.join("_installed"),
            downloads: root.join("downloads"),
            installed_apps: root.join("installed-apps"),
            extracts: root.join("downloads").join("_extracts"),
            wine_downloads: wine.join("_downloads"),
            wine_binaries: wine.join("_binaries"),
            umu_configs: wine.join("_umu-configs"),
            logs: root.join("logs"),
            metadata,
            root,
        }
    }

    /// Create every directory that does not exist yet
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            &self.metadata,
            &self.properties,
            &self.products,
            &self.releases,
            &self.installed_records,
            &self.downloads,
            &self.installed_apps,
            &self.extracts,
            &self.wine_downloads,
            &self.wine_binaries,
            &self.umu_configs,
            &self.logs,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| HangarError::fs(dir, FileOperation::CreateDir, e))?;
        }
        Ok(())
    }

    pub fn product_downloads(&self, id: &str) -> PathBuf {
        self.downloads.join(id)
    }

    /// `installed-apps/<os>-<lang>`
    pub fn os_lang_apps(&self, os: OperatingSystem, lang_code: &str) -> PathBuf {
        self.installed_apps.join(os_lang_code(os, lang_code))
    }

    /// `_extracts/<id>/<os>` scratch space for package expansion
    pub fn product_extracts(&self, id: &str, os: OperatingSystem) -> PathBuf {
        self.extracts.join(id).join(os.as_str())
    }

    /// Compatibility prefix of a Windows product, `installed-apps/windows-<lang>/<slug>`
    pub fn prefix_dir(&self, slug: &str, lang_code: &str) -> PathBuf {
        self.os_lang_apps(OperatingSystem::Windows, lang_code).join(slug)
    }
}

/// Connection to the metadata/file server, stored as properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConnection {
    pub protocol: String,
    pub address: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ServerConnection {
    /// Connection stored by `setup-server`, defaults when nothing is stored
    pub fn load(properties: &PropertyStore) -> Result<Self> {
        let get = |key: &str| properties.get_last_value(property::SERVER_CONNECTION, key);
        let mut connection = Self::default();
        if let Some(protocol) = get(server::PROTOCOL)?.filter(|p| !p.is_empty()) {
            connection.protocol = protocol;
        }
        connection.address = get(server::ADDRESS)?.unwrap_or_default();
        connection.port = match get(server::PORT)?.filter(|p| !p.is_empty()) {
            Some(port) => Some(port.parse().map_err(|_| {
                HangarError::configuration(format!("invalid server port '{}'", port), Some("Use a number between 1 and 65535"))
            })?),
            None => None,
        };
        connection.username = get(server::USERNAME)?.filter(|u| !u.is_empty());
        connection.password = get(server::PASSWORD)?.filter(|p| !p.is_empty());
        Ok(connection)
    }

    pub fn save(&self, properties: &PropertyStore) -> Result<()> {
        let mut values = BTreeMap::new();
        values.insert(server::PROTOCOL.to_string(), vec![self.protocol.clone()]);
        values.insert(server::ADDRESS.to_string(), vec![self.address.clone()]);
        if let Some(port) = self.port {
            values.insert(server::PORT.to_string(), vec![port.to_string()]);
        }
        if let Some(username) = &self.username {
            values.insert(server::USERNAME.to_string(), vec![username.clone()]);
        }
        if let Some(password) = &self.password {
            values.insert(server::PASSWORD.to_string(), vec![password.clone()]);
        }
        properties.batch_replace_values(property::SERVER_CONNECTION, values)
    }

    /// Forget every stored connection setting
    pub fn reset(properties: &PropertyStore) -> Result<()> {
        properties.cut_keys(
            property::SERVER_CONNECTION,
            &[server::PROTOCOL, server::ADDRESS, server::PORT, server::USERNAME, server::PASSWORD],
        )
    }

    pub fn base_url(&self) -> Result<url::Url> {
        if self.address.is_empty() {
            return Err(HangarError::configuration(
                "server address is not set",
                Some("Run `hangar setup-server --address <host>` first"),
            ));
        }
        let raw = match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.address, port),
            None => format!("{}://{}", self.protocol, self.address),
        };
        url::Url::parse(&raw).map_err(|source| HangarError::InvalidUrl {
            url: raw,
            suggestion: "Check server protocol, address and port".to_string(),
            source,
        })
    }

    /// `<base>/<path>?<query>`
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<url::Url> {
        let mut url = self.base_url()?.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Attach basic auth when credentials are configured
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) if !username.is_empty() => request.basic_auth(username, self.password.as_ref()),
            _ => request,
        }
    }
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            address: String::new(),
            port: None,
            username: None,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_derive_from_root() {
        let paths = Paths::new("/data/hangar");
        assert_eq!(paths.downloads, PathBuf::from("/data/hangar/downloads"));
        assert_eq!(paths.wine_binaries, PathBuf::from("/data/hangar/wine/_binaries"));
        assert_eq!(
            paths.prefix_dir("some_game", "en"),
            PathBuf::from("/data/hangar/installed-apps/windows-en/some_game")
        );
    }

    #[test]
    fn ensure_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        paths.ensure().unwrap();
        assert!(paths.umu_configs.is_dir());
        assert!(paths.installed_records.is_dir());
    }

    #[test]
    fn server_urls_carry_port_and_query() {
        let server = ServerConnection {
            protocol: "http".to_string(),
            address: "nas.local".to_string(),
            port: Some(1853),
            ..Default::default()
        };
        let url = server.url("/api/metadata", &[("id", "1234")]).unwrap();
        assert_eq!(url.as_str(), "http://nas.local:1853/api/metadata?id=1234");
    }

    #[test]
    fn connection_roundtrips_through_properties() {
        let dir = tempfile::tempdir().unwrap();
        let properties = PropertyStore::open(dir.path()).unwrap();
        assert_eq!(ServerConnection::load(&properties).unwrap(), ServerConnection::default());

        let connection = ServerConnection {
            protocol: "http".to_string(),
            address: "10.0.0.2".to_string(),
            port: Some(8080),
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
        };
        connection.save(&properties).unwrap();
        assert_eq!(ServerConnection::load(&properties).unwrap(), connection);

        ServerConnection::reset(&properties).unwrap();
        assert_eq!(ServerConnection::load(&properties).unwrap(), ServerConnection::default());
    }

    #[test]
    fn missing_address_is_configuration_error() {
        let err = ServerConnection::default().base_url().unwrap_err();
        assert_eq!(err.category(), "configuration");
        assert!(err.suggestion().is_some());
    }
}
