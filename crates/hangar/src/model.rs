//! Catalog data model: products, their download links and the filters applied to them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{HangarError, Result};

/// Operating system a download link targets or the host runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatingSystem {
    #[serde(rename = "macOS", alias = "macos", alias = "mac", alias = "osx")]
    MacOS,
    #[serde(rename = "linux", alias = "Linux")]
    Linux,
    #[serde(rename = "windows", alias = "Windows")]
    Windows,
    #[serde(other)]
    Unknown,
}

impl OperatingSystem {
    pub const SUPPORTED: [OperatingSystem; 3] = [Self::MacOS, Self::Linux, Self::Windows];

    /// Operating system this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MacOS => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        }
    }

    /// Human readable name used in messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MacOS => "macOS",
            Self::Linux => "Linux",
            Self::Windows => "Windows",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for OperatingSystem {
    type Err = HangarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "macos" | "mac" | "osx" => Ok(Self::MacOS),
            "linux" => Ok(Self::Linux),
            "windows" | "win" => Ok(Self::Windows),
            other => Err(HangarError::configuration(
                format!("unknown operating system '{}'", other),
                Some("Use one of: macos, linux, windows"),
            )),
        }
    }
}

/// Kind of downloadable artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    Installer,
    Dlc,
    Extra,
    #[serde(other)]
    Unknown,
}

impl DownloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installer => "installer",
            Self::Dlc => "dlc",
            Self::Extra => "extra",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DownloadType {
    type Err = HangarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "installer" => Ok(Self::Installer),
            "dlc" => Ok(Self::Dlc),
            "extra" => Ok(Self::Extra),
            other => Err(HangarError::configuration(
                format!("unknown download type '{}'", other),
                Some("Use one of: installer, dlc, extra"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductType {
    Game,
    Pack,
    Dlc,
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Game => write!(f, "game"),
            Self::Pack => write!(f, "pack"),
            Self::Dlc => write!(f, "DLC"),
        }
    }
}

/// One downloadable file of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub os: OperatingSystem,
    pub language_code: String,
    #[serde(rename = "type")]
    pub download_type: DownloadType,
    pub local_filename: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub estimated_bytes: u64,
    pub manual_url: String,
}

impl DownloadLink {
    /// Declared checksum, treating an empty value as absent
    pub fn checksum(&self) -> Option<&str> {
        self.md5.as_deref().map(str::trim).filter(|sum| !sum.is_empty())
    }

    /// Lowercased file extension including the dot
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.local_filename)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default()
    }
}

/// Image ids of a product, each optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductImages {
    pub image: Option<String>,
    pub vertical_image: Option<String>,
    pub hero: Option<String>,
    pub background: Option<String>,
    pub logo: Option<String>,
    pub icon: Option<String>,
    pub icon_square: Option<String>,
}

/// Catalog entry as served by the metadata server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub product_type: ProductType,
    #[serde(default)]
    pub included_games: Vec<String>,
    #[serde(default)]
    pub required_games: Vec<String>,
    #[serde(default)]
    pub steam_app_id: Option<String>,
    #[serde(default)]
    pub images: ProductImages,
    #[serde(default)]
    pub download_links: Vec<DownloadLink>,
}

impl Product {
    /// Links passing `filter`, in catalog order
    pub fn links<'a>(&'a self, filter: &'a LinkFilter) -> impl Iterator<Item = &'a DownloadLink> + 'a {
        self.download_links.iter().filter(move |link| filter.matches(link))
    }

    /// True when an installer exists for the os and language
    pub fn is_supported(&self, os: OperatingSystem, lang_code: &str) -> bool {
        let filter = LinkFilter::new()
            .operating_systems(&[os])
            .language_codes(&[lang_code])
            .download_types(&[DownloadType::Installer]);
        self.links(&filter).next().is_some()
    }

    pub fn estimated_bytes(&self, filter: &LinkFilter) -> u64 {
        self.links(filter).map(|link| link.estimated_bytes).sum()
    }

    /// Title, failing when the catalog record has none
    pub fn require_title(&self) -> Result<&str> {
        require_field(&self.id, "title", &self.title)
    }

    /// Slug, failing when the catalog record has none
    pub fn require_slug(&self) -> Result<&str> {
        require_field(&self.id, "slug", &self.slug)
    }
}

fn require_field<'a>(id: &str, field: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(HangarError::MissingMetadata {
            id: id.to_string(),
            field: field.to_string(),
        });
    }
    Ok(value)
}

/// Link selection by os, language, type and manual url. An empty set matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFilter {
    pub operating_systems: Vec<OperatingSystem>,
    pub language_codes: Vec<String>,
    pub download_types: Vec<DownloadType>,
    pub manual_urls: Vec<String>,
}

impl LinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operating_systems(mut self, oses: &[OperatingSystem]) -> Self {
        self.operating_systems = oses.to_vec();
        self
    }

    pub fn language_codes<S: AsRef<str>>(mut self, codes: &[S]) -> Self {
        self.language_codes = codes.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    pub fn download_types(mut self, types: &[DownloadType]) -> Self {
        self.download_types = types.to_vec();
        self
    }

    pub fn manual_urls<S: AsRef<str>>(mut self, urls: &[S]) -> Self {
        self.manual_urls = urls.iter().map(|u| u.as_ref().to_string()).collect();
        self
    }

    pub fn matches(&self, link: &DownloadLink) -> bool {
        (self.operating_systems.is_empty() || self.operating_systems.contains(&link.os))
            && (self.language_codes.is_empty() || self.language_codes.contains(&link.language_code))
            && (self.download_types.is_empty() || self.download_types.contains(&link.download_type))
            && (self.manual_urls.is_empty() || self.manual_urls.contains(&link.manual_url))
    }
}

/// `<os>-<lang>` partition name used by records and install directories
pub fn os_lang_code(os: OperatingSystem, lang_code: &str) -> String {
    format!("{}-{}", os.as_str(), lang_code)
}
