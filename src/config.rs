use crate::error::ConfigError;
use crate::model::BoundingBox;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
const CATALOG_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/catalog/1.0.0/search";
const PROCESS_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/process";

pub const TOKEN_CACHE_FILE: &str = "sentinelhub_token.json";

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AcquisitionConfig {
    pub collection: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub secrets_dir: PathBuf,
    pub location: Location,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Location {
    pub name: String,
    pub bbox: BoundingBox,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct Endpoints {
    pub token_url: Url,
    pub catalog_url: Url,
    pub process_url: Url,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DiscoverySettings {
    pub page_size: u32,
    pub max_pages: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PipelineSettings {
    pub concurrency: usize,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseSettings {
    pub name: String,
    pub port: u16,
}

fn default_bucket() -> String {
    "satellite-images".to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        // The constants are known-good URLs
        Self {
            token_url: Url::parse(TOKEN_URL).expect("token url should always parse"),
            catalog_url: Url::parse(CATALOG_URL).expect("catalog url should always parse"),
            process_url: Url::parse(PROCESS_URL).expect("process url should always parse"),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            max_pages: 1000,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "satellite_image_processing".to_string(),
            port: 5432,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AcquisitionConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let config: Self = toml::from_str(&table.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.location.name.trim().is_empty() {
            return Err(ConfigError::EmptyLocation);
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Zero("http.timeout_secs"));
        }
        if self.discovery.page_size == 0 {
            return Err(ConfigError::Zero("discovery.page_size"));
        }
        if self.discovery.max_pages == 0 {
            return Err(ConfigError::Zero("discovery.max_pages"));
        }
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::Zero("pipeline.concurrency"));
        }
        Ok(())
    }

    pub fn token_cache_path(&self) -> PathBuf {
        self.secrets_dir.join(TOKEN_CACHE_FILE)
    }
}

#[cfg(test)]
pub(crate) fn cerhenice_toml() -> toml::Table {
    toml::toml! {
        collection = "sentinel-2-l2a"

        bucket = "satellite-images"

        secrets_dir = ".secrets"

        [location]
        name = "Cerhenice"

        [location.bbox]
        min_lon = 15.0492
        min_lat = 50.0566
        max_lon = 15.0949
        max_lat = 50.0859

        [discovery]
        page_size = 5
    }
}
