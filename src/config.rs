use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://portal.mda.maryland.gov/stables";

/// Crawl and enrichment tunables. Defaults live here, `STABLES_*` env vars override.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub discovery_walkers: usize,
    pub detail_workers: usize,
    pub page_ceiling: u32,
    pub geocode_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            discovery_walkers: 10,
            detail_workers: 10,
            page_ceiling: 100,
            geocode_delay_ms: 500,
            request_timeout_secs: 30,
            user_agent: concat!("stable_scraper/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("STABLES"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let d = Self::default();
        let settings: Settings = Config::builder()
            .set_default("base_url", d.base_url)?
            .set_default("discovery_walkers", d.discovery_walkers as u64)?
            .set_default("detail_workers", d.detail_workers as u64)?
            .set_default("page_ceiling", d.page_ceiling as u64)?
            .set_default("geocode_delay_ms", d.geocode_delay_ms)?
            .set_default("request_timeout_secs", d.request_timeout_secs)?
            .set_default("user_agent", d.user_agent)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery_walkers == 0 {
            return Err(invalid("discovery_walkers", "must be at least 1"));
        }
        if self.detail_workers == 0 {
            return Err(invalid("detail_workers", "must be at least 1"));
        }
        if self.page_ceiling == 0 {
            return Err(invalid("page_ceiling", "must be at least 1"));
        }
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        Ok(())
    }

    pub fn geocode_delay(&self) -> Duration {
        Duration::from_millis(self.geocode_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

/// Geocoding endpoint + key, read from `GEOCODE_URL` / `GEOCODE_API_KEY`.
#[derive(Debug, Clone)]
pub struct GeocodeConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawGeocode {
    url: Option<String>,
    api_key: Option<String>,
}

impl GeocodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: RawGeocode = Config::builder()
            .add_source(Environment::with_prefix("GEOCODE"))
            .build()?
            .try_deserialize()?;
        Self::from_parts(raw.url, raw.api_key)
    }

    pub fn from_parts(url: Option<String>, api_key: Option<String>) -> Result<Self, ConfigError> {
        let url = non_empty(url).ok_or(ConfigError::Missing("GEOCODE_URL"))?;
        let api_key = non_empty(api_key).ok_or(ConfigError::Missing("GEOCODE_API_KEY"))?;
        Ok(Self { url, api_key })
    }

    /// `{url}{escaped address}&key={api_key}`
    pub fn query_url(&self, address: &str) -> String {
        format!(
            "{}{}&key={}",
            self.url,
            urlencoding::encode(address),
            self.api_key
        )
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
