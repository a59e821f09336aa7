use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::DEFAULT_STALE_HOURS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Hosted image upload endpoint, needed only for `admin upload`
  pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the REST API, e.g. https://shop.example.com/api
  #[serde(deserialize_with = "deserialize_url")]
  pub base_url: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, nothing is cached and every read goes to the network
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Age after which the cached product list is refetched
  #[serde(default = "default_hours")]
  pub freshness_hours: u32,
  /// Period of the forced refresh while `watch` is running
  #[serde(default = "default_hours")]
  pub refresh_interval_hours: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      freshness_hours: default_hours(),
      refresh_interval_hours: default_hours(),
    }
  }
}

impl CacheConfig {
  pub fn freshness(&self) -> chrono::Duration {
    chrono::Duration::hours(i64::from(self.freshness_hours))
  }

  pub fn refresh_interval(&self) -> std::time::Duration {
    std::time::Duration::from_secs(u64::from(self.refresh_interval_hours.max(1)) * 3600)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
  #[serde(deserialize_with = "deserialize_url")]
  pub url: Url,
  pub preset: String,
}

fn default_true() -> bool {
  true
}

fn default_hours() -> u32 {
  DEFAULT_STALE_HOURS as u32
}

fn deserialize_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  Url::parse(raw.trim()).map_err(serde::de::Error::custom)
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storefront.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storefront/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/storefront/config.yaml\n\
                 with at least:\n\n  api:\n    base_url: https://shop.example.com/api"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("storefront.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storefront").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Bearer token override from the environment.
  ///
  /// Checks STOREFRONT_TOKEN.
  pub fn token_override() -> Option<String> {
    std::env::var("STOREFRONT_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  /// Get the account password from environment variables.
  ///
  /// Checks STOREFRONT_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("STOREFRONT_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set STOREFRONT_PASSWORD environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_gets_defaults() {
    let config = Config::from_yaml("api:\n  base_url: https://shop.example.com/api\n").unwrap();
    assert_eq!(config.api.base_url.as_str(), "https://shop.example.com/api");
    assert!(config.cache.enabled);
    assert_eq!(config.cache.freshness_hours, 6);
    assert_eq!(config.cache.freshness(), chrono::Duration::hours(6));
    assert_eq!(
      config.cache.refresh_interval(),
      std::time::Duration::from_secs(6 * 3600)
    );
    assert!(config.upload.is_none());
  }

  #[test]
  fn test_full_config() {
    let config = Config::from_yaml(
      r#"
api:
  base_url: " http://localhost:5000/api "
cache:
  enabled: false
  freshness_hours: 1
  refresh_interval_hours: 0
upload:
  url: https://api.cloudinary.com/v1_1/demo/image/upload
  preset: storefront
"#,
    )
    .unwrap();
    assert_eq!(config.api.base_url.as_str(), "http://localhost:5000/api");
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.freshness(), chrono::Duration::hours(1));
    // A zero interval would spin; it is clamped to one hour
    assert_eq!(
      config.cache.refresh_interval(),
      std::time::Duration::from_secs(3600)
    );
    assert_eq!(config.upload.unwrap().preset, "storefront");
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    assert!(Config::from_yaml("api:\n  base_url: not a url\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/storefront.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
