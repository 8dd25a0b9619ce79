use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::SessionOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub feed: FeedConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  /// Per-request timeout owned by the transport
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Defaults to $XDG_DATA_HOME/fieldwork/cache.db
  pub path: Option<PathBuf>,
  /// Cached feed pages older than this are refetched. Absent means any age.
  pub max_age_secs: Option<u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      max_age_secs: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Upper bound for one-shot applicant count fan-out
  #[serde(default = "default_fanout_concurrency")]
  pub fanout_concurrency: usize,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      fanout_concurrency: default_fanout_concurrency(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_level")]
  pub level: String,
  /// Log to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
      file: None,
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_true() -> bool {
  true
}

fn default_page_size() -> u32 {
  20
}

fn default_fanout_concurrency() -> usize {
  8
}

fn default_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fieldwork.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fieldwork/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    Self::load_with_url(explicit_path, None)
  }

  /// Like [`load`](Self::load), with `url` overriding the configured
  /// backend. When no config file exists `url` alone is enough; a config
  /// file that exists but does not parse is still an error.
  pub fn load_with_url(explicit_path: Option<&Path>, url: Option<&str>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if p.exists() => Some(p.to_path_buf()),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => Self::find_config_file(),
    };

    let mut config = match (path, url) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(url)) => return Ok(Self::default_for(url)),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/fieldwork/config.yaml\n\
           or pass --url."
        ))
      }
    };
    if let Some(url) = url {
      config.api.url = url.to_string();
    }
    Ok(config)
  }

  /// Defaults for everything but the backend url.
  pub fn default_for(url: &str) -> Self {
    Self {
      api: ApiConfig {
        url: url.to_string(),
        timeout_secs: default_timeout_secs(),
      },
      cache: CacheConfig::default(),
      feed: FeedConfig::default(),
      logging: LoggingConfig::default(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fieldwork.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fieldwork").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.feed.page_size == 0 {
      return Err(eyre!("feed.page_size must be at least 1"));
    }
    Ok(config)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn session_options(&self) -> SessionOptions {
    SessionOptions {
      page_size: self.feed.page_size,
      max_age: self.cache.max_age_secs.map(Duration::from_secs),
    }
  }

  /// Get the API token from the environment, if any.
  ///
  /// Checks FIELDWORK_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("FIELDWORK_API_TOKEN")
      .ok()
      .filter(|token| !token.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: https://jobs.example.com/api\n").unwrap();

    assert_eq!(config.api.url, "https://jobs.example.com/api");
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert!(config.cache.enabled);
    assert_eq!(config.cache.max_age_secs, None);
    assert_eq!(config.feed.page_size, 20);
    assert_eq!(config.feed.fanout_concurrency, 8);
    assert_eq!(config.logging.level, "info");
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  url: http://localhost:1337/api
  timeout_secs: 5
cache:
  enabled: false
  path: /tmp/fieldwork-test.db
  max_age_secs: 600
feed:
  page_size: 50
  fanout_concurrency: 4
logging:
  level: debug
  file: /tmp/fieldwork.log
"#;
    let config = Config::parse(yaml).unwrap();

    assert!(!config.cache.enabled);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/fieldwork-test.db")));
    assert_eq!(
      config.session_options(),
      SessionOptions {
        page_size: 50,
        max_age: Some(Duration::from_secs(600)),
      }
    );
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/fieldwork.log")));
  }

  #[test]
  fn test_missing_url_is_an_error() {
    assert!(Config::parse("feed:\n  page_size: 10\n").is_err());
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    let yaml = "api:\n  url: http://localhost\nfeed:\n  page_size: 0\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/fieldwork.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("fieldwork-{}-{}.yaml", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn test_url_overrides_config_file() {
    let path = write_config("override", "api:\n  url: http://localhost:1337/api\nfeed:\n  page_size: 5\n");
    let config = Config::load_with_url(Some(&path), Some("https://jobs.example.com/api")).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.api.url, "https://jobs.example.com/api");
    assert_eq!(config.feed.page_size, 5);
  }

  #[test]
  fn test_url_does_not_hide_malformed_config() {
    let path = write_config("malformed", "api: [not, a, mapping\n");
    let err = Config::load_with_url(Some(&path), Some("https://jobs.example.com/api")).unwrap_err();
    std::fs::remove_file(&path).unwrap();

    assert!(err.to_string().contains("Failed to parse config file"));
  }

  #[test]
  fn test_default_for_url() {
    let config = Config::default_for("https://jobs.example.com");
    assert_eq!(config.session_options(), SessionOptions::default());
  }
}
